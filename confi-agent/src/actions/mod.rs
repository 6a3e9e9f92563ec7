//! Named capabilities a generated reply can invoke.
//!
//! The model tags its reply with a `ResponseAction`; when that tag names a
//! registered action, the action runs and its reply text is published instead
//! of the generated one.

pub mod create_meme;
pub mod meme_limits;
pub mod recommend;

pub use create_meme::CreateMemeAction;
pub use meme_limits::DailyLimiter;
pub use recommend::RecommendAction;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{Post, ResponseAction, SenderProfile};
use crate::templates::TemplateState;

/// How an action presents itself to the model
#[derive(Debug, Clone)]
pub struct ActionDefinition {
    pub name: ResponseAction,
    pub description: String,
    /// Other phrasings the model may use for the same action
    pub similes: Vec<String>,
}

/// Everything an action sees about the post that triggered it
pub struct ActionContext<'a> {
    pub post: &'a Post,
    pub state: &'a TemplateState,
    pub sender: Option<&'a SenderProfile>,
}

/// Result of running an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    pub success: bool,
    /// Reply text to publish; empty means nothing is posted
    pub text: String,
}

impl ActionResult {
    pub fn success(text: impl Into<String>) -> Self {
        ActionResult {
            success: true,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        ActionResult {
            success: false,
            text: text.into(),
        }
    }

    /// Declined without anything to say
    pub fn silent() -> Self {
        ActionResult {
            success: false,
            text: String::new(),
        }
    }
}

/// Trait that all actions must implement
#[async_trait]
pub trait Action: Send + Sync {
    fn definition(&self) -> ActionDefinition;

    async fn execute(&self, context: &ActionContext<'_>) -> ActionResult;

    fn name(&self) -> ResponseAction {
        self.definition().name
    }
}

/// Registry that holds the actions available to the reply pipeline
#[derive(Default)]
pub struct ActionRegistry {
    actions: HashMap<ResponseAction, Arc<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        ActionRegistry {
            actions: HashMap::new(),
        }
    }

    pub fn register(&mut self, action: Arc<dyn Action>) {
        let name = action.name();
        log::info!("Registered action {}", name.as_ref());
        self.actions.insert(name, action);
    }

    pub fn get(&self, name: ResponseAction) -> Option<Arc<dyn Action>> {
        self.actions.get(&name).cloned()
    }

    /// Registered actions, sorted by name
    pub fn list(&self) -> Vec<Arc<dyn Action>> {
        let mut actions: Vec<Arc<dyn Action>> = self.actions.values().cloned().collect();
        actions.sort_by(|a, b| a.name().as_ref().cmp(b.name().as_ref()));
        actions
    }

    /// `{{actionNames}}` for the reply template
    pub fn action_names(&self) -> String {
        self.list()
            .iter()
            .map(|a| a.name().as_ref().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `{{actions}}` for the reply template
    pub fn descriptions(&self) -> String {
        self.list()
            .iter()
            .map(|a| {
                let def = a.definition();
                if def.similes.is_empty() {
                    format!("{}: {}", def.name.as_ref(), def.description)
                } else {
                    format!(
                        "{}: {} (also: {})",
                        def.name.as_ref(),
                        def.description,
                        def.similes.join(", ")
                    )
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoAction;

    #[async_trait]
    impl Action for EchoAction {
        fn definition(&self) -> ActionDefinition {
            ActionDefinition {
                name: ResponseAction::CreateMeme,
                description: "Echo the post".to_string(),
                similes: vec!["CREATE_TOKEN".to_string()],
            }
        }

        async fn execute(&self, context: &ActionContext<'_>) -> ActionResult {
            ActionResult::success(context.post.text.clone())
        }
    }

    #[tokio::test]
    async fn test_registry_lookup_and_execute() {
        let mut registry = ActionRegistry::new();
        registry.register(Arc::new(EchoAction));

        assert!(registry.get(ResponseAction::Continue).is_none());
        let action = registry.get(ResponseAction::CreateMeme).unwrap();

        let post = Post {
            text: "ping".to_string(),
            ..Default::default()
        };
        let state = TemplateState::new();
        let result = action
            .execute(&ActionContext {
                post: &post,
                state: &state,
                sender: None,
            })
            .await;
        assert_eq!(result, ActionResult::success("ping"));
    }

    #[test]
    fn test_template_strings() {
        let mut registry = ActionRegistry::new();
        assert_eq!(registry.action_names(), "");
        registry.register(Arc::new(EchoAction));
        assert_eq!(registry.action_names(), "CREATE_MEME");
        assert_eq!(
            registry.descriptions(),
            "CREATE_MEME: Echo the post (also: CREATE_TOKEN)"
        );
    }
}
