//! Decide whether and how to answer one post, then publish the answer.
//!
//! Flow per post: self-loop and empty-text guards, context assembly, trigger
//! memory, should-respond gate, message generation, then either a dry-run log
//! or publishing (plain reply or a registered action's reply).

use async_trait::async_trait;
use std::sync::Arc;

use super::format::{
    format_conversation, format_image_descriptions, format_post, format_posts, format_timestamp,
    ImageDescription,
};
use super::publish::{remember_published, send_post_chain, ChainMode};
use super::thread::remember_post;
use super::TwitterRuntime;
use crate::actions::{ActionContext, ActionRegistry};
use crate::ai::parse::remove_quotes;
use crate::models::{Decision, Post, ResponseAction, SenderProfile, ShouldRespond};
use crate::templates::{
    compose_context, message_handler_template, quote_template, should_respond_template,
    TemplateState,
};

/// Recent posts pulled for the sender context
const SENDER_RECENT_POSTS: usize = 20;

/// Describes images attached to posts
#[async_trait]
pub trait ImageDescriber: Send + Sync {
    async fn describe_image(&self, url: &str) -> Result<ImageDescription, String>;
}

pub fn generation_cache_key(post_id: &str) -> String {
    format!("twitter/tweet_generation_{}.txt", post_id)
}

pub struct ResponsePipeline {
    rt: TwitterRuntime,
    actions: Arc<ActionRegistry>,
    describer: Option<Arc<dyn ImageDescriber>>,
    template: String,
    gate: bool,
    mode: ChainMode,
    use_sender_context: bool,
    priority_users: Vec<String>,
}

impl ResponsePipeline {
    /// Replies to mentions and target users, always gated
    pub fn for_interactions(rt: TwitterRuntime, actions: Arc<ActionRegistry>) -> Self {
        let priority_users = rt.config.target_users.clone();
        Self {
            rt,
            actions,
            describer: None,
            template: message_handler_template(),
            gate: true,
            mode: ChainMode::Reply,
            use_sender_context: true,
            priority_users,
        }
    }

    /// Quote posts of quote targets; gated only when configured
    pub fn for_quotes(rt: TwitterRuntime, actions: Arc<ActionRegistry>) -> Self {
        let priority_users = rt.config.quote_target_users.clone();
        let gate = rt.config.quote_should_respond;
        Self {
            rt,
            actions,
            describer: None,
            template: quote_template(),
            gate,
            mode: ChainMode::Quote,
            use_sender_context: false,
            priority_users,
        }
    }

    pub fn with_describer(mut self, describer: Arc<dyn ImageDescriber>) -> Self {
        self.describer = Some(describer);
        self
    }

    pub fn set_priority_users(&mut self, users: Vec<String>) {
        self.priority_users = users;
    }

    pub fn runtime(&self) -> &TwitterRuntime {
        &self.rt
    }

    /// Run one post through the pipeline. `None` means the post was the
    /// agent's own and nothing happened.
    pub async fn handle(&self, post: &Post, thread: &[Post]) -> Option<Decision> {
        let rt = &self.rt;

        if rt.is_own_post(&post.author_id) {
            log::debug!("Twitter: Skipping own post {}", post.id);
            return None;
        }

        if post.text.trim().is_empty() {
            log::info!("Twitter: Skipping post {} with empty text", post.id);
            return Some(Decision::ignored());
        }

        let sender = if self.use_sender_context {
            self.sender_context(post).await
        } else {
            None
        };
        let images = self.describe_images(post).await;
        let state = self.build_state(post, thread, sender.as_ref(), &images);

        remember_post(post, rt).await;

        if self.gate {
            let prompt = compose_context(&should_respond_template(), &state);
            match rt.ai.should_respond(&prompt).await {
                Ok(ShouldRespond::Respond) => {}
                Ok(other) => {
                    log::info!("Twitter: Not responding to post {}: {}", post.id, other.as_ref());
                    return Some(Decision::without_reply(other));
                }
                Err(e) => {
                    log::error!("Twitter: Should-respond failed for post {}: {}", post.id, e);
                    return Some(Decision::ignored());
                }
            }
        }

        let context = compose_context(&self.template, &state);
        let generated = match rt.ai.generate_message(&context).await {
            Ok(generated) => generated,
            Err(e) => {
                log::error!("Twitter: Failed to generate reply to post {}: {}", post.id, e);
                return Some(Decision::ignored());
            }
        };

        let text = remove_quotes(&generated.text);
        let action = generated.action;
        let mut decision = Decision {
            should_respond: ShouldRespond::Respond,
            text: text.clone(),
            action,
            published: Vec::new(),
        };

        let selected = format!(
            "Selected Post: {} - {}: {}\nAgent's Output:\n{}",
            post.id, post.username, post.text, text
        );

        if rt.config.dry_run {
            log::info!("Twitter: Dry run: {}", selected);
            return Some(decision);
        }

        let reply = self
            .reply_text(post, &text, action, &state, sender.as_ref())
            .await;
        decision.text = reply.clone();

        if reply.is_empty() {
            log::info!("Twitter: Nothing to publish for post {}", post.id);
        } else {
            let sent = send_post_chain(rt, &reply, post, self.mode, &[]).await;
            remember_published(rt, &sent, post, action).await;
            decision.published = sent.into_iter().map(|p| p.id).collect();
        }

        let audit = format!("Context:\n\n{}\n\n{}", context, selected);
        if let Err(e) = rt
            .store
            .cache_set(&generation_cache_key(&post.id), &serde_json::Value::String(audit))
            .await
        {
            log::warn!("Twitter: Failed to cache generation for post {}: {}", post.id, e);
        }

        Some(decision)
    }

    /// Generated text for plain replies and unregistered actions, the
    /// action's own reply otherwise
    async fn reply_text(
        &self,
        post: &Post,
        text: &str,
        action: ResponseAction,
        state: &TemplateState,
        sender: Option<&SenderProfile>,
    ) -> String {
        if action.is_plain_reply() {
            return text.to_string();
        }

        let Some(handler) = self.actions.get(action) else {
            log::warn!(
                "Twitter: Action {} is not registered, sending generated text",
                action.as_ref()
            );
            return text.to_string();
        };

        log::info!("Twitter: Running action {} for post {}", action.as_ref(), post.id);
        let result = handler
            .execute(&ActionContext {
                post,
                state,
                sender,
            })
            .await;
        result.text
    }

    async fn sender_context(&self, post: &Post) -> Option<SenderProfile> {
        let profile = match self.rt.client.fetch_profile(&post.username).await {
            Ok(profile) => profile,
            Err(e) => {
                log::warn!("Twitter: No profile for @{}: {}", post.username, e);
                return None;
            }
        };

        let recent = match self
            .rt
            .client
            .fetch_user_posts(&post.username, SENDER_RECENT_POSTS)
            .await
        {
            Ok(posts) => format_posts(&posts),
            Err(e) => {
                log::warn!("Twitter: No recent posts for @{}: {}", post.username, e);
                String::new()
            }
        };

        Some(SenderProfile::from_profile(&profile, recent))
    }

    async fn describe_images(&self, post: &Post) -> Vec<ImageDescription> {
        let Some(describer) = &self.describer else {
            return Vec::new();
        };

        let mut descriptions = Vec::new();
        for photo in &post.photos {
            match describer.describe_image(&photo.url).await {
                Ok(description) => descriptions.push(description),
                Err(e) => {
                    log::error!("Twitter: Error describing image {}: {}", photo.url, e);
                    break;
                }
            }
        }
        descriptions
    }

    fn build_state(
        &self,
        post: &Post,
        thread: &[Post],
        sender: Option<&SenderProfile>,
        images: &[ImageDescription],
    ) -> TemplateState {
        let rt = &self.rt;
        let mut state = TemplateState::new();
        state.insert("agentName", rt.agent_name.clone());
        state.insert("twitterUserName", rt.username().to_string());
        state.insert("priorityUsers", self.priority_users.join(", "));
        state.insert("currentPost", format_post(post));
        state.insert("formattedConversation", format_conversation(thread));
        state.insert("imageDescriptions", format_image_descriptions(images));
        state.insert("actionNames", self.actions.action_names());
        state.insert("actions", self.actions.descriptions());
        state.insert("confiPumpHashtag", rt.config.confi_pump_hashtag.clone());
        state.insert("maxTweetLength", rt.config.max_tweet_length.to_string());
        state.insert("senderUsername", post.username.clone());

        if let Some(sender) = sender {
            state.insert("senderFollowersCount", sender.followers_count.to_string());
            state.insert("senderJoined", format_timestamp(sender.joined));
            state.insert("senderRecentPosts", sender.recent_posts.clone());
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Action, ActionDefinition, ActionResult};
    use crate::ai::{MockCompletion, ModelClass};
    use crate::ids;
    use crate::models::{MediaItem, Profile};
    use crate::twitter::mock::{self, MockPlatform};
    use std::sync::Mutex;

    const REPLY_JSON: &str = r#"```json
{ "user": "confi", "text": "\"FDV first, vibes later\"", "action": "NONE" }
```"#;

    fn pipeline(platform: &MockPlatform, ai: &MockCompletion) -> (ResponsePipeline, Arc<crate::db::Database>) {
        let (rt, db) = mock::runtime(platform, ai);
        (
            ResponsePipeline::for_interactions(rt, Arc::new(ActionRegistry::new())),
            db,
        )
    }

    #[tokio::test]
    async fn test_own_post_produces_no_decision() {
        let platform = MockPlatform::new();
        let ai = MockCompletion::with_texts(&["[RESPOND]", REPLY_JSON]);
        let (pipeline, db) = pipeline(&platform, &ai);

        let mut own = mock::post("10", mock::OWN_USERNAME, "my own post", None);
        own.author_id = mock::OWN_USER_ID.to_string();

        assert_eq!(pipeline.handle(&own, &[]).await, None);
        assert!(ai.calls().is_empty());
        assert!(platform.published().is_empty());
        assert_eq!(db.count_memories().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_text_is_ignored_without_completion() {
        let platform = MockPlatform::new();
        let ai = MockCompletion::with_texts(&["[RESPOND]"]);
        let (pipeline, db) = pipeline(&platform, &ai);
        let post = mock::post("11", "alice", "   ", None);

        let decision = pipeline.handle(&post, &[]).await.unwrap();
        assert_eq!(decision.text, "");
        assert_eq!(decision.action, ResponseAction::Ignore);
        assert!(ai.calls().is_empty());
        assert_eq!(db.count_memories().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stop_short_circuits_generation() {
        let platform = MockPlatform::new();
        let ai = MockCompletion::with_texts(&["[STOP]", REPLY_JSON]);
        let (pipeline, db) = pipeline(&platform, &ai);
        let post = mock::post("12", "alice", "please stop", None);

        let decision = pipeline.handle(&post, &[post.clone()]).await.unwrap();
        assert_eq!(decision.should_respond, ShouldRespond::Stop);
        assert_eq!(decision.action, ResponseAction::Ignore);

        let calls = ai.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, ModelClass::Small);
        assert_eq!(ai.remaining(), 1);
        assert!(platform.published().is_empty());
        // Trigger is still remembered
        assert!(db.get_memory(&ids::memory_id("12", &mock::agent_id())).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_respond_publishes_and_remembers() {
        let platform = MockPlatform::new();
        let ai = MockCompletion::with_texts(&["[RESPOND]", REPLY_JSON]);
        let (pipeline, db) = pipeline(&platform, &ai);
        let post = mock::post("13", "alice", "what about $CFX?", None);

        let decision = pipeline.handle(&post, &[post.clone()]).await.unwrap();
        assert_eq!(decision.text, "FDV first, vibes later");
        assert_eq!(decision.action, ResponseAction::None);
        assert_eq!(decision.published, vec!["1000"]);

        let published = platform.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].reply_to.as_deref(), Some("13"));

        let agent = mock::agent_id();
        let reply = db.get_memory(&ids::memory_id("1000", &agent)).unwrap().unwrap();
        assert_eq!(reply.user_id, agent);
        assert_eq!(reply.content.action, Some(ResponseAction::None));
        assert_eq!(reply.room_id, ids::room_id(post.conversation(), &agent));

        let audit = db.get_cache("twitter/tweet_generation_13.txt").unwrap().unwrap();
        assert!(audit.contains("Selected Post: 13 - alice: what about $CFX?"));
        assert!(audit.contains("FDV first, vibes later"));
    }

    #[tokio::test]
    async fn test_dry_run_publishes_nothing() {
        let platform = MockPlatform::new();
        let ai = MockCompletion::with_texts(&["[RESPOND]", REPLY_JSON]);
        let mut config = mock::test_config();
        config.dry_run = true;
        let (rt, db) = mock::runtime_with(config, &platform, &ai);
        let pipeline = ResponsePipeline::for_interactions(rt, Arc::new(ActionRegistry::new()));
        let post = mock::post("14", "alice", "gm", None);

        let decision = pipeline.handle(&post, &[]).await.unwrap();
        assert_eq!(decision.text, "FDV first, vibes later");
        assert!(decision.published.is_empty());
        assert!(platform.published().is_empty());
        // Only the trigger is remembered
        assert_eq!(db.count_memories().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_completion_error_is_ignore() {
        let platform = MockPlatform::new();
        let ai = MockCompletion::new(vec![Err("timeout".to_string())]);
        let (pipeline, _db) = pipeline(&platform, &ai);
        let post = mock::post("15", "alice", "hello?", None);

        let decision = pipeline.handle(&post, &[]).await.unwrap();
        assert_eq!(decision, Decision::ignored());
        assert!(platform.published().is_empty());
    }

    #[tokio::test]
    async fn test_sender_context_reaches_prompt() {
        let platform = MockPlatform::new();
        platform.add_profile(Profile {
            id: "uid-alice".to_string(),
            username: "alice".to_string(),
            name: "Alice".to_string(),
            followers_count: 4242,
            joined: 1_600_000_000,
            is_blue_verified: false,
        });
        let ai = MockCompletion::with_texts(&["[IGNORE]"]);
        let (pipeline, _db) = pipeline(&platform, &ai);
        let post = mock::post("16", "alice", "hi", None);

        pipeline.handle(&post, &[]).await;
        let prompt = &ai.calls()[0].1;
        assert!(prompt.contains("4242 followers"));
        assert!(prompt.contains("@alice"));
        assert_eq!(platform.searches(), vec!["from:alice"]);
    }

    #[tokio::test]
    async fn test_quote_flow_without_gate() {
        let platform = MockPlatform::new();
        let ai = MockCompletion::with_texts(&[REPLY_JSON]);
        let (rt, _db) = mock::runtime(&platform, &ai);
        let pipeline = ResponsePipeline::for_quotes(rt, Arc::new(ActionRegistry::new()));
        let post = mock::post("17", "bob", "ConfiPump is live", None);

        let decision = pipeline.handle(&post, &[post.clone()]).await.unwrap();
        assert_eq!(decision.published.len(), 1);
        assert_eq!(ai.calls().len(), 1);
        assert_eq!(platform.published()[0].quoted.as_deref(), Some("17"));
    }

    struct RecordingAction {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Action for RecordingAction {
        fn definition(&self) -> ActionDefinition {
            ActionDefinition {
                name: ResponseAction::CreateMeme,
                description: "test".to_string(),
                similes: Vec::new(),
            }
        }

        async fn execute(&self, context: &ActionContext<'_>) -> ActionResult {
            self.seen.lock().unwrap().push(context.post.id.clone());
            ActionResult::success("Token created")
        }
    }

    #[tokio::test]
    async fn test_registered_action_reply_replaces_text() {
        let platform = MockPlatform::new();
        let ai = MockCompletion::with_texts(&[
            "[RESPOND]",
            r#"{"user":"confi","text":"on it","action":"CREATE_MEME"}"#,
        ]);
        let (rt, db) = mock::runtime(&platform, &ai);
        let action = Arc::new(RecordingAction {
            seen: Mutex::new(Vec::new()),
        });
        let mut registry = ActionRegistry::new();
        registry.register(action.clone());
        let pipeline = ResponsePipeline::for_interactions(rt, Arc::new(registry));
        let post = mock::post("18", "alice", "make a meme", None);

        let decision = pipeline.handle(&post, &[]).await.unwrap();
        assert_eq!(decision.text, "Token created");
        assert_eq!(decision.action, ResponseAction::CreateMeme);
        assert_eq!(*action.seen.lock().unwrap(), vec!["18"]);
        assert_eq!(platform.published()[0].text, "Token created");

        let record = db
            .get_memory(&ids::memory_id(&decision.published[0], &mock::agent_id()))
            .unwrap()
            .unwrap();
        assert_eq!(record.content.action, Some(ResponseAction::CreateMeme));
    }

    #[tokio::test]
    async fn test_unregistered_action_sends_generated_text() {
        let platform = MockPlatform::new();
        let ai = MockCompletion::with_texts(&[
            "[RESPOND]",
            r#"{"user":"confi","text":"soon","action":"CREATE_MEME"}"#,
        ]);
        let (pipeline, _db) = pipeline(&platform, &ai);
        let post = mock::post("19", "alice", "make a meme", None);

        let decision = pipeline.handle(&post, &[]).await.unwrap();
        assert_eq!(decision.text, "soon");
        assert_eq!(platform.published()[0].text, "soon");
    }

    struct FailingDescriber;

    #[async_trait]
    impl ImageDescriber for FailingDescriber {
        async fn describe_image(&self, _url: &str) -> Result<ImageDescription, String> {
            Err("vision model unavailable".to_string())
        }
    }

    #[tokio::test]
    async fn test_image_description_failure_does_not_abort() {
        let platform = MockPlatform::new();
        let ai = MockCompletion::with_texts(&["[RESPOND]", REPLY_JSON]);
        let (rt, _db) = mock::runtime(&platform, &ai);
        let pipeline = ResponsePipeline::for_interactions(rt, Arc::new(ActionRegistry::new()))
            .with_describer(Arc::new(FailingDescriber));
        let mut post = mock::post("20", "alice", "look at this", None);
        post.photos.push(MediaItem {
            id: "m1".to_string(),
            url: "https://pbs.twimg.com/media/a.jpg".to_string(),
            alt_text: None,
        });

        let decision = pipeline.handle(&post, &[]).await.unwrap();
        assert_eq!(decision.published.len(), 1);
    }
}
