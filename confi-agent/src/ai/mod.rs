pub mod openai;
pub mod parse;

pub use openai::OpenAIClient;

use crate::models::{ResponseAction, ShouldRespond};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

/// Which configured model a prompt is sent to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelClass {
    /// Cheap classification calls
    Small,
    /// Reply and post generation
    Large,
}

/// A generated reply plus the action the model attached to it
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GeneratedContent {
    pub text: String,
    pub action: ResponseAction,
}

/// Text completion service the agent talks to.
///
/// Implementors only provide `complete`; the typed helpers parse its output.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str, model: ModelClass) -> Result<String, String>;

    /// RESPOND / IGNORE / STOP classification
    async fn should_respond(&self, prompt: &str) -> Result<ShouldRespond, String> {
        let raw = self.complete(prompt, ModelClass::Small).await?;
        parse::parse_should_respond(&raw)
            .ok_or_else(|| format!("Unrecognised should-respond answer: {}", raw.trim()))
    }

    async fn generate_message(&self, prompt: &str) -> Result<GeneratedContent, String> {
        let raw = self.complete(prompt, ModelClass::Large).await?;
        Ok(parse::parse_message_response(&raw))
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, String> {
        self.complete(prompt, ModelClass::Large).await
    }

    /// Generate and parse a JSON object
    async fn generate_object(&self, prompt: &str) -> Result<Value, String> {
        let raw = self.complete(prompt, ModelClass::Large).await?;
        parse::parse_json_object(&raw)
            .ok_or_else(|| format!("Model did not return a JSON object: {}", raw.trim()))
    }
}

/// Mock completion service for tests; returns pre-configured responses from a queue.
/// Also records every prompt it was asked to complete.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct MockCompletion {
    responses: std::sync::Arc<std::sync::Mutex<std::collections::VecDeque<Result<String, String>>>>,
    calls: std::sync::Arc<std::sync::Mutex<Vec<(ModelClass, String)>>>,
}

#[cfg(test)]
impl MockCompletion {
    pub fn new(responses: Vec<Result<String, String>>) -> Self {
        Self {
            responses: std::sync::Arc::new(std::sync::Mutex::new(responses.into())),
            calls: Default::default(),
        }
    }

    pub fn with_texts(responses: &[&str]) -> Self {
        Self::new(responses.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn calls(&self) -> Vec<(ModelClass, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[cfg(test)]
#[async_trait]
impl CompletionService for MockCompletion {
    async fn complete(&self, prompt: &str, model: ModelClass) -> Result<String, String> {
        self.calls.lock().unwrap().push((model, prompt.to_string()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("(mock exhausted)".to_string()))
    }
}
