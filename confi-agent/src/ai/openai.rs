use super::{CompletionService, Message, MessageRole, ModelClass};
use crate::config::AiConfig;
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry configuration for transient errors
const MAX_RETRIES: u32 = 3;
const BASE_DELAY_MS: u64 = 2000;

const REQUEST_TIMEOUT_SECS: u64 = 120;

/// OpenAI-compatible chat completions client
#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    auth_headers: header::HeaderMap,
    endpoint: String,
    model_small: String,
    model_large: String,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct OpenAICompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAICompletionResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
}

impl OpenAIClient {
    pub fn new(config: &AiConfig) -> Result<Self, String> {
        let mut auth_headers = header::HeaderMap::new();
        auth_headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        // Only add auth header if API key is provided and not empty
        if !config.api_key.is_empty() {
            let auth_value = header::HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|e| format!("Invalid API key format: {}", e))?;
            auth_headers.insert(header::AUTHORIZATION, auth_value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            auth_headers,
            endpoint: config.endpoint.clone(),
            model_small: config.model_small.clone(),
            model_large: config.model_large.clone(),
            max_tokens: config.max_tokens,
        })
    }

    fn model_for(&self, class: ModelClass) -> &str {
        match class {
            ModelClass::Small => &self.model_small,
            ModelClass::Large => &self.model_large,
        }
    }

    async fn send_once(&self, request: &OpenAICompletionRequest<'_>) -> Result<String, (String, bool)> {
        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.auth_headers.clone())
            .json(request)
            .send()
            .await
            // Network errors are retryable
            .map_err(|e| (format!("Request failed: {}", e), true))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let retryable = matches!(status.as_u16(), 429 | 502 | 503 | 504);
            let message = match serde_json::from_str::<OpenAIErrorResponse>(&body) {
                Ok(err) => format!("HTTP {}: {}", status, err.error.message),
                Err(_) => {
                    let truncated: String = body.chars().take(300).collect();
                    format!("HTTP {}: {}", status, truncated)
                }
            };
            return Err((message, retryable));
        }

        let parsed: OpenAICompletionResponse = serde_json::from_str(&body)
            .map_err(|e| (format!("Failed to parse completion response: {}", e), false))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ("Completion response had no content".to_string(), false))
    }
}

#[async_trait]
impl CompletionService for OpenAIClient {
    async fn complete(&self, prompt: &str, model: ModelClass) -> Result<String, String> {
        let request = OpenAICompletionRequest {
            model: self.model_for(model),
            messages: vec![Message {
                role: MessageRole::User,
                content: prompt.to_string(),
            }],
            max_tokens: self.max_tokens,
        };

        log::debug!(
            "[AI] Sending {} char prompt to {} ({})",
            prompt.chars().count(),
            self.endpoint,
            request.model
        );

        let mut last_error = String::new();
        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 2s, 4s, 8s
                let delay_ms = BASE_DELAY_MS * (1 << (attempt - 1));
                log::warn!(
                    "[AI] Retry attempt {}/{} after {}ms delay",
                    attempt,
                    MAX_RETRIES,
                    delay_ms
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            match self.send_once(&request).await {
                Ok(text) => return Ok(text),
                Err((message, true)) if attempt < MAX_RETRIES => {
                    log::warn!("[AI] Request failed (attempt {}): {}, will retry", attempt + 1, message);
                    last_error = message;
                }
                Err((message, _)) => return Err(message),
            }
        }

        Err(last_error)
    }
}
