//! CREATE_MEME: launch a meme token on ConfiPump from a user's request

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

use super::{Action, ActionContext, ActionDefinition, ActionResult, DailyLimiter};
use crate::ai::CompletionService;
use crate::config::MemeConfig;
use crate::models::{ResponseAction, ShouldRespond};
use crate::templates::{compose_context, should_create_meme_template, CREATE_MEME_TEMPLATE};
use crate::web3::{success_message, TokenLauncher, TokenParams};

/// Image host accepted for token logos
const IMAGE_HOST: &str = "pbs.twimg.com";

const SYMBOL_LEN: std::ops::RangeInclusive<usize> = 3..=6;

/// What the model extracted from the request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action")]
pub enum PumpContent {
    #[serde(rename = "CREATE_TOKEN")]
    CreateToken { params: PumpParams },
    #[serde(rename = "REJECT")]
    Reject { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PumpParams {
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub description: String,
    pub image_url: String,
}

/// Check the extracted parameters and normalise them into launch params
pub fn validate_params(params: &PumpParams) -> Result<TokenParams, String> {
    let name = params.name.trim();
    if name.is_empty() {
        return Err("Token name is required".to_string());
    }

    let symbol = params.symbol.trim().trim_start_matches('$');
    if !SYMBOL_LEN.contains(&symbol.chars().count()) {
        return Err(format!(
            "Token symbol must be {} to {} characters, got \"{}\"",
            SYMBOL_LEN.start(),
            SYMBOL_LEN.end(),
            symbol
        ));
    }

    let image_url = params.image_url.trim();
    let parsed = Url::parse(image_url).map_err(|e| format!("Invalid image URL: {}", e))?;
    if parsed.scheme() != "https" || parsed.host_str() != Some(IMAGE_HOST) {
        return Err(format!("Image must be hosted on https://{}/", IMAGE_HOST));
    }

    Ok(TokenParams {
        name: name.to_string(),
        symbol: symbol.to_string(),
        description: params.description.trim().to_string(),
        image_url: image_url.to_string(),
    })
}

enum Outcome {
    Created(String),
    Rejected(String),
    Declined,
}

pub struct CreateMemeAction {
    config: MemeConfig,
    ai: Arc<dyn CompletionService>,
    launcher: Arc<dyn TokenLauncher>,
    limiter: DailyLimiter,
}

impl CreateMemeAction {
    pub fn new(
        config: MemeConfig,
        ai: Arc<dyn CompletionService>,
        launcher: Arc<dyn TokenLauncher>,
        limiter: DailyLimiter,
    ) -> Self {
        Self {
            config,
            ai,
            launcher,
            limiter,
        }
    }

    /// Sender restrictions. `Ok(false)` declines silently, `Err` is replied.
    async fn can_create(&self, context: &ActionContext<'_>) -> Result<bool, String> {
        if !self.config.restriction_enabled {
            return Ok(true);
        }

        let Some(sender) = context.sender else {
            log::warn!(
                "[CREATE_MEME] No sender profile for post {}, declining",
                context.post.id
            );
            return Ok(false);
        };

        let now = Utc::now();
        self.limiter.check(&sender.username, now).await?;

        if sender.followers_count < self.config.min_followers {
            return Err("Do not have enough followers to create a meme".to_string());
        }

        let age_days = sender.account_age_days(now.timestamp());
        if (age_days as u64) < self.config.min_account_age_days {
            return Err(format!(
                "Need to wait for {} days since you created your account to create a meme",
                self.config.min_account_age_days
            ));
        }

        let prompt = compose_context(&should_create_meme_template(), context.state);
        match self.ai.should_respond(&prompt).await? {
            ShouldRespond::Respond => Ok(true),
            other => {
                log::info!(
                    "[CREATE_MEME] Request from @{} classified as {}",
                    sender.username,
                    other.as_ref()
                );
                Ok(false)
            }
        }
    }

    async fn run(&self, context: &ActionContext<'_>) -> Result<Outcome, String> {
        if !self.can_create(context).await? {
            return Ok(Outcome::Declined);
        }

        let prompt = compose_context(CREATE_MEME_TEMPLATE, context.state);
        let object = self.ai.generate_object(&prompt).await?;
        let content: PumpContent =
            serde_json::from_value(object).map_err(|e| format!("Invalid content: {}", e))?;

        let params = match content {
            PumpContent::Reject { reason } => return Ok(Outcome::Rejected(reason)),
            PumpContent::CreateToken { params } => validate_params(&params)?,
        };

        log::info!(
            "[CREATE_MEME] Creating token {} ({}) for post {}",
            params.name,
            params.symbol,
            context.post.id
        );
        let token = self.launcher.launch(&params).await?;

        if let Some(sender) = context.sender {
            if let Err(e) = self.limiter.record(&sender.username, Utc::now()).await {
                log::error!("[CREATE_MEME] Failed to record creation: {}", e);
            }
        }

        Ok(Outcome::Created(success_message(
            &self.config.confi_pump_url,
            &params.name,
            &token.address,
        )))
    }
}

#[async_trait]
impl Action for CreateMemeAction {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            name: ResponseAction::CreateMeme,
            description: "Create a new meme token on ConfiPump (Conflux) when the user asks for one and provides a name, a symbol and an image".to_string(),
            similes: vec!["CREATE_TOKEN".to_string(), "CONFI_PUMP".to_string()],
        }
    }

    async fn execute(&self, context: &ActionContext<'_>) -> ActionResult {
        match self.run(context).await {
            Ok(Outcome::Created(message)) => ActionResult::success(message),
            Ok(Outcome::Rejected(reason)) => {
                log::info!("[CREATE_MEME] Rejected post {}: {}", context.post.id, reason);
                ActionResult::error(reason)
            }
            Ok(Outcome::Declined) => ActionResult::silent(),
            Err(e) => {
                log::error!("[CREATE_MEME] Post {}: {}", context.post.id, e);
                ActionResult::error(format!("Failed to perform the action: {}", e))
            }
        }
    }
}
