//! RECOMMEND: suggest launched ConfiPump tokens matching what the user asked for

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::{Action, ActionContext, ActionDefinition, ActionResult};
use crate::ai::CompletionService;
use crate::models::ResponseAction;
use crate::templates::{compose_context, PUMP_RECOMMENDATION_TEMPLATE};
use crate::web3::subgraph::{CreatedToken, TokenSource};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PumpRecommendation {
    pub token_list: Vec<RecommendedToken>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecommendedToken {
    pub symbol: String,
    pub name: String,
    pub address: String,
    pub reason: String,
}

/// `{{tokenList}}` for the recommendation prompt
pub fn format_token_list(tokens: &[CreatedToken]) -> String {
    let entries: Vec<_> = tokens
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "symbol": t.symbol,
                "address": t.token,
                "meta": t.meta,
            })
        })
        .collect();
    serde_json::Value::Array(entries).to_string()
}

pub fn recommendation_message(recommendation: &PumpRecommendation) -> String {
    let tokens: Vec<String> = recommendation
        .token_list
        .iter()
        .map(|t| format!("{} {} ({}): {}", t.address, t.symbol, t.name, t.reason))
        .collect();
    format!(
        "Here are the tokens that I recommend for you: {}",
        tokens.join(", ")
    )
}

pub struct RecommendAction {
    source: Arc<dyn TokenSource>,
    ai: Arc<dyn CompletionService>,
    confi_pump_url: String,
}

impl RecommendAction {
    pub fn new(
        source: Arc<dyn TokenSource>,
        ai: Arc<dyn CompletionService>,
        confi_pump_url: String,
    ) -> Self {
        Self {
            source,
            ai,
            confi_pump_url: confi_pump_url.trim_end_matches('/').to_string(),
        }
    }

    async fn recommend(&self, context: &ActionContext<'_>) -> Result<PumpRecommendation, String> {
        let tokens = self.source.created_tokens(None).await?;
        log::info!(
            "[RECOMMEND] {} launched token(s) for post {}",
            tokens.len(),
            context.post.id
        );

        let mut state = context.state.clone();
        state.insert("tokenList", format_token_list(&tokens));
        state.insert("confiPumpUrl", self.confi_pump_url.clone());

        let prompt = compose_context(PUMP_RECOMMENDATION_TEMPLATE, &state);
        let object = self.ai.generate_object(&prompt).await?;
        let recommendation: PumpRecommendation =
            serde_json::from_value(object).map_err(|e| format!("Invalid content: {}", e))?;

        if recommendation.token_list.is_empty() {
            return Err("No matching tokens".to_string());
        }
        Ok(recommendation)
    }
}

#[async_trait]
impl Action for RecommendAction {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            name: ResponseAction::Recommend,
            description: "Generate meme token recommendation for Conflux ConfiPump based on the user provided topics".to_string(),
            similes: vec!["RECOMMEND_CONFI_PUMP".to_string()],
        }
    }

    async fn execute(&self, context: &ActionContext<'_>) -> ActionResult {
        match self.recommend(context).await {
            Ok(recommendation) => ActionResult::success(recommendation_message(&recommendation)),
            Err(e) => {
                log::error!("[RECOMMEND] Post {}: {}", context.post.id, e);
                ActionResult::error(format!("Failed to perform the recommendation: {}", e))
            }
        }
    }
}
