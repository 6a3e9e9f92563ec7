//! Parsers for free-form model output

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::GeneratedContent;
use crate::models::{ResponseAction, ShouldRespond};

static SHOULD_RESPOND_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(RESPOND|IGNORE|STOP)\b").unwrap());

static JSON_BLOCK_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").unwrap());

/// First RESPOND / IGNORE / STOP keyword in the answer
pub fn parse_should_respond(text: &str) -> Option<ShouldRespond> {
    SHOULD_RESPOND_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// JSON object from a fenced block, or from the outermost braces
pub fn parse_json_object(text: &str) -> Option<Value> {
    if let Some(caps) = JSON_BLOCK_PATTERN.captures(text) {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str(&caps[1]) {
            return Some(value);
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str(&text[start..=end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

/// Reply text and action tag; plain text is taken as-is with no action
pub fn parse_message_response(text: &str) -> GeneratedContent {
    if let Some(obj) = parse_json_object(text) {
        if let Some(body) = obj.get("text").and_then(|v| v.as_str()) {
            let action = obj
                .get("action")
                .and_then(|v| v.as_str())
                .map(ResponseAction::from_tag)
                .unwrap_or_default();
            return GeneratedContent {
                text: body.to_string(),
                action,
            };
        }
    }

    GeneratedContent {
        text: text.trim().to_string(),
        action: ResponseAction::None,
    }
}

/// Strip one pair of enclosing quotes (`"..."` or `'...'`)
pub fn remove_quotes(text: &str) -> String {
    let trimmed = text.trim();
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next_back()) {
        (Some(first), Some(last)) if first == last && (first == '"' || first == '\'') => {
            chars.as_str().to_string()
        }
        _ => trimmed.to_string(),
    }
}
