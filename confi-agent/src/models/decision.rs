use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Outcome of the should-respond classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum ShouldRespond {
    Respond,
    Ignore,
    Stop,
}

/// Action tag attached to a generated reply.
///
/// `None` is the default for anything the model returns that is not a
/// recognised tag.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum ResponseAction {
    #[default]
    None,
    Continue,
    Ignore,
    /// Launch a meme token
    #[strum(to_string = "CREATE_MEME", serialize = "CREATE_TOKEN", serialize = "CONFI_PUMP")]
    CreateMeme,
    /// Suggest ConfiPump tokens
    #[strum(to_string = "RECOMMEND", serialize = "RECOMMEND_CONFI_PUMP")]
    Recommend,
}

impl ResponseAction {
    /// Parse a model-supplied tag, defaulting to `None` if unknown
    pub fn from_tag(tag: &str) -> Self {
        tag.trim().parse().unwrap_or_default()
    }

    /// Tags whose generated text is published as-is
    pub fn is_plain_reply(&self) -> bool {
        matches!(self, Self::None | Self::Continue | Self::Ignore)
    }
}

/// Result of running one post through the response pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub should_respond: ShouldRespond,
    pub text: String,
    pub action: ResponseAction,
    /// Platform ids of everything published for this post
    pub published: Vec<String>,
}

impl Decision {
    pub fn ignored() -> Self {
        Self::without_reply(ShouldRespond::Ignore)
    }

    pub fn without_reply(should_respond: ShouldRespond) -> Self {
        let action = match should_respond {
            ShouldRespond::Respond => ResponseAction::None,
            _ => ResponseAction::Ignore,
        };
        Self {
            should_respond,
            text: String::new(),
            action,
            published: Vec::new(),
        }
    }
}
