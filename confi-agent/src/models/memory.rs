use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::decision::ResponseAction;
use super::post::{MediaItem, Post};
use crate::ids;

/// Source tag stored on every memory created by the platform clients
pub const SOURCE_TWITTER: &str = "twitter";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MemoryContent {
    pub text: String,
    pub source: String,
    pub url: Option<String>,
    pub in_reply_to: Option<Uuid>,
    pub action: Option<ResponseAction>,
    #[serde(default)]
    pub attachments: Vec<MediaItem>,
}

/// A persisted post or agent reply. Created once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub user_id: Uuid,
    pub room_id: Uuid,
    pub content: MemoryContent,
    /// Unix milliseconds
    pub created_at: i64,
}

impl MemoryRecord {
    /// Memory for a post seen on the platform.
    ///
    /// `own_platform_id` is the agent's account id; posts by that account are
    /// attributed to the agent.
    pub fn from_post(post: &Post, agent_id: &Uuid, own_platform_id: &str) -> Self {
        Self {
            id: ids::memory_id(&post.id, agent_id),
            agent_id: *agent_id,
            user_id: ids::author_id(&post.author_id, own_platform_id, agent_id),
            room_id: ids::room_id(post.conversation(), agent_id),
            content: MemoryContent {
                text: post.text.clone(),
                source: SOURCE_TWITTER.to_string(),
                url: Some(post.permanent_url.clone()),
                in_reply_to: post
                    .in_reply_to_id
                    .as_deref()
                    .map(|parent| ids::memory_id(parent, agent_id)),
                action: None,
                attachments: post.photos.clone(),
            },
            created_at: post.timestamp * 1000,
        }
    }

    /// Memory for a post the agent itself published
    pub fn from_own_post(post: &Post, agent_id: &Uuid, action: ResponseAction) -> Self {
        let mut record = Self::from_post(post, agent_id, &post.author_id);
        record.user_id = *agent_id;
        record.content.action = Some(action);
        record
    }
}
