use serde::{Deserialize, Serialize};

/// Base URL used for post permalinks
pub const PERMALINK_BASE: &str = "https://x.com";

/// A photo attached to a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub url: String,
    pub alt_text: Option<String>,
}

/// A single platform post, as fetched. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Post {
    /// Platform-assigned id (decimal string)
    pub id: String,
    pub author_id: String,
    pub username: String,
    pub name: String,
    pub text: String,
    /// Unix seconds
    pub timestamp: i64,
    pub conversation_id: String,
    pub in_reply_to_id: Option<String>,
    pub is_reply: bool,
    pub is_retweet: bool,
    pub permanent_url: String,
    #[serde(default)]
    pub photos: Vec<MediaItem>,
}

impl Post {
    pub fn permalink(username: &str, id: &str) -> String {
        format!("{}/{}/status/{}", PERMALINK_BASE, username, id)
    }

    /// Conversation id, falling back to the post's own id for roots
    pub fn conversation(&self) -> &str {
        if self.conversation_id.is_empty() {
            &self.id
        } else {
            &self.conversation_id
        }
    }
}

/// Public account details for a platform user
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub name: String,
    pub followers_count: u64,
    /// Account creation time, unix seconds
    pub joined: i64,
    pub is_blue_verified: bool,
}

/// What the agent knows about the author of a post it is answering
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SenderProfile {
    pub username: String,
    pub followers_count: u64,
    pub joined: i64,
    /// Recent posts, already formatted for a prompt
    pub recent_posts: String,
}

impl SenderProfile {
    pub fn from_profile(profile: &Profile, recent_posts: String) -> Self {
        Self {
            username: profile.username.clone(),
            followers_count: profile.followers_count,
            joined: profile.joined,
            recent_posts,
        }
    }

    /// Whole days between account creation and `now` (unix seconds)
    pub fn account_age_days(&self, now: i64) -> i64 {
        (now - self.joined).max(0) / 86_400
    }
}
