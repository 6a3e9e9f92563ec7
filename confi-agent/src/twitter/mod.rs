pub mod client;
pub mod dedup;
pub mod follow;
pub mod format;
pub mod interactions;
pub mod oauth;
pub mod pipeline;
pub mod publish;
pub mod quote;
pub mod request_queue;
pub mod splitter;
pub mod summary;
pub mod thread;

#[cfg(test)]
pub(crate) mod mock;

pub use client::{PlatformClient, SearchMode, TwitterApiClient};

use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::ai::CompletionService;
use crate::config::TwitterConfig;
use crate::memory::MemoryStore;

/// Everything a Twitter client task needs, passed explicitly to each step
#[derive(Clone)]
pub struct TwitterRuntime {
    pub agent_id: Uuid,
    pub agent_name: String,
    pub config: Arc<TwitterConfig>,
    pub client: Arc<dyn PlatformClient>,
    pub store: Arc<dyn MemoryStore>,
    pub ai: Arc<dyn CompletionService>,
    /// Held while the shared high-water mark is read back and written
    pub mark_lock: Arc<Mutex<()>>,
}

impl TwitterRuntime {
    /// The agent's own platform user id
    pub fn own_user_id(&self) -> &str {
        &self.config.user_id
    }

    pub fn username(&self) -> &str {
        &self.config.username
    }

    pub fn is_own_post(&self, author_id: &str) -> bool {
        author_id == self.config.user_id
    }
}
