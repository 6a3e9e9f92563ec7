//! Already-processed checks and the persisted high-water mark over post ids

use std::cmp::Ordering;

use super::TwitterRuntime;
use crate::ids;
use crate::memory::{cache_get_as, cache_set_as};
use crate::models::Post;

/// Compare native post ids as big integers; ids that do not parse fall back
/// to length-then-lexical order, which agrees for decimal strings.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u128>(), b.parse::<u128>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
    }
}

/// Sort candidates oldest id first and drop repeated ids
pub fn sort_candidates(mut posts: Vec<Post>) -> Vec<Post> {
    posts.sort_by(|a, b| compare_ids(&a.id, &b.id));
    posts.dedup_by(|a, b| a.id == b.id);
    posts
}

/// Whether the agent already has a memory for this post
pub async fn is_processed(rt: &TwitterRuntime, post_id: &str) -> bool {
    let id = ids::memory_id(post_id, &rt.agent_id);
    match rt.store.get_memory_by_id(&id).await {
        Ok(found) => found.is_some(),
        Err(e) => {
            // Unreadable store counts as processed
            log::error!("Twitter: Dedup lookup for post {} failed: {}", post_id, e);
            true
        }
    }
}

/// Highest post id handled so far
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HighWaterMark {
    latest: Option<String>,
}

impl HighWaterMark {
    pub fn cache_key(username: &str) -> String {
        format!("twitter/{}/latest_checked_tweet_id", username)
    }

    pub fn new(latest: Option<String>) -> Self {
        Self { latest }
    }

    pub async fn load(rt: &TwitterRuntime) -> Self {
        let key = Self::cache_key(rt.username());
        match cache_get_as::<String>(rt.store.as_ref(), &key).await {
            Ok(latest) => Self { latest },
            Err(e) => {
                log::warn!("Twitter: Could not load last checked post id: {}", e);
                Self::default()
            }
        }
    }

    /// Persist the mark, keeping whichever of the stored and local ids is
    /// newer. The interaction and quote loops share the key.
    pub async fn save(&self, rt: &TwitterRuntime) {
        let Some(latest) = &self.latest else {
            return;
        };
        let key = Self::cache_key(rt.username());
        let _guard = rt.mark_lock.lock().await;

        match cache_get_as::<String>(rt.store.as_ref(), &key).await {
            Ok(Some(stored)) if compare_ids(&stored, latest) != Ordering::Less => {
                log::debug!(
                    "Twitter: Stored last checked post id {} is not older than {}",
                    stored,
                    latest
                );
                return;
            }
            Ok(_) => {}
            Err(e) => log::warn!("Twitter: Could not re-read last checked post id: {}", e),
        }

        if let Err(e) = cache_set_as(rt.store.as_ref(), &key, latest).await {
            log::error!("Twitter: Failed to persist last checked post id: {}", e);
        }
    }

    pub fn latest(&self) -> Option<&str> {
        self.latest.as_deref()
    }

    /// Strictly newer than everything seen
    pub fn admits(&self, id: &str) -> bool {
        match &self.latest {
            Some(latest) => compare_ids(id, latest) == Ordering::Greater,
            None => true,
        }
    }

    pub fn advance(&mut self, id: &str) {
        if self.admits(id) {
            self.latest = Some(id.to_string());
        }
    }
}
