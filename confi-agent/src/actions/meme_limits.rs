//! Per-user daily meme creation counter

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::memory::{cache_get_as, cache_set_as, MemoryStore};

/// Stored per user: creations inside the current UTC day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemeCount {
    pub count: u32,
    /// Unix seconds of the UTC midnight that opened the window
    pub window_start: i64,
}

/// Daily limiter backed by the memory store. Windows are UTC days; a count
/// from an earlier day reads as zero.
pub struct DailyLimiter {
    store: Arc<dyn MemoryStore>,
    limit: u32,
}

impl DailyLimiter {
    pub fn new(store: Arc<dyn MemoryStore>, limit: u32) -> Self {
        Self { store, limit }
    }

    pub fn cache_key(username: &str) -> String {
        format!("conflux/meme_count/{}", username)
    }

    fn window_start(now: DateTime<Utc>) -> i64 {
        now.date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight.and_utc().timestamp())
            .unwrap_or_else(|| now.timestamp())
    }

    /// Count for the window containing `now`
    pub async fn current(&self, username: &str, now: DateTime<Utc>) -> Result<MemeCount, String> {
        let window_start = Self::window_start(now);
        let stored: Option<MemeCount> =
            cache_get_as(self.store.as_ref(), &Self::cache_key(username)).await?;

        Ok(match stored {
            Some(count) if count.window_start >= window_start => count,
            _ => MemeCount {
                count: 0,
                window_start,
            },
        })
    }

    /// Error when the user already used up today's creations
    pub async fn check(&self, username: &str, now: DateTime<Utc>) -> Result<(), String> {
        let current = self.current(username, now).await?;
        if current.count >= self.limit {
            return Err(format!(
                "Daily meme creation limit ({}) reached for user {}",
                self.limit, username
            ));
        }
        Ok(())
    }

    pub async fn record(&self, username: &str, now: DateTime<Utc>) -> Result<MemeCount, String> {
        let mut current = self.current(username, now).await?;
        current.count += 1;
        cache_set_as(self.store.as_ref(), &Self::cache_key(username), &current).await?;
        log::debug!(
            "[CREATE_MEME] {} created {} meme(s) today",
            username,
            current.count
        );
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::TimeZone;

    fn limiter(limit: u32) -> DailyLimiter {
        DailyLimiter::new(Arc::new(Database::new(":memory:").unwrap()), limit)
    }

    #[tokio::test]
    async fn test_limit_reached_after_records() {
        let limiter = limiter(2);
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();

        limiter.check("alice", now).await.unwrap();
        limiter.record("alice", now).await.unwrap();
        limiter.check("alice", now).await.unwrap();
        limiter.record("alice", now).await.unwrap();

        let err = limiter.check("alice", now).await.unwrap_err();
        assert_eq!(err, "Daily meme creation limit (2) reached for user alice");
        // Other users are counted separately
        limiter.check("bob", now).await.unwrap();
    }

    #[tokio::test]
    async fn test_count_resets_on_new_utc_day() {
        let limiter = limiter(1);
        let late = Utc.with_ymd_and_hms(2024, 6, 1, 23, 59, 0).unwrap();
        let next_day = Utc.with_ymd_and_hms(2024, 6, 2, 0, 1, 0).unwrap();

        limiter.record("alice", late).await.unwrap();
        assert!(limiter.check("alice", late).await.is_err());

        limiter.check("alice", next_day).await.unwrap();
        let current = limiter.current("alice", next_day).await.unwrap();
        assert_eq!(current.count, 0);
        assert_eq!(
            current.window_start,
            Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap().timestamp()
        );

        let recorded = limiter.record("alice", next_day).await.unwrap();
        assert_eq!(recorded.count, 1);
    }
}
