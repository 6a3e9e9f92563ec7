use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Serializes outbound platform requests: one in flight at a time, with a
/// minimum gap between the end of one and the start of the next.
pub struct RequestQueue {
    last_finished: Mutex<Option<Instant>>,
    min_spacing: Duration,
}

impl RequestQueue {
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            last_finished: Mutex::new(None),
            min_spacing,
        }
    }

    pub async fn add<F, Fut, T>(&self, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mut last = self.last_finished.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_spacing {
                tokio::time::sleep(self.min_spacing - elapsed).await;
            }
        }

        let result = op().await;
        *last = Some(Instant::now());
        result
    }
}
