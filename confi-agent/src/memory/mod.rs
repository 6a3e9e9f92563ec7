//! Store interface used by the platform clients and actions.
//!
//! Everything that persists state (seen posts, replies, high-water marks,
//! counters) goes through `MemoryStore`, so tests and alternative backends can
//! swap the SQLite database out.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::db::Database;
use crate::models::MemoryRecord;

#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn get_memory_by_id(&self, id: &Uuid) -> Result<Option<MemoryRecord>, String>;

    /// Persist a memory. A second create with the same id is a no-op that
    /// returns `Ok(false)`.
    async fn create_memory(&self, record: &MemoryRecord) -> Result<bool, String>;

    async fn cache_get(&self, key: &str) -> Result<Option<Value>, String>;

    async fn cache_set(&self, key: &str, value: &Value) -> Result<(), String>;
}

#[async_trait]
impl MemoryStore for Database {
    async fn get_memory_by_id(&self, id: &Uuid) -> Result<Option<MemoryRecord>, String> {
        self.get_memory(id)
            .map_err(|e| format!("Failed to load memory {}: {}", id, e))
    }

    async fn create_memory(&self, record: &MemoryRecord) -> Result<bool, String> {
        self.insert_memory(record)
            .map_err(|e| format!("Failed to create memory {}: {}", record.id, e))
    }

    async fn cache_get(&self, key: &str) -> Result<Option<Value>, String> {
        let raw = self
            .get_cache(key)
            .map_err(|e| format!("Failed to read cache {}: {}", key, e))?;

        match raw {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| format!("Corrupt cache entry {}: {}", key, e)),
            None => Ok(None),
        }
    }

    async fn cache_set(&self, key: &str, value: &Value) -> Result<(), String> {
        self.set_cache(key, &value.to_string())
            .map_err(|e| format!("Failed to write cache {}: {}", key, e))
    }
}

/// Typed read of a cache entry
pub async fn cache_get_as<T: DeserializeOwned>(
    store: &dyn MemoryStore,
    key: &str,
) -> Result<Option<T>, String> {
    match store.cache_get(key).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| format!("Unexpected shape for cache entry {}: {}", key, e)),
        None => Ok(None),
    }
}

/// Typed write of a cache entry
pub async fn cache_set_as<T: Serialize + ?Sized>(
    store: &dyn MemoryStore,
    key: &str,
    value: &T,
) -> Result<(), String> {
    let value = serde_json::to_value(value)
        .map_err(|e| format!("Failed to encode cache entry {}: {}", key, e))?;
    store.cache_set(key, &value).await
}
