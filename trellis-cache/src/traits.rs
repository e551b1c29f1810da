//! Cache store trait definition.

use crate::error::CacheResult;
use async_trait::async_trait;
use serde_json::Value;

/// Cache store trait for different cache backends.
///
/// TTLs are in seconds. `None` means the store's default TTL; `0` or any
/// negative value means the entry never expires.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns `Ok(None)` for a missing or expired key.
    async fn get_json(&self, key: &str) -> CacheResult<Option<Value>>;

    async fn put_json(&self, key: &str, value: Value, ttl: Option<i64>) -> CacheResult<()>;

    /// Whether a live, non-null value is stored under `key`.
    async fn has(&self, key: &str) -> CacheResult<bool> {
        Ok(self
            .get_json(key)
            .await?
            .is_some_and(|value| !value.is_null()))
    }

    /// Remove `key`. Returns whether anything was removed.
    async fn forget(&self, key: &str) -> CacheResult<bool>;

    /// Remove every entry in this store.
    async fn flush(&self) -> CacheResult<()>;

    /// Add `delta` to an integer value and return the result. A missing key
    /// starts from zero.
    async fn increment(&self, key: &str, delta: i64) -> CacheResult<i64>;

    async fn decrement(&self, key: &str, delta: i64) -> CacheResult<i64> {
        self.increment(key, -delta).await
    }

    /// Backend name for logging.
    fn driver(&self) -> &'static str;
}
