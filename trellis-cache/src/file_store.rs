//! File-backed cache store.
//!
//! Each key lives in `{dir}/{sanitized_key}.cache` as JSON:
//!
//! ```json
//! {"value": ..., "ttl": 3600, "expires_at": 1700003600.0, "created_at": 1700000000.0}
//! ```
//!
//! `expires_at` is `-1` for entries that never expire. One async mutex
//! guards every read-modify-write so concurrent requests cannot interleave
//! an expiry check with a delete, or a write with a rename.

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::traits::CacheStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

const EXTENSION: &str = "cache";

#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    value: Value,
    ttl: i64,
    expires_at: f64,
    created_at: f64,
}

impl Entry {
    fn new(value: Value, ttl: i64) -> Self {
        let now = now_secs();
        Self {
            value,
            ttl,
            expires_at: if ttl > 0 { now + ttl as f64 } else { -1.0 },
            created_at: now,
        }
    }

    fn is_expired(&self) -> bool {
        if self.ttl <= 0 {
            return false;
        }
        now_secs() > self.expires_at
    }
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// Replace path separators and `:` so any key maps to one flat file name.
pub fn sanitize_key(key: &str) -> String {
    key.replace(['/', '\\', ':'], "_")
}

pub struct FileCacheStore {
    dir: PathBuf,
    default_ttl: i64,
    lock: Mutex<()>,
}

impl FileCacheStore {
    /// Create the store, creating its directory if needed.
    pub async fn new(config: CacheConfig) -> CacheResult<Self> {
        fs::create_dir_all(&config.path).await?;
        debug!(path = %config.path.display(), "File cache store ready");
        Ok(Self {
            dir: config.path,
            default_ttl: config.default_ttl,
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn default_ttl(&self) -> i64 {
        self.default_ttl
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", sanitize_key(key), EXTENSION))
    }

    /// Read a live entry. Expired entries are deleted; unreadable ones are
    /// treated as missing. Caller holds the lock.
    async fn read_entry(&self, key: &str) -> CacheResult<Option<Entry>> {
        let path = self.path_for(key);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: Entry = match serde_json::from_slice(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding corrupt cache entry");
                return Ok(None);
            }
        };

        if entry.is_expired() {
            trace!(key = %key, "Cache entry expired");
            remove_if_exists(&path).await?;
            return Ok(None);
        }
        Ok(Some(entry))
    }

    /// Write to a sibling temp file, then rename over the target. Caller
    /// holds the lock.
    async fn write_entry(&self, key: &str, entry: &Entry) -> CacheResult<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension(format!("{}.tmp", EXTENSION));
        let bytes =
            serde_json::to_vec_pretty(entry).map_err(|e| CacheError::Serialization(e.to_string()))?;

        fs::write(&tmp, bytes).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

async fn remove_if_exists(path: &Path) -> CacheResult<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn get_json(&self, key: &str) -> CacheResult<Option<Value>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_entry(key).await?.map(|entry| entry.value))
    }

    async fn put_json(&self, key: &str, value: Value, ttl: Option<i64>) -> CacheResult<()> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let _guard = self.lock.lock().await;
        self.write_entry(key, &Entry::new(value, ttl)).await?;
        trace!(key = %key, ttl, "Cache entry stored");
        Ok(())
    }

    async fn forget(&self, key: &str) -> CacheResult<bool> {
        let _guard = self.lock.lock().await;
        remove_if_exists(&self.path_for(key)).await
    }

    async fn flush(&self) -> CacheResult<()> {
        let _guard = self.lock.lock().await;
        let mut removed = 0usize;
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == EXTENSION) && remove_if_exists(&path).await? {
                removed += 1;
            }
        }
        debug!(removed, "Cache flushed");
        Ok(())
    }

    /// Keeps the existing entry's expiry. A new key gets the default TTL.
    async fn increment(&self, key: &str, delta: i64) -> CacheResult<i64> {
        let _guard = self.lock.lock().await;
        let entry = match self.read_entry(key).await? {
            Some(mut entry) => {
                let current = match &entry.value {
                    Value::Number(n) => n.as_i64(),
                    Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                }
                .ok_or_else(|| CacheError::NotNumeric(key.to_string()))?;
                entry.value = Value::from(current + delta);
                entry
            }
            None => Entry::new(Value::from(delta), self.default_ttl),
        };

        let result = entry.value.as_i64().unwrap_or(delta);
        self.write_entry(key, &entry).await?;
        Ok(result)
    }

    fn driver(&self) -> &'static str {
        "file"
    }
}
