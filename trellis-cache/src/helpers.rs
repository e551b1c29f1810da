//! Helper functions for common cache operations.

use crate::error::{CacheError, CacheResult};
use crate::traits::CacheStore;
use serde::{Serialize, de::DeserializeOwned};

/// Get a typed value from the cache.
pub async fn get<S, T>(store: &S, key: &str) -> CacheResult<Option<T>>
where
    S: CacheStore + ?Sized,
    T: DeserializeOwned,
{
    match store.get_json(key).await? {
        Some(value) if !value.is_null() => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| CacheError::Deserialization(e.to_string())),
        _ => Ok(None),
    }
}

/// Store a typed value. `ttl` follows [`CacheStore::put_json`].
pub async fn put<S, T>(store: &S, key: &str, value: &T, ttl: Option<i64>) -> CacheResult<()>
where
    S: CacheStore + ?Sized,
    T: Serialize,
{
    let value = serde_json::to_value(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
    store.put_json(key, value, ttl).await
}

/// Remember a value for a given duration.
///
/// If the key exists, returns the cached value.
/// If not, calls the factory function, caches the result, and returns it.
pub async fn remember<S, T, F, Fut>(store: &S, key: &str, ttl: Option<i64>, factory: F) -> CacheResult<T>
where
    S: CacheStore + ?Sized,
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = CacheResult<T>>,
{
    if let Some(value) = get(store, key).await? {
        return Ok(value);
    }

    let value = factory().await?;
    put(store, key, &value, ttl).await?;
    Ok(value)
}

/// Remember a value forever (no TTL).
pub async fn remember_forever<S, T, F, Fut>(store: &S, key: &str, factory: F) -> CacheResult<T>
where
    S: CacheStore + ?Sized,
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = CacheResult<T>>,
{
    remember(store, key, Some(0), factory).await
}
