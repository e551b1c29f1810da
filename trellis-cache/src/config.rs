//! Cache configuration types.

use std::path::PathBuf;
use trellis_config::ConfigManager;

pub const DEFAULT_CACHE_PATH: &str = "storage/cache";

/// One hour
pub const DEFAULT_CACHE_TTL: i64 = 3600;

/// Cache configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Directory holding the `*.cache` files
    pub path: PathBuf,

    /// TTL in seconds applied when `put` is called without one
    pub default_ttl: i64,
}

impl CacheConfig {
    /// # Examples
    ///
    /// ```
    /// use trellis_cache::CacheConfig;
    ///
    /// let config = CacheConfig::file("/tmp/app-cache").with_ttl(600);
    /// assert_eq!(config.default_ttl, 600);
    /// ```
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            default_ttl: DEFAULT_CACHE_TTL,
        }
    }

    /// Reads `cache.PATH` and `cache.TTL`.
    pub fn from_config(config: &ConfigManager) -> Self {
        Self {
            path: PathBuf::from(config.get_or("cache.PATH", DEFAULT_CACHE_PATH.to_string())),
            default_ttl: config.get_or("cache.TTL", DEFAULT_CACHE_TTL),
        }
    }

    pub fn with_ttl(mut self, seconds: i64) -> Self {
        self.default_ttl = seconds;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::file(DEFAULT_CACHE_PATH)
    }
}
