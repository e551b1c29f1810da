//! Rate limit configuration

use crate::error::{RateLimitError, RateLimitResult};
use std::collections::HashMap;
use std::time::Duration;
use trellis_config::ConfigManager;

pub const DEFAULT_RATE_LIMIT: u64 = 100;
pub const DEFAULT_RATE_LIMIT_WINDOW: u64 = 60;
pub const DEFAULT_AUTH_RATE_LIMIT: u64 = 20;

/// Bucket category for routes under the auth prefix
pub const AUTH_ROUTE_KEY: &str = "auth";
/// Bucket category for every other limited route
pub const API_ROUTE_KEY: &str = "api";

/// A request budget over a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub max_requests: u64,
    pub window: Duration,
}

impl Limit {
    pub fn new(max_requests: u64, window: Duration) -> RateLimitResult<Self> {
        if max_requests == 0 {
            return Err(RateLimitError::InvalidLimit {
                key: String::new(),
                reason: "max requests must be greater than 0".into(),
            });
        }
        if window.is_zero() {
            return Err(RateLimitError::InvalidLimit {
                key: String::new(),
                reason: "window must be non-zero".into(),
            });
        }
        Ok(Self { max_requests, window })
    }

    pub fn per_minute(max_requests: u64) -> RateLimitResult<Self> {
        Self::new(max_requests, Duration::from_secs(60))
    }
}

/// Rate limit middleware configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Limit for route keys without their own entry
    pub default_limit: Limit,
    /// Limits by route key (`auth`, `api`, or custom)
    pub route_limits: HashMap<String, Limit>,
    /// Blueprints whose routes are limited
    pub blueprints: Vec<String>,
    /// First prefix segment that selects the `auth` bucket
    pub auth_prefix: String,
    /// Add `X-RateLimit-*` headers to responses
    pub include_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let window = Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW);
        let default_limit = Limit {
            max_requests: DEFAULT_RATE_LIMIT,
            window,
        };
        let route_limits = HashMap::from([
            (
                AUTH_ROUTE_KEY.to_string(),
                Limit {
                    max_requests: DEFAULT_AUTH_RATE_LIMIT,
                    window,
                },
            ),
            (API_ROUTE_KEY.to_string(), default_limit),
        ]);

        Self {
            default_limit,
            route_limits,
            blueprints: vec!["api".to_string()],
            auth_prefix: AUTH_ROUTE_KEY.to_string(),
            include_headers: true,
        }
    }
}

impl RateLimitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `app.RATE_LIMIT_DEFAULT`, `app.RATE_LIMIT_WINDOW` and
    /// `app.AUTH_RATE_LIMIT`.
    pub fn from_config(config: &ConfigManager) -> RateLimitResult<Self> {
        let window = Duration::from_secs(config.get_or("app.RATE_LIMIT_WINDOW", DEFAULT_RATE_LIMIT_WINDOW));
        let default_limit = Limit::new(config.get_or("app.RATE_LIMIT_DEFAULT", DEFAULT_RATE_LIMIT), window)
            .map_err(|e| with_key(e, "app.RATE_LIMIT_DEFAULT"))?;
        let auth_limit = Limit::new(config.get_or("app.AUTH_RATE_LIMIT", DEFAULT_AUTH_RATE_LIMIT), window)
            .map_err(|e| with_key(e, "app.AUTH_RATE_LIMIT"))?;

        Ok(Self::default()
            .with_default_limit(default_limit)
            .with_route_limit(API_ROUTE_KEY, default_limit)
            .with_route_limit(AUTH_ROUTE_KEY, auth_limit)
            .with_headers(config.get_or("app.RATE_LIMIT_HEADERS", true)))
    }

    /// `app.RATE_LIMIT_ENABLED`, on unless set to false.
    pub fn enabled(config: &ConfigManager) -> bool {
        config.get_or("app.RATE_LIMIT_ENABLED", true)
    }

    pub fn with_default_limit(mut self, limit: Limit) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn with_route_limit(mut self, route_key: impl Into<String>, limit: Limit) -> Self {
        self.route_limits.insert(route_key.into(), limit);
        self
    }

    pub fn with_blueprints<I, S>(mut self, blueprints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blueprints = blueprints.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_headers(mut self, include: bool) -> Self {
        self.include_headers = include;
        self
    }

    pub fn limit_for(&self, route_key: &str) -> Limit {
        self.route_limits
            .get(route_key)
            .copied()
            .unwrap_or(self.default_limit)
    }

    /// Longest window across the default and per-route limits.
    pub fn longest_window(&self) -> Duration {
        self.route_limits
            .values()
            .map(|limit| limit.window)
            .fold(self.default_limit.window, Duration::max)
    }
}

fn with_key(err: RateLimitError, key: &str) -> RateLimitError {
    match err {
        RateLimitError::InvalidLimit { reason, .. } => RateLimitError::InvalidLimit {
            key: key.to_string(),
            reason,
        },
        other => other,
    }
}
