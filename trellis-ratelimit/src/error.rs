//! Error types for rate limiting

use thiserror::Error;

/// Result type for rate limiting operations
pub type RateLimitResult<T> = Result<T, RateLimitError>;

#[derive(Debug, Error)]
pub enum RateLimitError {
    /// A limit with zero requests or a zero-length window
    #[error("Invalid rate limit for '{key}': {reason}")]
    InvalidLimit { key: String, reason: String },

    #[error("Rate limit configuration error: {0}")]
    ConfigError(String),
}

impl RateLimitError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }
}

impl From<RateLimitError> for trellis_core::Error {
    fn from(err: RateLimitError) -> Self {
        trellis_core::Error::Internal(err.to_string())
    }
}

/// Standard rate limit headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitHeaders {
    /// X-RateLimit-Limit: Maximum requests allowed
    pub limit: u64,
    /// X-RateLimit-Remaining: Requests remaining in current window
    pub remaining: u64,
    /// Retry-After: Seconds until the client should retry (only when limited)
    pub retry_after: Option<u64>,
}

impl RateLimitHeaders {
    pub fn allowed(limit: u64, remaining: u64) -> Self {
        Self {
            limit,
            remaining,
            retry_after: None,
        }
    }

    pub fn denied(limit: u64, retry_after: u64) -> Self {
        Self {
            limit,
            remaining: 0,
            retry_after: Some(retry_after),
        }
    }

    pub fn to_header_pairs(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("X-RateLimit-Limit", self.limit.to_string()),
            ("X-RateLimit-Remaining", self.remaining.to_string()),
        ];

        if let Some(retry) = self.retry_after {
            headers.push(("Retry-After", retry.to_string()));
        }

        headers
    }
}
