//! Error types for cache operations.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-specific errors.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// `increment`/`decrement` on a value that is not an integer
    #[error("Cached value for '{0}' is not an integer")]
    NotNumeric(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<CacheError> for trellis_core::Error {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Io(e) => trellis_core::Error::Io(e),
            other => trellis_core::Error::Internal(other.to_string()),
        }
    }
}
