//! Error types for session operations.

use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Session-specific errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Storage I/O error
    #[error("Session storage error: {0}")]
    Io(#[from] std::io::Error),

    /// Signed cookie payload failed verification
    #[error("Invalid session signature")]
    InvalidSignature,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session id is not one this store can persist
    #[error("Invalid session id")]
    InvalidId,

    /// Session was used before `start()`
    #[error("Session not started")]
    NotStarted,
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            SessionError::Deserialization(err.to_string())
        } else {
            SessionError::Serialization(err.to_string())
        }
    }
}

impl From<SessionError> for trellis_core::Error {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Io(e) => trellis_core::Error::Io(e),
            SessionError::Config(msg) => trellis_core::Error::Internal(format!("session config: {}", msg)),
            other => trellis_core::Error::Internal(other.to_string()),
        }
    }
}
