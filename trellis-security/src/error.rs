use thiserror::Error;

#[derive(Error, Debug)]
pub enum SecurityError {
    #[error("Invalid origin pattern '{pattern}': {reason}")]
    InvalidOrigin { pattern: String, reason: String },

    #[error("Wildcard origin cannot be combined with credentials")]
    WildcardWithCredentials,

    #[error("Invalid header value for {header}: {value}")]
    InvalidHeaderValue { header: &'static str, value: String },

    #[error("Invalid suspicious request pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, SecurityError>;

impl From<SecurityError> for trellis_core::Error {
    fn from(err: SecurityError) -> Self {
        trellis_core::Error::Internal(err.to_string())
    }
}
