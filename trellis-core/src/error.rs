// Error types for the Trellis framework

use crate::HttpStatus;
use serde_json::Value;
use thiserror::Error;

/// Framework error.
///
/// The first group of variants are the HTTP exceptions a handler or
/// middleware raises on purpose; the centralized error handler turns them
/// into envelopes with their own status and message. Everything else is an
/// internal failure and maps to 500.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{message}")]
    Validation { message: String, errors: Value },

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too Many Requests: {0}")]
    TooManyRequests(String),

    #[error("Service Unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Configuration error: {0}")]
    Config(#[from] trellis_config::ConfigError),

    #[error("Middleware not registered: {0}")]
    MiddlewareNotFound(String),

    #[error("Duplicate route name: {0}")]
    DuplicateRouteName(String),

    #[error("Invalid route pattern for {uri}: {reason}")]
    InvalidRoutePattern { uri: String, reason: String },

    #[error("Context error: {0}")]
    Context(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>, errors: Value) -> Self {
        Error::Validation {
            message: message.into(),
            errors,
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Error::Http {
            status,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation { .. } => HttpStatus::UnprocessableEntity.code(),
            Error::BadRequest(_) | Error::Deserialization(_) => HttpStatus::BadRequest.code(),
            Error::Unauthorized(_) => HttpStatus::Unauthorized.code(),
            Error::Forbidden(_) => HttpStatus::Forbidden.code(),
            Error::NotFound(_) => HttpStatus::NotFound.code(),
            Error::Conflict(_) => HttpStatus::Conflict.code(),
            Error::TooManyRequests(_) => HttpStatus::TooManyRequests.code(),
            Error::ServiceUnavailable(_) => HttpStatus::ServiceUnavailable.code(),
            Error::Http { status, .. } => *status,
            _ => HttpStatus::InternalServerError.code(),
        }
    }

    /// Envelope `code` for this error.
    pub fn error_code(&self) -> &'static str {
        HttpStatus::from_code(self.status_code())
            .map(|s| s.error_code())
            .unwrap_or("SERVER_ERROR")
    }

    /// True for the deliberate HTTP exceptions whose message is safe to show.
    pub fn is_http_exception(&self) -> bool {
        matches!(
            self,
            Error::Validation { .. }
                | Error::BadRequest(_)
                | Error::Unauthorized(_)
                | Error::Forbidden(_)
                | Error::NotFound(_)
                | Error::Conflict(_)
                | Error::TooManyRequests(_)
                | Error::ServiceUnavailable(_)
                | Error::Http { .. }
        )
    }

    /// Message without the variant prefix, as shown to clients.
    pub fn public_message(&self) -> String {
        match self {
            Error::Validation { message, .. } => message.clone(),
            Error::BadRequest(m)
            | Error::Unauthorized(m)
            | Error::Forbidden(m)
            | Error::NotFound(m)
            | Error::Conflict(m)
            | Error::TooManyRequests(m)
            | Error::ServiceUnavailable(m)
            | Error::Deserialization(m) => m.clone(),
            Error::Http { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Field errors carried by a validation failure.
    pub fn errors(&self) -> Option<&Value> {
        match self {
            Error::Validation { errors, .. } => Some(errors),
            _ => None,
        }
    }

    /// Short variant name for debug output.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation { .. } => "ValidationError",
            Error::BadRequest(_) => "BadRequest",
            Error::Unauthorized(_) => "Unauthorized",
            Error::Forbidden(_) => "Forbidden",
            Error::NotFound(_) => "NotFound",
            Error::Conflict(_) => "Conflict",
            Error::TooManyRequests(_) => "TooManyRequests",
            Error::ServiceUnavailable(_) => "ServiceUnavailable",
            Error::Http { .. } => "HttpException",
            Error::Internal(_) => "Internal",
            Error::Serialization(_) => "Serialization",
            Error::Deserialization(_) => "Deserialization",
            Error::Config(_) => "Config",
            Error::MiddlewareNotFound(_) => "MiddlewareNotFound",
            Error::DuplicateRouteName(_) => "DuplicateRouteName",
            Error::InvalidRoutePattern { .. } => "InvalidRoutePattern",
            Error::Context(_) => "Context",
            Error::Io(_) => "Io",
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validation_error() {
        let err = Error::validation("Validation failed", json!({"email": ["required"]}));
        assert_eq!(err.status_code(), 422);
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert_eq!(err.public_message(), "Validation failed");
        assert_eq!(err.errors().unwrap()["email"][0], "required");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::Unauthorized("x".into()).status_code(), 401);
        assert_eq!(Error::NotFound("x".into()).status_code(), 404);
        assert_eq!(Error::http(418, "teapot").status_code(), 418);
        assert_eq!(Error::http(418, "teapot").error_code(), "SERVER_ERROR");
        assert_eq!(Error::Internal("boom".into()).status_code(), 500);
        assert_eq!(Error::MiddlewareNotFound("x".into()).status_code(), 500);
    }

    #[test]
    fn test_http_exception_classification() {
        assert!(Error::Forbidden("no".into()).is_http_exception());
        assert!(!Error::Internal("boom".into()).is_http_exception());
        assert!(Error::Forbidden("no".into()).is_client_error());
        assert!(Error::Internal("boom".into()).is_server_error());
    }
}
