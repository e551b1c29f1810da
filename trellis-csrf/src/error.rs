use thiserror::Error;

#[derive(Error, Debug)]
pub enum CsrfError {
    #[error("CSRF token invalid")]
    InvalidToken,

    #[error("CSRF token missing")]
    MissingToken,

    #[error("Invalid CSRF configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CsrfError>;

impl From<CsrfError> for trellis_core::Error {
    fn from(err: CsrfError) -> Self {
        match err {
            CsrfError::InvalidToken | CsrfError::MissingToken => {
                trellis_core::Error::Forbidden(err.to_string())
            }
            CsrfError::Config(msg) => trellis_core::Error::Internal(msg),
        }
    }
}
