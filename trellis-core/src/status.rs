// HTTP status codes used by the pipeline

/// Status codes produced by the framework's helpers and exceptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpStatus {
    Ok = 200,
    Created = 201,
    Accepted = 202,
    NoContent = 204,

    MovedPermanently = 301,
    Found = 302,
    SeeOther = 303,
    NotModified = 304,
    TemporaryRedirect = 307,
    PermanentRedirect = 308,

    BadRequest = 400,
    Unauthorized = 401,
    Forbidden = 403,
    NotFound = 404,
    MethodNotAllowed = 405,
    Conflict = 409,
    PayloadTooLarge = 413,
    UnprocessableEntity = 422,
    TooManyRequests = 429,

    InternalServerError = 500,
    BadGateway = 502,
    ServiceUnavailable = 503,
}

impl HttpStatus {
    pub fn code(&self) -> u16 {
        *self as u16
    }

    pub fn reason(&self) -> &'static str {
        match self {
            HttpStatus::Ok => "OK",
            HttpStatus::Created => "Created",
            HttpStatus::Accepted => "Accepted",
            HttpStatus::NoContent => "No Content",
            HttpStatus::MovedPermanently => "Moved Permanently",
            HttpStatus::Found => "Found",
            HttpStatus::SeeOther => "See Other",
            HttpStatus::NotModified => "Not Modified",
            HttpStatus::TemporaryRedirect => "Temporary Redirect",
            HttpStatus::PermanentRedirect => "Permanent Redirect",
            HttpStatus::BadRequest => "Bad Request",
            HttpStatus::Unauthorized => "Unauthorized",
            HttpStatus::Forbidden => "Forbidden",
            HttpStatus::NotFound => "Not Found",
            HttpStatus::MethodNotAllowed => "Method Not Allowed",
            HttpStatus::Conflict => "Conflict",
            HttpStatus::PayloadTooLarge => "Payload Too Large",
            HttpStatus::UnprocessableEntity => "Unprocessable Entity",
            HttpStatus::TooManyRequests => "Too Many Requests",
            HttpStatus::InternalServerError => "Internal Server Error",
            HttpStatus::BadGateway => "Bad Gateway",
            HttpStatus::ServiceUnavailable => "Service Unavailable",
        }
    }

    /// Machine-readable code placed in the `code` field of error envelopes.
    pub fn error_code(&self) -> &'static str {
        match self {
            HttpStatus::BadRequest => "BAD_REQUEST",
            HttpStatus::Unauthorized => "UNAUTHORIZED",
            HttpStatus::Forbidden => "FORBIDDEN",
            HttpStatus::NotFound => "NOT_FOUND",
            HttpStatus::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            HttpStatus::Conflict => "CONFLICT",
            HttpStatus::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            HttpStatus::UnprocessableEntity => "VALIDATION_ERROR",
            HttpStatus::TooManyRequests => "RATE_LIMIT_EXCEEDED",
            HttpStatus::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            _ => "SERVER_ERROR",
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code())
    }

    pub fn is_redirection(&self) -> bool {
        (300..400).contains(&self.code())
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code())
    }

    pub fn is_server_error(&self) -> bool {
        self.code() >= 500
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            200 => HttpStatus::Ok,
            201 => HttpStatus::Created,
            202 => HttpStatus::Accepted,
            204 => HttpStatus::NoContent,
            301 => HttpStatus::MovedPermanently,
            302 => HttpStatus::Found,
            303 => HttpStatus::SeeOther,
            304 => HttpStatus::NotModified,
            307 => HttpStatus::TemporaryRedirect,
            308 => HttpStatus::PermanentRedirect,
            400 => HttpStatus::BadRequest,
            401 => HttpStatus::Unauthorized,
            403 => HttpStatus::Forbidden,
            404 => HttpStatus::NotFound,
            405 => HttpStatus::MethodNotAllowed,
            409 => HttpStatus::Conflict,
            413 => HttpStatus::PayloadTooLarge,
            422 => HttpStatus::UnprocessableEntity,
            429 => HttpStatus::TooManyRequests,
            500 => HttpStatus::InternalServerError,
            502 => HttpStatus::BadGateway,
            503 => HttpStatus::ServiceUnavailable,
            _ => return None,
        })
    }
}

impl std::fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

impl From<HttpStatus> for u16 {
    fn from(status: HttpStatus) -> Self {
        status.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(HttpStatus::UnprocessableEntity.error_code(), "VALIDATION_ERROR");
        assert_eq!(HttpStatus::TooManyRequests.error_code(), "RATE_LIMIT_EXCEEDED");
        assert_eq!(HttpStatus::BadGateway.error_code(), "SERVER_ERROR");
    }

    #[test]
    fn test_categories_and_lookup() {
        assert!(HttpStatus::Found.is_redirection());
        assert!(HttpStatus::NotFound.is_client_error());
        assert!(HttpStatus::ServiceUnavailable.is_server_error());
        assert_eq!(HttpStatus::from_code(422), Some(HttpStatus::UnprocessableEntity));
        assert_eq!(HttpStatus::from_code(418), None);
        assert_eq!(HttpStatus::NoContent.to_string(), "204 No Content");
    }
}
