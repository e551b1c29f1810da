//! Shorthand constructors for common responses.
//!
//! Envelope helpers (`success`, `error` and friends) always serialize as
//! JSON; the plain helpers (`html`, `text`, `raw`, `json`) bypass the
//! envelope.

use crate::response::{ResponseBuilder, ResponseType};
use serde_json::{Value, json};

pub struct ResponseHelper;

impl ResponseHelper {
    pub fn success(data: impl Into<Value>, message: Option<&str>, meta: Option<Value>) -> ResponseBuilder {
        let mut builder = ResponseBuilder::new(data.into())
            .success(true)
            .response_type(ResponseType::Json);
        if let Some(message) = message {
            builder = builder.message(message);
        }
        if let Some(meta) = meta {
            builder = builder.meta(meta);
        }
        builder
    }

    pub fn created(data: impl Into<Value>) -> ResponseBuilder {
        Self::success(data, Some("Resource created successfully"), None).status(201)
    }

    pub fn no_content() -> ResponseBuilder {
        ResponseBuilder::default().status(204)
    }

    /// Error envelope. `status` defaults to 400 when `None`.
    pub fn error(
        message: &str,
        errors: Option<Value>,
        status: Option<u16>,
        code: Option<&str>,
    ) -> ResponseBuilder {
        let mut builder = ResponseBuilder::new(message)
            .success(false)
            .status(status.unwrap_or(400))
            .response_type(ResponseType::Json);
        if let Some(errors) = errors {
            builder = builder.errors(errors);
        }
        if let Some(code) = code {
            builder = builder.code(code);
        }
        builder
    }

    pub fn unauthorized(message: &str) -> ResponseBuilder {
        Self::error(message, None, Some(401), Some("UNAUTHORIZED"))
    }

    pub fn forbidden(message: &str) -> ResponseBuilder {
        Self::error(message, None, Some(403), Some("FORBIDDEN"))
    }

    pub fn not_found(message: &str) -> ResponseBuilder {
        Self::error(message, None, Some(404), Some("NOT_FOUND"))
    }

    pub fn validation_error(errors: Value, message: &str) -> ResponseBuilder {
        Self::error(message, Some(errors), Some(422), Some("VALIDATION_ERROR"))
    }

    pub fn limit_exceeded(message: &str) -> ResponseBuilder {
        Self::error(message, None, Some(429), Some("RATE_LIMIT_EXCEEDED"))
    }

    pub fn bad_request(message: &str) -> ResponseBuilder {
        Self::error(message, None, Some(400), Some("BAD_REQUEST"))
    }

    pub fn server_error(message: &str) -> ResponseBuilder {
        Self::error(message, None, Some(500), Some("SERVER_ERROR"))
    }

    /// Success envelope with `meta.pagination`.
    pub fn paginated(
        data: Vec<Value>,
        total: u64,
        page: u64,
        per_page: u64,
        message: Option<&str>,
    ) -> ResponseBuilder {
        let total_pages = if per_page == 0 {
            0
        } else {
            total.div_ceil(per_page)
        };
        let meta = json!({
            "pagination": {
                "total": total,
                "per_page": per_page,
                "current_page": page,
                "total_pages": total_pages,
                "has_more": page < total_pages,
            }
        });
        Self::success(Value::Array(data), message, Some(meta))
    }

    pub fn html(content: impl Into<String>) -> ResponseBuilder {
        ResponseBuilder::new(content.into()).response_type(ResponseType::Html)
    }

    pub fn text(content: impl Into<String>) -> ResponseBuilder {
        ResponseBuilder::new(content.into()).response_type(ResponseType::Text)
    }

    pub fn raw(body: Vec<u8>, content_type: &str) -> ResponseBuilder {
        ResponseBuilder::new(body)
            .response_type(ResponseType::Raw)
            .content_type(content_type)
    }

    pub fn json(value: Value) -> ResponseBuilder {
        ResponseBuilder::new(value).response_type(ResponseType::Json)
    }

    pub fn redirect(url: &str, status: u16) -> ResponseBuilder {
        ResponseBuilder::new(url)
            .response_type(ResponseType::Redirect)
            .status(status)
    }
}
