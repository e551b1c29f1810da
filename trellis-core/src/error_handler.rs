//! Centralized conversion of errors into replies.

use crate::context::RequestContext;
use crate::response::{Reply, ResponseBuilder};
use crate::response_helper::ResponseHelper;
use crate::view::Views;
use crate::Error;
use serde_json::json;
use trellis_config::ConfigManager;
use crate::logging::{error, info, warn};

const GENERIC_MESSAGE: &str = "An error occurred while processing your request";

/// Turns any [`Error`] raised by a handler or middleware into a reply.
///
/// Browser clients get the `{prefix}.{status}` template when one exists;
/// everyone else gets the JSON error envelope.
#[derive(Clone)]
pub struct ErrorHandler {
    debug: bool,
    template_prefix: String,
    views: Option<Views>,
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new(false)
    }
}

impl ErrorHandler {
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            template_prefix: "errors".to_string(),
            views: None,
        }
    }

    /// Reads `app.APP_DEBUG` and `template.ERROR_TEMPLATE_PREFIX`.
    pub fn from_config(config: &ConfigManager) -> Self {
        Self {
            debug: config.get_or("app.APP_DEBUG", false),
            template_prefix: config.get_or("template.ERROR_TEMPLATE_PREFIX", "errors".to_string()),
            views: None,
        }
    }

    pub fn with_views(mut self, views: Views) -> Self {
        self.views = Some(views);
        self
    }

    pub fn with_template_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.template_prefix = prefix.into();
        self
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Client-facing message: HTTP exceptions keep theirs, internal
    /// failures are hidden outside debug mode.
    pub fn message_for(&self, err: &Error) -> String {
        if err.is_http_exception() || err.is_client_error() {
            err.public_message()
        } else if self.debug {
            err.to_string()
        } else {
            GENERIC_MESSAGE.to_string()
        }
    }

    pub fn handle(&self, ctx: &RequestContext, err: &Error) -> Reply {
        let status = err.status_code();
        let message = self.message_for(err);

        log_error(ctx, err, status);

        if !ctx.wants_json() {
            if let Some(views) = &self.views {
                let template = format!("{}.{}", self.template_prefix, status);
                if views.0.view_exists(&template) {
                    return ResponseBuilder::view(
                        template,
                        json!({"message": message, "path": ctx.path()}),
                    )
                    .status(status)
                    .into();
                }
            }
        }

        let mut builder =
            ResponseHelper::error(&message, err.errors().cloned(), Some(status), Some(err.error_code()));

        if self.debug {
            builder = builder.meta(json!({
                "debug": {
                    "path": ctx.path(),
                    "method": ctx.method(),
                    "type": err.kind(),
                }
            }));
        }

        builder.into()
    }
}

fn log_error(ctx: &RequestContext, err: &Error, status: u16) {
    if status >= 500 {
        error!(
            status,
            error_type = err.kind(),
            error = %err,
            method = %ctx.method(),
            path = %ctx.path(),
            "Request failed"
        );
    } else if status >= 400 {
        warn!(
            status,
            error_type = err.kind(),
            error = %err,
            method = %ctx.method(),
            path = %ctx.path(),
            "Request rejected"
        );
    } else {
        info!(status, method = %ctx.method(), path = %ctx.path(), "Request ended early");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HttpRequest;
    use crate::view::InMemoryViews;

    fn ctx(accept: &str) -> RequestContext {
        RequestContext::new(HttpRequest::new("GET", "/orders/9").with_header("Accept", accept))
    }

    #[test]
    fn test_internal_error_hidden_in_production() {
        let handler = ErrorHandler::new(false);
        let ctx = ctx("application/json");
        let response = handler
            .handle(&ctx, &Error::Internal("db password wrong".into()))
            .build(&ctx);

        assert_eq!(response.status, 500);
        let body = response.json_body().unwrap();
        assert_eq!(body["message"], GENERIC_MESSAGE);
        assert_eq!(body["code"], "SERVER_ERROR");
        assert!(body.get("meta").is_none());
    }

    #[test]
    fn test_debug_mode_exposes_details() {
        let handler = ErrorHandler::new(true);
        let ctx = ctx("application/json");
        let response = handler
            .handle(&ctx, &Error::Internal("boom".into()))
            .build(&ctx);

        let body = response.json_body().unwrap();
        assert!(body["message"].as_str().unwrap().contains("boom"));
        assert_eq!(body["meta"]["debug"]["path"], "/orders/9");
        assert_eq!(body["meta"]["debug"]["type"], "Internal");
    }

    #[test]
    fn test_validation_error_envelope() {
        let handler = ErrorHandler::default();
        let ctx = ctx("application/json");
        let err = Error::validation("Validation failed", json!({"qty": ["must be positive"]}));
        let response = handler.handle(&ctx, &err).build(&ctx);

        assert_eq!(response.status, 422);
        let body = response.json_body().unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Validation failed");
        assert_eq!(body["errors"]["qty"][0], "must be positive");
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[test]
    fn test_error_template_for_browsers() {
        let views = InMemoryViews::new().add("errors.404", "<h1>{{ message }}</h1><p>{{ path }}</p>");
        let handler = ErrorHandler::new(false).with_views(Views::new(views.clone()));

        let html_ctx = ctx("text/html");
        html_ctx.insert_extension(Views::new(views));
        let response = handler
            .handle(&html_ctx, &Error::NotFound("Order not found".into()))
            .build(&html_ctx);
        assert_eq!(response.status, 404);
        assert_eq!(response.body_text(), "<h1>Order not found</h1><p>/orders/9</p>");

        let json_ctx = ctx("application/json");
        let response = handler
            .handle(&json_ctx, &Error::NotFound("Order not found".into()))
            .build(&json_ctx);
        assert_eq!(response.json_body().unwrap()["code"], "NOT_FOUND");
    }
}
