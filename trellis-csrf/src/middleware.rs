use crate::config::CsrfConfig;
use crate::error::CsrfError;
use crate::token::{self, CsrfTokenPair};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use trellis_core::{Cookie, Middleware, Reply, RequestContext, ResponseHelper, Result, SameSite};

/// Context key holding the token for the next request.
pub const CSRF_TOKEN_KEY: &str = "csrf_token";

/// Context key holding the cookie for the next request.
pub const CSRF_COOKIE_KEY: &str = "csrf_cookie";

/// CSRF protection middleware
///
/// Every request gets a freshly rotated token/cookie pair, including
/// requests that fail validation, so a rejected client can retry with the
/// new cookie. The token is exposed to handlers and templates under
/// [`CSRF_TOKEN_KEY`] in the request context.
#[derive(Clone)]
pub struct CsrfMiddleware {
    config: Arc<CsrfConfig>,
}

impl CsrfMiddleware {
    pub fn new(config: CsrfConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &CsrfConfig {
        &self.config
    }

    /// Whether the request must carry a valid token.
    pub fn needs_protection(&self, ctx: &RequestContext) -> bool {
        let method = ctx.method().to_ascii_uppercase();
        if !self.config.protected_methods.iter().any(|m| *m == method) {
            return false;
        }

        let Some(route) = ctx.route() else {
            return false;
        };

        if let Some(prefix) = route.prefix_without_blueprint() {
            let first = prefix.split('/').next().unwrap_or_default();
            if self.config.except_prefixes.iter().any(|p| p == first) {
                return false;
            }
        }

        route
            .get_blueprint()
            .is_some_and(|bp| self.config.protected_blueprints.iter().any(|p| p == bp))
    }

    /// Token from the configured header, then the form fields.
    fn token_from_request(&self, ctx: &RequestContext) -> Option<String> {
        let request = ctx.request();
        if let Some(token) = request.header(&self.config.header_name).filter(|t| !t.is_empty()) {
            return Some(token.to_string());
        }

        self.config.field_names.iter().find_map(|field| match request.input(field) {
            Some(Value::String(token)) if !token.is_empty() => Some(token),
            _ => None,
        })
    }

    fn validate(&self, ctx: &RequestContext) -> std::result::Result<(), CsrfError> {
        let token = self.token_from_request(ctx).ok_or(CsrfError::MissingToken)?;
        let cookie = ctx
            .request()
            .cookie(&self.config.cookie_name)
            .filter(|c| !c.is_empty())
            .ok_or(CsrfError::MissingToken)?;
        token::verify(&token, &cookie, &self.config.secret)
    }

    fn cookie(&self, value: &str) -> Cookie {
        Cookie::new(&self.config.cookie_name, value)
            .path(&self.config.cookie_path)
            .http_only(false)
            .secure(self.config.cookie_secure)
            .same_site(SameSite::Strict)
    }

    /// Rotated cookie for this request, if one was issued.
    fn rotated_cookie(&self, ctx: &RequestContext) -> Option<Cookie> {
        match ctx.get(CSRF_COOKIE_KEY, Value::Null) {
            Value::String(value) => Some(self.cookie(&value)),
            _ => None,
        }
    }
}

#[async_trait]
impl Middleware for CsrfMiddleware {
    async fn before(&self, ctx: &RequestContext) -> Result<Option<Reply>> {
        // Rotate before validating so a rejection still hands out a new pair.
        let pair = CsrfTokenPair::generate(&self.config.secret);
        ctx.set(CSRF_TOKEN_KEY, pair.token);
        ctx.set(CSRF_COOKIE_KEY, pair.cookie.clone());

        if !self.needs_protection(ctx) {
            return Ok(None);
        }

        if let Err(e) = self.validate(ctx) {
            warn!(path = %ctx.path(), method = %ctx.method(), reason = %e, "CSRF validation failed");
            let mut reply: Reply = ResponseHelper::forbidden(&e.to_string()).into();
            reply.set_cookie(self.cookie(&pair.cookie));
            return Ok(Some(reply));
        }

        debug!(path = %ctx.path(), "CSRF token verified");
        Ok(None)
    }

    async fn after(&self, ctx: &RequestContext, reply: Reply) -> Result<Reply> {
        if let Some(cookie) = self.rotated_cookie(ctx) {
            ctx.queue_cookie(cookie);
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{HttpRequest, HttpResponse, Route, handler};

    const SECRET: &str = "unit-test-secret";

    fn csrf() -> CsrfMiddleware {
        CsrfMiddleware::new(CsrfConfig::new(SECRET).unwrap())
    }

    fn route(blueprint: &str, prefix: &str) -> Arc<Route> {
        let mut route = Route::new(["POST"], "items", handler(|_| async { Ok(HttpResponse::ok()) }));
        route.blueprint(blueprint);
        if !prefix.is_empty() {
            route.prefix(prefix);
        }
        Arc::new(route)
    }

    fn ctx(request: HttpRequest, route: Arc<Route>) -> RequestContext {
        let ctx = RequestContext::new(request);
        ctx.set_route(Some(route));
        ctx
    }

    #[tokio::test]
    async fn test_get_is_exempt_but_rotates() {
        let ctx = ctx(HttpRequest::new("GET", "/api/items"), route("api", "api"));
        let mw = csrf();

        assert!(mw.before(&ctx).await.unwrap().is_none());
        assert!(ctx.has(CSRF_TOKEN_KEY));

        mw.after(&ctx, HttpResponse::ok().into()).await.unwrap();
        let cookie = ctx.queued_cookies().into_iter().find(|c| c.name == "csrf_token").unwrap();
        assert!(!cookie.http_only);
        assert_eq!(cookie.same_site, Some(SameSite::Strict));
    }

    #[tokio::test]
    async fn test_missing_cookie_rejected_with_new_cookie() {
        let ctx = ctx(
            HttpRequest::new("POST", "/api/items").with_header("X-CSRF-Token", "abc"),
            route("api", "api"),
        );
        let reply = csrf().before(&ctx).await.unwrap().unwrap();
        assert_eq!(reply.status(), 403);

        let response = reply.build(&ctx);
        let issued = response.cookie("csrf_token").unwrap();
        assert_eq!(Value::String(issued.value.clone()), ctx.get(CSRF_COOKIE_KEY, Value::Null));
    }

    #[tokio::test]
    async fn test_valid_pair_accepted() {
        let pair = CsrfTokenPair::generate(SECRET.as_bytes());
        let request = HttpRequest::new("POST", "/api/items")
            .with_header("X-CSRF-Token", pair.token.clone())
            .with_header("Cookie", format!("csrf_token={}", pair.cookie));
        let ctx = ctx(request, route("api", "api"));

        assert!(csrf().before(&ctx).await.unwrap().is_none());
        // The pair for the next request differs from the one just used.
        assert_ne!(ctx.get(CSRF_TOKEN_KEY, Value::Null), Value::String(pair.token));
    }

    #[tokio::test]
    async fn test_form_field_token_accepted() {
        let pair = CsrfTokenPair::generate(SECRET.as_bytes());
        let request = HttpRequest::new("POST", "/api/items")
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_header("Cookie", format!("csrf_token={}", pair.cookie))
            .with_body(format!("_csrf_token={}&name=x", pair.token));
        let ctx = ctx(request, route("api", "api"));

        assert!(csrf().before(&ctx).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mismatched_pair_rejected() {
        let a = CsrfTokenPair::generate(SECRET.as_bytes());
        let b = CsrfTokenPair::generate(SECRET.as_bytes());
        let request = HttpRequest::new("DELETE", "/api/items")
            .with_header("X-CSRF-Token", a.token)
            .with_header("Cookie", format!("csrf_token={}", b.cookie));
        let ctx = ctx(request, route("api", "api"));

        let reply = csrf().before(&ctx).await.unwrap().unwrap();
        assert_eq!(reply.status(), 403);
    }

    #[tokio::test]
    async fn test_auth_prefix_and_web_routes_exempt() {
        let mw = csrf();

        let auth = ctx(HttpRequest::new("POST", "/api/auth/login"), route("api", "api/auth"));
        assert!(!mw.needs_protection(&auth));

        let web = ctx(HttpRequest::new("POST", "/items"), route("web", ""));
        assert!(!mw.needs_protection(&web));

        let api = ctx(HttpRequest::new("PATCH", "/api/items"), route("api", "api"));
        assert!(mw.needs_protection(&api));
    }
}
