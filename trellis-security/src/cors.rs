//! CORS (Cross-Origin Resource Sharing) configuration and middleware
//!
//! Origins are declared as `*`, an exact origin such as
//! `https://example.com`, or a wildcard such as `https://*.example.com`.
//! Wildcards are compiled to anchored regexes when the config is built.
//!
//! # Examples
//!
//! ```
//! use trellis_security::cors::{CorsConfig, CorsMiddleware};
//!
//! let cors = CorsConfig::new()
//!     .allow_origins(["https://example.com", "https://*.example.com"])
//!     .unwrap()
//!     .allow_credentials(true)
//!     .max_age(3600);
//!
//! assert!(cors.is_origin_allowed("https://app.example.com"));
//! let middleware = CorsMiddleware::new(cors).unwrap();
//! # let _ = middleware;
//! ```

use crate::error::{Result, SecurityError};
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use trellis_config::ConfigManager;
use trellis_core::{HttpRequest, HttpResponse, Middleware, Reply, RequestContext, ResponseHelper};

pub const DEFAULT_METHODS: [&str; 6] = ["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"];
pub const DEFAULT_HEADERS: [&str; 5] = [
    "Content-Type",
    "Authorization",
    "X-Requested-With",
    "X-CSRF-Token",
    "Accept",
];
pub const DEFAULT_MAX_AGE: u64 = 3600;

/// CORS configuration
#[derive(Debug, Clone)]
pub struct CorsConfig {
    allowed_origins: HashSet<String>,
    allow_any_origin: bool,
    origin_patterns: Vec<Regex>,
    /// Upper-cased, in declaration order
    allowed_methods: Vec<String>,
    /// Lower-cased for comparison
    allowed_headers: HashSet<String>,
    allow_any_header: bool,
    exposed_headers: Vec<String>,
    allow_credentials: bool,
    max_age: Option<u64>,
}

impl CorsConfig {
    /// No origins allowed; default methods and headers.
    pub fn new() -> Self {
        Self {
            allowed_origins: HashSet::new(),
            allow_any_origin: false,
            origin_patterns: Vec::new(),
            allowed_methods: DEFAULT_METHODS.iter().map(|m| m.to_string()).collect(),
            allowed_headers: DEFAULT_HEADERS.iter().map(|h| h.to_ascii_lowercase()).collect(),
            allow_any_header: false,
            exposed_headers: Vec::new(),
            allow_credentials: false,
            max_age: Some(DEFAULT_MAX_AGE),
        }
    }

    /// Any origin, any header. Credentials stay off.
    pub fn permissive() -> Self {
        Self {
            allow_any_origin: true,
            allow_any_header: true,
            ..Self::new()
        }
    }

    /// Reads `security.ALLOWED_ORIGINS`, `security.CORS_*`.
    pub fn from_config(config: &ConfigManager) -> Result<Self> {
        let origins: Vec<String> = config.get_or("security.ALLOWED_ORIGINS", vec!["*".to_string()]);
        let methods: Vec<String> = config.get_or(
            "security.CORS_METHODS",
            DEFAULT_METHODS.iter().map(|m| m.to_string()).collect(),
        );
        let headers: Vec<String> = config.get_or(
            "security.CORS_HEADERS",
            DEFAULT_HEADERS.iter().map(|h| h.to_string()).collect(),
        );
        let exposed: Vec<String> = config.get_or("security.CORS_EXPOSE_HEADERS", Vec::new());

        Ok(Self::new()
            .allow_origins(origins)?
            .allow_methods(methods)
            .allow_headers(headers)
            .expose_headers(exposed)
            .allow_credentials(config.get_or("security.CORS_ALLOW_CREDENTIALS", false))
            .max_age(config.get_or("security.CORS_MAX_AGE", DEFAULT_MAX_AGE)))
    }

    /// CORS is on when `security.CORS_ENABLED` is set, and always in debug.
    pub fn enabled(config: &ConfigManager) -> bool {
        config.get_or("security.CORS_ENABLED", false) || config.get_or("app.APP_DEBUG", false)
    }

    /// Add one origin: `*`, exact, or containing `*` wildcards.
    pub fn allow_origin(mut self, origin: impl AsRef<str>) -> Result<Self> {
        let origin = origin.as_ref().trim().trim_end_matches('/');
        if origin == "*" {
            self.allow_any_origin = true;
        } else if origin.contains('*') {
            self.origin_patterns.push(compile_origin_pattern(origin)?);
        } else if !origin.is_empty() {
            self.allowed_origins.insert(origin.to_string());
        }
        Ok(self)
    }

    pub fn allow_origins<I, S>(self, origins: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        origins.into_iter().try_fold(self, |cors, origin| cors.allow_origin(origin))
    }

    /// Add an origin regex as is.
    pub fn allow_origin_regex(mut self, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| SecurityError::InvalidOrigin {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        self.origin_patterns.push(regex);
        Ok(self)
    }

    pub fn allow_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_methods = methods
            .into_iter()
            .map(|m| m.as_ref().trim().to_ascii_uppercase())
            .filter(|m| !m.is_empty())
            .collect();
        self
    }

    /// `*` in the list allows any header.
    pub fn allow_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_headers.clear();
        self.allow_any_header = false;
        for header in headers {
            let header = header.as_ref().trim();
            if header == "*" {
                self.allow_any_header = true;
            } else if !header.is_empty() {
                self.allowed_headers.insert(header.to_ascii_lowercase());
            }
        }
        self
    }

    pub fn expose_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exposed_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    /// Allow credentials (cookies, authorization headers).
    ///
    /// Cannot be combined with a `*` origin; [`CorsMiddleware::new`]
    /// rejects that combination.
    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }

    /// Preflight cache lifetime in seconds. Zero omits the header.
    pub fn max_age(mut self, seconds: u64) -> Self {
        self.max_age = (seconds > 0).then_some(seconds);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.allow_any_origin && self.allow_credentials {
            return Err(SecurityError::WildcardWithCredentials);
        }
        Ok(())
    }

    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.allow_any_origin
            || self.allowed_origins.contains(origin)
            || self.origin_patterns.iter().any(|p| p.is_match(origin))
    }

    pub fn is_method_allowed(&self, method: &str) -> bool {
        let method = method.trim().to_ascii_uppercase();
        self.allowed_methods.iter().any(|m| *m == method)
    }

    pub fn is_header_allowed(&self, header: &str) -> bool {
        self.allow_any_header || self.allowed_headers.contains(&header.trim().to_ascii_lowercase())
    }

    /// Headers for an actual (non-preflight) response from `origin`.
    pub fn response_headers(&self, origin: &str) -> Vec<(&'static str, String)> {
        let mut headers = Vec::new();
        if !self.is_origin_allowed(origin) {
            return headers;
        }

        if self.allow_any_origin && !self.allow_credentials {
            headers.push(("Access-Control-Allow-Origin", "*".to_string()));
        } else {
            headers.push(("Access-Control-Allow-Origin", origin.to_string()));
            headers.push(("Vary", "Origin".to_string()));
        }

        if self.allow_credentials {
            headers.push(("Access-Control-Allow-Credentials", "true".to_string()));
        }

        if !self.exposed_headers.is_empty() {
            headers.push(("Access-Control-Expose-Headers", self.exposed_headers.join(", ")));
        }

        headers
    }

    /// Build the 204 preflight response, or `None` when the origin or the
    /// requested method is not allowed.
    pub fn preflight(&self, request: &HttpRequest) -> Option<HttpResponse> {
        let origin = request.header("origin")?;
        if !self.is_origin_allowed(origin) {
            return None;
        }
        let method = request.header("access-control-request-method")?;
        if !self.is_method_allowed(method) {
            return None;
        }

        let mut response = HttpResponse::no_content();
        for (name, value) in self.response_headers(origin) {
            response.set_header(name, value);
        }
        response.set_header("Access-Control-Allow-Methods", self.allowed_methods.join(", "));

        if let Some(requested) = request.header("access-control-request-headers") {
            let allowed = if self.allow_any_header {
                requested.to_string()
            } else {
                requested
                    .split(',')
                    .map(str::trim)
                    .filter(|h| self.is_header_allowed(h))
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            if !allowed.is_empty() {
                response.set_header("Access-Control-Allow-Headers", allowed);
            }
        }

        if let Some(max_age) = self.max_age {
            response.set_header("Access-Control-Max-Age", max_age.to_string());
        }

        Some(response)
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn compile_origin_pattern(origin: &str) -> Result<Regex> {
    let escaped = origin
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("[A-Za-z0-9-]+(?:\\.[A-Za-z0-9-]+)*");
    Regex::new(&format!("^{}$", escaped)).map_err(|e| SecurityError::InvalidOrigin {
        pattern: origin.to_string(),
        reason: e.to_string(),
    })
}

fn is_preflight(request: &HttpRequest) -> bool {
    request.method.eq_ignore_ascii_case("OPTIONS")
        && request.header("origin").is_some()
        && request.header("access-control-request-method").is_some()
}

/// CORS middleware
///
/// Preflight requests are answered in the before-phase without reaching
/// the handler. Actual requests get their CORS headers queued in the
/// after-phase.
#[derive(Debug, Clone)]
pub struct CorsMiddleware {
    config: Arc<CorsConfig>,
}

impl CorsMiddleware {
    pub fn new(config: CorsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn from_config(config: &ConfigManager) -> Result<Self> {
        Self::new(CorsConfig::from_config(config)?)
    }

    pub fn config(&self) -> &CorsConfig {
        &self.config
    }
}

#[async_trait]
impl Middleware for CorsMiddleware {
    async fn before(&self, ctx: &RequestContext) -> trellis_core::Result<Option<Reply>> {
        let request = ctx.request();
        if !is_preflight(request) {
            return Ok(None);
        }

        match self.config.preflight(request) {
            Some(response) => Ok(Some(response.into())),
            None => {
                debug!(
                    origin = request.header("origin").unwrap_or_default(),
                    path = %ctx.path(),
                    "CORS preflight rejected"
                );
                Ok(Some(ResponseHelper::forbidden("Origin not allowed").into()))
            }
        }
    }

    async fn after(&self, ctx: &RequestContext, reply: Reply) -> trellis_core::Result<Reply> {
        if let Some(origin) = ctx.request().header("origin") {
            for (name, value) in self.config.response_headers(origin) {
                ctx.queue_header(name, value);
            }
        }
        Ok(reply)
    }
}
