//! Suspicious request logging.
//!
//! Runs after the response is built and never changes it. Requests whose
//! URL or `Host`, `User-Agent` or `Referer` header match a known probing
//! pattern are logged at WARN under the `security` target; 400 responses
//! are logged at INFO under `malformed`.

use crate::error::Result;
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use tracing::{info, warn};
use trellis_config::ConfigManager;
use trellis_core::{HttpRequest, HttpResponse, Middleware, RequestContext};

/// Patterns matched case-insensitively against the URL and inspected headers.
pub const DEFAULT_SUSPICIOUS_PATTERNS: &[&str] = &[
    r"\.\./",
    r"<script",
    r"union.*select",
    r"eval\(",
    r"base64_decode",
    r"phpinfo",
    r"wp-admin",
    r"\.env",
    r"\.git",
    r"admin",
    r"proxy",
];

const INSPECTED_HEADERS: &[&str] = &["host", "user-agent", "referer"];

/// What made a request suspicious.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuspiciousRequest {
    /// First match in the URL, if the URL matched.
    pub matched_pattern: Option<String>,
    /// Inspected headers whose value matched.
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct SecurityLoggerMiddleware {
    pattern: Regex,
}

impl SecurityLoggerMiddleware {
    pub fn new() -> Result<Self> {
        Self::with_patterns(DEFAULT_SUSPICIOUS_PATTERNS.iter().copied())
    }

    pub fn with_patterns<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let alternation = patterns.into_iter().collect::<Vec<_>>().join("|");
        let pattern = RegexBuilder::new(&alternation).case_insensitive(true).build()?;
        Ok(Self { pattern })
    }

    /// Reads `security.SUSPICIOUS_PATTERNS`, falling back to the defaults.
    pub fn from_config(config: &ConfigManager) -> Result<Self> {
        match config.get_or("security.SUSPICIOUS_PATTERNS", None::<Vec<String>>) {
            Some(patterns) if !patterns.is_empty() => {
                Self::with_patterns(patterns.iter().map(String::as_str))
            }
            _ => Self::new(),
        }
    }

    /// `app.SECURITY_LOGGING_ENABLED`, on unless set to false.
    pub fn enabled(config: &ConfigManager) -> bool {
        config.get_or("app.SECURITY_LOGGING_ENABLED", true)
    }

    /// Check a request's URL and inspected headers.
    pub fn inspect(&self, request: &HttpRequest) -> Option<SuspiciousRequest> {
        let url = full_url(request);
        let matched_pattern = self.pattern.find(&url).map(|m| m.as_str().to_string());

        let mut headers: Vec<(String, String)> = request
            .headers
            .iter()
            .filter(|(name, value)| {
                INSPECTED_HEADERS.contains(&name.to_ascii_lowercase().as_str())
                    && self.pattern.is_match(value)
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        headers.sort();

        if matched_pattern.is_none() && headers.is_empty() {
            return None;
        }
        Some(SuspiciousRequest {
            matched_pattern,
            headers,
        })
    }
}

/// Path plus the decoded query string, keys sorted.
fn full_url(request: &HttpRequest) -> String {
    if request.query_params.is_empty() {
        return request.path.clone();
    }
    let mut pairs: Vec<_> = request.query_params.iter().collect();
    pairs.sort();
    let query = pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", request.path, query)
}

#[async_trait]
impl Middleware for SecurityLoggerMiddleware {
    async fn after_build(&self, ctx: &RequestContext, response: &mut HttpResponse) -> trellis_core::Result<()> {
        let request = ctx.request();
        let analysis = ctx.analysis();

        if let Some(found) = self.inspect(request) {
            warn!(
                target: "security",
                ip = %ctx.client_ip(),
                method = %ctx.method(),
                url = %full_url(request),
                matched_pattern = ?found.matched_pattern,
                suspicious_headers = ?found.headers,
                user_agent = %analysis.user_agent,
                referer = analysis.referer.as_deref().unwrap_or("None"),
                status = response.status,
                "Suspicious request detected"
            );
        }

        if response.status == 400 {
            info!(
                target: "malformed",
                ip = %ctx.client_ip(),
                method = %ctx.method(),
                url = %full_url(request),
                user_agent = %analysis.user_agent,
                "Malformed request received"
            );
        }
        Ok(())
    }
}
