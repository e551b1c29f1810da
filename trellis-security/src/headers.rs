//! Security headers middleware.
//!
//! Queues the OWASP recommended response headers on every request during
//! the after-phase. An empty string in config turns a header off.

use crate::content_security_policy::CspPolicy;
use crate::error::Result;
use crate::frame_guard::FrameGuard;
use crate::hsts::HstsConfig;
use crate::referrer_policy::ReferrerPolicy;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;
use trellis_config::ConfigManager;
use trellis_core::{Middleware, Reply, RequestContext};

/// Restrictive default for `Permissions-Policy`.
pub const DEFAULT_PERMISSIONS_POLICY: &str = "geolocation=(), microphone=(), camera=(), payment=(), \
     usb=(), magnetometer=(), gyroscope=(), accelerometer=()";

#[derive(Debug, Clone)]
pub struct SecurityHeadersConfig {
    pub frame_guard: Option<FrameGuard>,
    pub content_type_options: Option<String>,
    pub xss_protection: Option<String>,
    /// `None` disables the header entirely.
    pub csp: Option<CspPolicy>,
    pub hsts: Option<HstsConfig>,
    pub referrer_policy: Option<ReferrerPolicy>,
    pub permissions_policy: Option<String>,
    pub custom_headers: BTreeMap<String, String>,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            frame_guard: Some(FrameGuard::Deny),
            content_type_options: Some("nosniff".to_string()),
            xss_protection: Some("1; mode=block".to_string()),
            csp: Some(CspPolicy::default()),
            hsts: None,
            referrer_policy: Some(ReferrerPolicy::default()),
            permissions_policy: Some(DEFAULT_PERMISSIONS_POLICY.to_string()),
            custom_headers: BTreeMap::new(),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let value = value.trim().to_string();
    (!value.is_empty()).then_some(value)
}

impl SecurityHeadersConfig {
    /// Reads the `security.*` header keys. Unparseable frame or referrer
    /// values fail the boot.
    pub fn from_config(config: &ConfigManager) -> Result<Self> {
        let frame_guard = non_empty(config.get_or("security.X_FRAME_OPTIONS", "DENY".to_string()))
            .map(|v| v.parse::<FrameGuard>())
            .transpose()?;

        let referrer_policy = non_empty(config.get_or(
            "security.REFERRER_POLICY",
            ReferrerPolicy::default().to_header_value(),
        ))
        .map(|v| v.parse::<ReferrerPolicy>())
        .transpose()?;

        let csp = if config.get_or("security.CSP_ENABLED", true) {
            match config.get_or("security.CSP_POLICY", None::<String>).and_then(non_empty) {
                Some(raw) => Some(CspPolicy::parse(&raw)),
                None => Some(CspPolicy::default()),
            }
        } else {
            None
        };

        // Absent means the restrictive default; an explicit empty string opts out.
        let permissions_policy = match config.get_or("security.PERMISSIONS_POLICY", None::<String>) {
            Some(raw) => non_empty(raw),
            None => Some(DEFAULT_PERMISSIONS_POLICY.to_string()),
        };

        Ok(Self {
            frame_guard,
            content_type_options: non_empty(
                config.get_or("security.X_CONTENT_TYPE_OPTIONS", "nosniff".to_string()),
            ),
            xss_protection: non_empty(
                config.get_or("security.X_XSS_PROTECTION", "1; mode=block".to_string()),
            ),
            csp,
            hsts: HstsConfig::from_config(config),
            referrer_policy,
            permissions_policy,
            custom_headers: config.get_or("security.CUSTOM_HEADERS", BTreeMap::new()),
        })
    }

    pub fn with_frame_guard(mut self, guard: Option<FrameGuard>) -> Self {
        self.frame_guard = guard;
        self
    }

    pub fn with_csp(mut self, csp: Option<CspPolicy>) -> Self {
        self.csp = csp;
        self
    }

    pub fn with_hsts(mut self, hsts: Option<HstsConfig>) -> Self {
        self.hsts = hsts;
        self
    }

    pub fn with_referrer_policy(mut self, policy: Option<ReferrerPolicy>) -> Self {
        self.referrer_policy = policy;
        self
    }

    pub fn with_permissions_policy(mut self, policy: Option<String>) -> Self {
        self.permissions_policy = policy;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.insert(name.into(), value.into());
        self
    }

    /// Header pairs in the order they are queued.
    pub fn headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::new();

        if let Some(guard) = &self.frame_guard {
            headers.push(("X-Frame-Options".to_string(), guard.to_header_value()));
        }
        if let Some(value) = &self.content_type_options {
            headers.push(("X-Content-Type-Options".to_string(), value.clone()));
        }
        if let Some(value) = &self.xss_protection {
            headers.push(("X-XSS-Protection".to_string(), value.clone()));
        }
        if let Some(csp) = self.csp.as_ref().filter(|c| !c.is_empty()) {
            headers.push(("Content-Security-Policy".to_string(), csp.to_header_value()));
        }
        if let Some(hsts) = &self.hsts {
            headers.push(("Strict-Transport-Security".to_string(), hsts.to_header_value()));
        }
        if let Some(policy) = &self.referrer_policy {
            headers.push(("Referrer-Policy".to_string(), policy.to_header_value()));
        }
        if let Some(value) = &self.permissions_policy {
            headers.push(("Permissions-Policy".to_string(), value.clone()));
        }
        for (name, value) in &self.custom_headers {
            headers.push((name.clone(), value.clone()));
        }

        headers
    }
}

/// Adds security headers to every response.
///
/// ```
/// use trellis_security::{SecurityHeadersConfig, SecurityHeadersMiddleware};
/// use trellis_security::hsts::HstsConfig;
///
/// let middleware = SecurityHeadersMiddleware::new(
///     SecurityHeadersConfig::default().with_hsts(Some(HstsConfig::new(31536000))),
/// );
/// assert_eq!(middleware.headers().len(), 7);
/// ```
#[derive(Debug, Clone)]
pub struct SecurityHeadersMiddleware {
    headers: Arc<Vec<(String, String)>>,
}

impl SecurityHeadersMiddleware {
    pub fn new(config: SecurityHeadersConfig) -> Self {
        Self {
            headers: Arc::new(config.headers()),
        }
    }

    pub fn from_config(config: &ConfigManager) -> Result<Self> {
        Ok(Self::new(SecurityHeadersConfig::from_config(config)?))
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

impl Default for SecurityHeadersMiddleware {
    fn default() -> Self {
        Self::new(SecurityHeadersConfig::default())
    }
}

#[async_trait]
impl Middleware for SecurityHeadersMiddleware {
    async fn after(&self, ctx: &RequestContext, reply: Reply) -> trellis_core::Result<Reply> {
        for (name, value) in self.headers.iter() {
            ctx.queue_header(name.clone(), value.clone());
        }
        trace!(path = %ctx.path(), count = self.headers.len(), "Security headers queued");
        Ok(reply)
    }
}
