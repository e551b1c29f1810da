//! HTTP Strict Transport Security (HSTS)
//!
//! Forces browsers to use HTTPS. Only meaningful when the app is served
//! over TLS, so it is off unless `security.HSTS_ENABLED` is set.

use trellis_config::ConfigManager;

/// One year, in seconds.
pub const DEFAULT_HSTS_MAX_AGE: u64 = 31_536_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HstsConfig {
    /// Max age in seconds
    pub max_age: u64,

    pub include_subdomains: bool,

    /// Preload (submit to browser preload list)
    pub preload: bool,
}

impl HstsConfig {
    pub fn new(max_age: u64) -> Self {
        Self {
            max_age,
            include_subdomains: true,
            preload: false,
        }
    }

    /// Reads the `security.HSTS_*` keys. Returns `None` when HSTS is disabled.
    pub fn from_config(config: &ConfigManager) -> Option<Self> {
        if !config.get_or("security.HSTS_ENABLED", false) {
            return None;
        }
        Some(
            Self::new(config.get_or("security.HSTS_MAX_AGE", DEFAULT_HSTS_MAX_AGE))
                .include_subdomains(config.get_or("security.HSTS_INCLUDE_SUBDOMAINS", true))
                .preload(config.get_or("security.HSTS_PRELOAD", false)),
        )
    }

    pub fn include_subdomains(mut self, include: bool) -> Self {
        self.include_subdomains = include;
        self
    }

    pub fn preload(mut self, preload: bool) -> Self {
        self.preload = preload;
        self
    }

    pub fn to_header_value(&self) -> String {
        let mut parts = vec![format!("max-age={}", self.max_age)];

        if self.include_subdomains {
            parts.push("includeSubDomains".to_string());
        }

        if self.preload {
            parts.push("preload".to_string());
        }

        parts.join("; ")
    }
}

impl Default for HstsConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HSTS_MAX_AGE)
    }
}
