use crate::error::{CsrfError, Result};
use crate::token::generate_secret;
use trellis_config::ConfigManager;

/// CSRF protection configuration
#[derive(Debug, Clone)]
pub struct CsrfConfig {
    /// HMAC key
    pub secret: Vec<u8>,

    /// Header carrying the token on AJAX requests
    pub header_name: String,

    /// Cookie carrying the random half of the pair
    pub cookie_name: String,

    /// Form fields checked when the header is absent
    pub field_names: Vec<String>,

    /// Cookie secure flag (HTTPS only)
    pub cookie_secure: bool,

    pub cookie_path: String,

    /// Methods that require a valid token
    pub protected_methods: Vec<String>,

    /// Blueprints whose routes are protected
    pub protected_blueprints: Vec<String>,

    /// Route prefixes (below the blueprint) exempt from checks
    pub except_prefixes: Vec<String>,
}

impl CsrfConfig {
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(CsrfError::Config("CSRF secret must not be empty".to_string()));
        }

        Ok(Self {
            secret,
            header_name: "X-CSRF-Token".to_string(),
            cookie_name: "csrf_token".to_string(),
            field_names: vec!["_csrf_token".to_string(), "csrf_token".to_string()],
            cookie_secure: false,
            cookie_path: "/".to_string(),
            protected_methods: ["POST", "PUT", "PATCH", "DELETE"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            protected_blueprints: vec!["api".to_string()],
            except_prefixes: vec!["auth".to_string()],
        })
    }

    /// Read `security.CSRF_*`. Without `security.CSRF_SECRET` a random
    /// secret is generated, so tokens do not survive a restart.
    pub fn from_config(config: &ConfigManager) -> Result<Self> {
        let secret = config
            .get_or("security.CSRF_SECRET", None::<String>)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(generate_secret);

        Ok(Self::new(secret)?
            .with_header_name(config.get_or("security.CSRF_HEADER_NAME", "X-CSRF-Token".to_string()))
            .with_cookie_name(config.get_or("security.CSRF_COOKIE_NAME", "csrf_token".to_string()))
            .with_cookie_secure(config.get_or("session.COOKIE_SECURE", false)))
    }

    /// Whether `security.CSRF_ENABLED` is on.
    pub fn enabled(config: &ConfigManager) -> bool {
        config.get_or("security.CSRF_ENABLED", false)
    }

    pub fn with_header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = name.into();
        self
    }

    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    pub fn with_protected_blueprints<I, S>(mut self, blueprints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protected_blueprints = blueprints.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_except_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.except_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CsrfConfig::new("secret").unwrap();
        assert_eq!(config.header_name, "X-CSRF-Token");
        assert_eq!(config.cookie_name, "csrf_token");
        assert_eq!(config.protected_methods, ["POST", "PUT", "PATCH", "DELETE"]);
        assert_eq!(config.except_prefixes, ["auth"]);
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(CsrfConfig::new(Vec::new()).is_err());
    }

    #[test]
    fn test_from_config() {
        let manager = ConfigManager::new();
        manager.set("security.CSRF_SECRET", "abc").unwrap();
        manager.set("security.CSRF_COOKIE_NAME", "xsrf").unwrap();
        manager.set("security.CSRF_ENABLED", "true").unwrap();

        let config = CsrfConfig::from_config(&manager).unwrap();
        assert_eq!(config.secret, b"abc");
        assert_eq!(config.cookie_name, "xsrf");
        assert!(CsrfConfig::enabled(&manager));
    }

    #[test]
    fn test_generated_secret_when_missing() {
        let config = CsrfConfig::from_config(&ConfigManager::new()).unwrap();
        assert_eq!(config.secret.len(), 64);
    }
}
