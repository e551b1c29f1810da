//! Session configuration.

use crate::error::{SessionError, SessionResult};
use std::path::PathBuf;
use trellis_config::ConfigManager;
use trellis_core::SameSite;

/// Default session lifetime in seconds.
pub const DEFAULT_LIFETIME: u64 = 7200;

/// Default session cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "framework_session";

/// Length of generated session ids.
pub const SESSION_ID_LENGTH: usize = 40;

/// Storage driver for session payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionDriver {
    /// JSON files under a directory
    File,
    /// Signed payload carried in the session cookie itself
    Cookie,
    /// Process memory, for tests
    Array,
}

impl SessionDriver {
    /// Parse a driver name. Unknown names fall back to `Array`.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "file" => SessionDriver::File,
            "cookie" => SessionDriver::Cookie,
            _ => SessionDriver::Array,
        }
    }
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub driver: SessionDriver,
    /// Directory for the file driver
    pub path: PathBuf,
    /// Lifetime in seconds, also used as the cookie `Max-Age`
    pub lifetime: u64,
    pub cookie_name: String,
    pub cookie_path: String,
    pub cookie_domain: Option<String>,
    pub cookie_secure: bool,
    pub cookie_http_only: bool,
    pub cookie_same_site: SameSite,
    /// GC runs when a roll of `1..=lottery.1` lands at or below `lottery.0`
    pub lottery: (u32, u32),
    /// Signing key for the cookie driver
    pub secret: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            driver: SessionDriver::File,
            path: PathBuf::from("storage/sessions"),
            lifetime: DEFAULT_LIFETIME,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cookie_path: "/".to_string(),
            cookie_domain: None,
            cookie_secure: false,
            cookie_http_only: true,
            cookie_same_site: SameSite::Lax,
            lottery: (2, 100),
            secret: None,
        }
    }
}

impl SessionConfig {
    /// In-memory sessions, mostly for tests.
    pub fn array() -> Self {
        Self {
            driver: SessionDriver::Array,
            ..Default::default()
        }
    }

    /// File sessions stored under `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            driver: SessionDriver::File,
            path: path.into(),
            ..Default::default()
        }
    }

    /// Cookie sessions signed with `secret`.
    pub fn cookie(secret: impl Into<String>) -> Self {
        Self {
            driver: SessionDriver::Cookie,
            secret: Some(secret.into()),
            ..Default::default()
        }
    }

    /// Read the `session.*` keys. The cookie driver requires `app.APP_SECRET_KEY`.
    pub fn from_config(config: &ConfigManager) -> SessionResult<Self> {
        let defaults = Self::default();
        let driver = SessionDriver::parse(&config.get_or("session.DRIVER", "file".to_string()));

        let secret: Option<String> = config
            .get_or("app.APP_SECRET_KEY", None::<String>)
            .filter(|s| !s.is_empty());
        if driver == SessionDriver::Cookie && secret.is_none() {
            return Err(SessionError::Config(
                "APP_SECRET_KEY is required for the cookie session driver".to_string(),
            ));
        }

        let same_site = config
            .get_or("session.COOKIE_SAME_SITE", "Lax".to_string())
            .parse()
            .map_err(SessionError::Config)?;

        let lottery: Vec<u32> = config.get_or("session.SESSION_LOTTERY", vec![2, 100]);
        let lottery = match lottery.as_slice() {
            [chances, out_of] if *out_of > 0 => (*chances, *out_of),
            _ => defaults.lottery,
        };

        Ok(Self {
            driver,
            path: config
                .get_or("session.PATH", "storage/sessions".to_string())
                .into(),
            lifetime: config.get_or("session.LIFETIME", defaults.lifetime),
            cookie_name: config.get_or("session.COOKIE_NAME", defaults.cookie_name),
            cookie_path: config.get_or("session.COOKIE_PATH", defaults.cookie_path),
            cookie_domain: config.get_or("session.COOKIE_DOMAIN", None),
            cookie_secure: config.get_or("session.COOKIE_SECURE", false),
            cookie_http_only: config.get_or("session.COOKIE_HTTP_ONLY", true),
            cookie_same_site: same_site,
            lottery,
            secret,
        })
    }

    pub fn with_lifetime(mut self, seconds: u64) -> Self {
        self.lifetime = seconds;
        self
    }

    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    pub fn with_lottery(mut self, chances: u32, out_of: u32) -> Self {
        self.lottery = (chances, out_of.max(1));
        self
    }
}
