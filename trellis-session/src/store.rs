//! Session store trait definition.

use crate::error::SessionResult;
use async_trait::async_trait;
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde_json::{Map, Value};

/// Raw session payload, including the internal `_flash.*` and
/// `_expire_at` bookkeeping keys.
pub type SessionData = Map<String, Value>;

/// Key holding the expiry timestamp (unix seconds) of a saved session.
pub const EXPIRE_AT_KEY: &str = "_expire_at";

/// Storage backend for session payloads.
///
/// Stores are shared across requests and must be safe to call
/// concurrently; a missing or expired session reads as empty data.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Read the payload for `session_id`. Missing sessions yield an empty map.
    async fn read(&self, session_id: &str) -> SessionResult<SessionData>;

    /// Persist the payload for `session_id`.
    async fn write(&self, session_id: &str, data: &SessionData) -> SessionResult<()>;

    /// Remove a session.
    async fn destroy(&self, session_id: &str) -> SessionResult<()>;

    /// Remove sessions older than `max_lifetime` seconds. Returns how many
    /// were removed.
    async fn gc(&self, max_lifetime: u64) -> SessionResult<usize>;

    /// Whether a session exists.
    async fn exists(&self, session_id: &str) -> SessionResult<bool>;

    /// Value to place in the session cookie.
    ///
    /// Server-side stores send the id; the cookie store sends the signed
    /// payload itself.
    fn cookie_value(&self, session_id: &str, _data: &SessionData) -> SessionResult<String> {
        Ok(session_id.to_string())
    }

    /// Whether a cookie value can be used as this store's session id.
    ///
    /// The middleware mints a fresh id for anything rejected here.
    fn is_valid_id(&self, session_id: &str) -> bool {
        is_plain_session_id(session_id)
    }

    /// Short driver name for logs.
    fn driver(&self) -> &'static str;
}

/// Generate a random alphanumeric session id of `length` characters.
pub fn generate_session_id(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Longest id accepted from a client cookie.
pub const MAX_SESSION_ID_LENGTH: usize = 128;

/// A non-empty token of ASCII letters, digits, `-` and `_`, at most
/// [`MAX_SESSION_ID_LENGTH`] long.
pub fn is_plain_session_id(session_id: &str) -> bool {
    !session_id.is_empty()
        && session_id.len() <= MAX_SESSION_ID_LENGTH
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Current unix time in seconds, with sub-second precision.
pub(crate) fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Whether a payload's `_expire_at` lies in the past. Payloads without one
/// never expire.
pub(crate) fn is_expired(data: &SessionData) -> bool {
    data.get(EXPIRE_AT_KEY)
        .and_then(Value::as_f64)
        .is_some_and(|at| at < now_secs())
}
