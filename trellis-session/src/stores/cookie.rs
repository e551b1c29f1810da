use crate::error::{SessionError, SessionResult};
use crate::store::{SessionData, SessionStore, is_expired};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Keeps the whole session in the cookie as `base64(json).signature`.
///
/// The "session id" handed to `read` is the cookie value itself. Writes are
/// no-ops; the middleware asks [`SessionStore::cookie_value`] for the
/// signed payload when it sets the cookie.
#[derive(Clone)]
pub struct CookieSessionStore {
    secret: Vec<u8>,
}

impl CookieSessionStore {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size")
    }

    /// Sign and encode a payload.
    pub fn serialize(&self, data: &SessionData) -> SessionResult<String> {
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(data)?);
        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{}.{}", payload, signature))
    }

    /// Verify and decode a payload produced by [`serialize`](Self::serialize).
    pub fn deserialize(&self, value: &str) -> SessionResult<SessionData> {
        let (payload, signature) = value
            .rsplit_once('.')
            .ok_or(SessionError::InvalidSignature)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| SessionError::InvalidSignature)?;

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| SessionError::InvalidSignature)?;

        let raw = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| SessionError::Deserialization(e.to_string()))?;
        Ok(serde_json::from_slice(&raw)?)
    }
}

impl std::fmt::Debug for CookieSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieSessionStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl SessionStore for CookieSessionStore {
    async fn read(&self, session_id: &str) -> SessionResult<SessionData> {
        if session_id.is_empty() {
            return Ok(SessionData::new());
        }
        // Tampered, foreign or expired cookies start a fresh session.
        match self.deserialize(session_id) {
            Ok(data) if !is_expired(&data) => Ok(data),
            _ => Ok(SessionData::new()),
        }
    }

    async fn write(&self, _session_id: &str, _data: &SessionData) -> SessionResult<()> {
        Ok(())
    }

    async fn destroy(&self, _session_id: &str) -> SessionResult<()> {
        Ok(())
    }

    async fn gc(&self, _max_lifetime: u64) -> SessionResult<usize> {
        Ok(0)
    }

    async fn exists(&self, session_id: &str) -> SessionResult<bool> {
        Ok(!session_id.is_empty() && self.deserialize(session_id).is_ok())
    }

    fn cookie_value(&self, _session_id: &str, data: &SessionData) -> SessionResult<String> {
        self.serialize(data)
    }

    // The cookie is the payload; `read` verifies it.
    fn is_valid_id(&self, session_id: &str) -> bool {
        !session_id.is_empty()
    }

    fn driver(&self) -> &'static str {
        "cookie"
    }
}
