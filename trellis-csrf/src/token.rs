use crate::error::{CsrfError, Result};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Random bytes behind a cookie value and a generated secret.
pub const TOKEN_BYTES: usize = 32;

/// A CSRF cookie and the token derived from it.
///
/// The cookie is random; the token is `hex(HMAC-SHA256(secret, cookie))`.
/// Clients echo the token in a header or form field alongside the cookie,
/// and the server recomputes the MAC to check they belong together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfTokenPair {
    pub token: String,
    pub cookie: String,
}

impl CsrfTokenPair {
    /// Generate a fresh pair.
    pub fn generate(secret: &[u8]) -> Self {
        let bytes: [u8; TOKEN_BYTES] = rand::thread_rng().r#gen();
        let cookie = hex::encode(bytes);
        let token = token_for_cookie(&cookie, secret);
        Self { token, cookie }
    }
}

/// Token belonging to an existing cookie value.
pub fn token_for_cookie(cookie: &str, secret: &[u8]) -> String {
    hex::encode(mac(cookie, secret).finalize().into_bytes())
}

/// Check `token` against `cookie` in constant time.
pub fn verify(token: &str, cookie: &str, secret: &[u8]) -> Result<()> {
    if token.is_empty() || cookie.is_empty() {
        return Err(CsrfError::MissingToken);
    }
    let expected = hex::decode(token).map_err(|_| CsrfError::InvalidToken)?;
    mac(cookie, secret)
        .verify_slice(&expected)
        .map_err(|_| CsrfError::InvalidToken)
}

/// Random hex secret for deployments that do not configure one.
pub fn generate_secret() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::thread_rng().r#gen();
    hex::encode(bytes)
}

fn mac(cookie: &str, secret: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(cookie.as_bytes());
    mac
}
