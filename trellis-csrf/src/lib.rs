//! # Trellis CSRF Protection
//!
//! Cross-Site Request Forgery protection with token rotation.
//!
//! A token pair is a random cookie value plus `HMAC-SHA256(secret, cookie)`
//! as the token. State-changing requests (`POST`, `PUT`, `PATCH`, `DELETE`)
//! to protected routes must send the token in the `X-CSRF-Token` header or a
//! `_csrf_token` form field together with the `csrf_token` cookie.
//!
//! Every request, accepted or rejected, rotates the pair. The new cookie is
//! readable by scripts (`HttpOnly` off) and `SameSite=Strict`.
//!
//! ```rust
//! use trellis_csrf::{CsrfConfig, CsrfMiddleware, CsrfTokenPair, verify};
//!
//! let config = CsrfConfig::new("app-secret").unwrap();
//! let pair = CsrfTokenPair::generate(&config.secret);
//! assert!(verify(&pair.token, &pair.cookie, &config.secret).is_ok());
//!
//! let csrf = CsrfMiddleware::new(config);
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod token;

pub use config::CsrfConfig;
pub use error::{CsrfError, Result};
pub use middleware::{CSRF_COOKIE_KEY, CSRF_TOKEN_KEY, CsrfMiddleware};
pub use token::{CsrfTokenPair, generate_secret, token_for_cookie, verify};
