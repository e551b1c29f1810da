//! Security middleware for Trellis, inspired by Helmet for Express.js.
//!
//! Three middleware live here:
//!
//! - [`SecurityHeadersMiddleware`] queues X-Frame-Options, CSP, HSTS,
//!   Referrer-Policy, Permissions-Policy and friends on every response.
//! - [`CorsMiddleware`] answers preflight requests and adds the
//!   `Access-Control-*` headers to actual ones.
//! - [`SecurityLoggerMiddleware`] logs requests that look like probing.
//!
//! # Example
//!
//! ```
//! use trellis_security::{CorsConfig, CorsMiddleware, SecurityHeadersConfig, SecurityHeadersMiddleware};
//! use trellis_security::frame_guard::FrameGuard;
//! use trellis_security::hsts::HstsConfig;
//!
//! let headers = SecurityHeadersMiddleware::new(
//!     SecurityHeadersConfig::default()
//!         .with_hsts(Some(HstsConfig::new(31536000)))
//!         .with_frame_guard(Some(FrameGuard::SameOrigin)),
//! );
//!
//! let cors = CorsMiddleware::new(
//!     CorsConfig::new().allow_origin("https://app.example.com").unwrap(),
//! )
//! .unwrap();
//! # let _ = (headers, cors);
//! ```

pub mod content_security_policy;
pub mod cors;
pub mod error;
pub mod frame_guard;
pub mod headers;
pub mod hsts;
pub mod referrer_policy;
pub mod security_logger;

pub use content_security_policy::CspPolicy;
pub use cors::{CorsConfig, CorsMiddleware};
pub use error::{Result, SecurityError};
pub use frame_guard::FrameGuard;
pub use headers::{SecurityHeadersConfig, SecurityHeadersMiddleware};
pub use hsts::HstsConfig;
pub use referrer_policy::ReferrerPolicy;
pub use security_logger::{DEFAULT_SUSPICIOUS_PATTERNS, SecurityLoggerMiddleware, SuspiciousRequest};
