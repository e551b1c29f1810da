//! # Trellis Rate Limiting
//!
//! Sliding window log rate limiting for API routes.
//!
//! Each accepted request's timestamp is logged per bucket; a request is
//! rejected with 429 once the bucket holds `max_requests` timestamps younger
//! than the window. Buckets are keyed by client IP and route category:
//!
//! | Route key | Selected when | Default |
//! |---|---|---|
//! | `auth` | the route prefix (minus blueprint) starts with `auth` | 20 / 60s |
//! | `api` | any other route in a limited blueprint | 100 / 60s |
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use trellis_core::MiddlewarePipeline;
//! use trellis_ratelimit::{Limit, RateLimitConfig, RateLimitMiddleware};
//!
//! let config = RateLimitConfig::default()
//!     .with_route_limit("uploads", Limit::per_minute(10).unwrap());
//!
//! let mut pipeline = MiddlewarePipeline::new();
//! pipeline.add("rate_limit", Arc::new(RateLimitMiddleware::new(config)));
//! // Named middleware only run for blueprints whose group lists them.
//! pipeline.group("api", ["rate_limit"]);
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod sliding_window;

pub use config::{Limit, RateLimitConfig};
pub use error::{RateLimitError, RateLimitHeaders, RateLimitResult};
pub use middleware::RateLimitMiddleware;
pub use sliding_window::{Decision, SlidingWindowLog};
