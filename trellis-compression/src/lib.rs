//! HTTP response compression for Trellis.
//!
//! [`CompressionMiddleware`] works on the fully built response in the
//! after-build phase of the pipeline. It gzips (or brotli-encodes)
//! compressible bodies above a size threshold and can minify HTML first.
//!
//! ```rust
//! use trellis_compression::{CompressionAlgorithm, CompressionConfig, CompressionMiddleware};
//!
//! let config = CompressionConfig::builder()
//!     .algorithm(CompressionAlgorithm::Auto)
//!     .min_size(1024)
//!     .level(6)
//!     .build();
//! let middleware = CompressionMiddleware::with_config(config);
//! ```
//!
//! With `CompressionAlgorithm::Auto`, brotli is preferred over gzip when the
//! client's `Accept-Encoding` lists both.

mod algorithm;
mod config;
mod error;
mod middleware;
pub mod minify;

pub use algorithm::CompressionAlgorithm;
pub use config::{CompressionConfig, CompressionConfigBuilder};
pub use error::CompressionError;
pub use middleware::CompressionMiddleware;
pub use minify::minify_html;

/// Result type for compression operations
pub type Result<T> = std::result::Result<T, CompressionError>;
