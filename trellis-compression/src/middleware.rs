//! Compression middleware implementation

use crate::minify::minify_html;
use crate::{CompressionAlgorithm, CompressionConfig};
use async_trait::async_trait;
use tracing::{debug, warn};
use trellis_core::{HttpResponse, Middleware, RequestContext, Result};

/// Compresses built responses.
///
/// Runs in the after-build phase, once the final body and headers are
/// known. A response is compressed when the client accepts the configured
/// coding, it carries no `Content-Encoding` yet, its type is compressible
/// and its body reaches `min_size`. The compressed body is kept only when
/// it is smaller. Compression failures leave the response untouched.
///
/// ```rust
/// use trellis_compression::{CompressionConfig, CompressionMiddleware};
///
/// let middleware = CompressionMiddleware::with_config(
///     CompressionConfig::builder().min_size(512).level(9).build(),
/// );
/// assert_eq!(middleware.config().min_size, 512);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CompressionMiddleware {
    config: CompressionConfig,
}

impl CompressionMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CompressionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    /// Coding to apply, or `None` when the response should pass through.
    fn select(&self, ctx: &RequestContext, response: &HttpResponse) -> Option<CompressionAlgorithm> {
        let accept = ctx.request().header("accept-encoding")?;
        let algorithm = self.config.algorithm.negotiate(accept);
        if algorithm == CompressionAlgorithm::None {
            return None;
        }

        if response.has_header("content-encoding") {
            return None;
        }

        let content_type = response.content_type()?;
        if !self.config.should_compress_content_type(content_type) {
            return None;
        }

        self.config
            .should_compress_size(response.body.len())
            .then_some(algorithm)
    }

    /// Compress `response` in place if eligible.
    pub fn compress_response(&self, ctx: &RequestContext, response: &mut HttpResponse) {
        let Some(algorithm) = self.select(ctx, response) else {
            return;
        };

        let is_html = response
            .content_type()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"));

        let minified;
        let body: &[u8] = if self.config.minify_html && is_html {
            match std::str::from_utf8(&response.body) {
                Ok(html) => {
                    minified = minify_html(html).into_bytes();
                    &minified
                }
                Err(_) => &response.body,
            }
        } else {
            &response.body
        };

        let compressed = match algorithm.compress(body, self.config.level) {
            Ok(compressed) => compressed,
            Err(e) => {
                warn!(algorithm = %algorithm, error = %e, "Response compression failed");
                return;
            }
        };

        if compressed.len() >= body.len() {
            return;
        }

        debug!(
            algorithm = %algorithm,
            original = response.body.len(),
            compressed = compressed.len(),
            "Response compressed"
        );

        let length = compressed.len();
        response.body = compressed;
        if let Some(encoding) = algorithm.encoding_name() {
            response.set_header("Content-Encoding", encoding);
        }
        let vary = match response.header("Vary") {
            Some(existing) if !existing.to_ascii_lowercase().contains("accept-encoding") => {
                format!("{existing}, Accept-Encoding")
            }
            Some(existing) => existing.to_string(),
            None => "Accept-Encoding".to_string(),
        };
        response.set_header("Vary", vary);
        response.set_header("Content-Length", length.to_string());
    }
}

#[async_trait]
impl Middleware for CompressionMiddleware {
    async fn after_build(&self, ctx: &RequestContext, response: &mut HttpResponse) -> Result<()> {
        self.compress_response(ctx, response);
        Ok(())
    }
}
