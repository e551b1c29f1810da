//! Configuration for compression middleware

use crate::CompressionAlgorithm;
use trellis_config::ConfigManager;

/// Configuration for the compression middleware
#[derive(Debug, Clone)]
pub struct CompressionConfig {
    /// The compression algorithm to use
    pub algorithm: CompressionAlgorithm,

    /// Compression level (algorithm-specific range)
    pub level: u32,

    /// Bodies smaller than this are sent as they are
    pub min_size: usize,

    /// Content types eligible for compression (substring match on the
    /// MIME type, `text/*` style wildcards allowed)
    pub compressible_types: Vec<String>,

    /// Minify `text/html` bodies before compressing
    pub minify_html: bool,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            algorithm: CompressionAlgorithm::Gzip,
            level: 6,
            min_size: 1024,
            compressible_types: default_compressible_types(),
            minify_html: true,
        }
    }
}

impl CompressionConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for configuration
    pub fn builder() -> CompressionConfigBuilder {
        CompressionConfigBuilder::new()
    }

    /// Read `app.COMPRESSION_*` and `app.MINIFY_HTML`.
    pub fn from_config(config: &ConfigManager) -> Self {
        let defaults = Self::default();
        Self {
            algorithm: CompressionAlgorithm::parse(
                &config.get_or("app.COMPRESSION_ALGORITHM", "gzip".to_string()),
            ),
            level: config.get_or("app.COMPRESSION_LEVEL", defaults.level),
            min_size: config.get_or("app.COMPRESSION_MIN_SIZE", defaults.min_size),
            minify_html: config.get_or("app.MINIFY_HTML", defaults.minify_html),
            ..defaults
        }
    }

    /// Whether `app.COMPRESSION_ENABLED` is on (default true).
    pub fn enabled(config: &ConfigManager) -> bool {
        config.get_or("app.COMPRESSION_ENABLED", true)
    }

    /// Check if a content type should be compressed
    pub fn should_compress_content_type(&self, content_type: &str) -> bool {
        let ct_lower = content_type.to_lowercase();
        let ct_base = ct_lower.split(';').next().unwrap_or(&ct_lower).trim();

        self.compressible_types.iter().any(|pattern| {
            if let Some(prefix) = pattern.strip_suffix('*') {
                ct_base.starts_with(prefix)
            } else {
                ct_base.contains(pattern.as_str())
            }
        })
    }

    /// Check if a response should be compressed based on size
    pub fn should_compress_size(&self, size: usize) -> bool {
        size >= self.min_size
    }
}

/// Builder for CompressionConfig
#[derive(Debug, Clone, Default)]
pub struct CompressionConfigBuilder {
    config: CompressionConfig,
}

impl CompressionConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: CompressionConfig::default(),
        }
    }

    pub fn algorithm(mut self, algorithm: CompressionAlgorithm) -> Self {
        self.config.algorithm = algorithm;
        self
    }

    pub fn level(mut self, level: u32) -> Self {
        self.config.level = level;
        self
    }

    pub fn min_size(mut self, min_size: usize) -> Self {
        self.config.min_size = min_size;
        self
    }

    pub fn minify_html(mut self, minify: bool) -> Self {
        self.config.minify_html = minify;
        self
    }

    pub fn add_compressible_type(mut self, content_type: impl Into<String>) -> Self {
        self.config.compressible_types.push(content_type.into());
        self
    }

    pub fn build(self) -> CompressionConfig {
        self.config
    }
}

fn default_compressible_types() -> Vec<String> {
    [
        "text/html",
        "text/css",
        "text/javascript",
        "application/javascript",
        "application/json",
        "text/plain",
        "text/xml",
        "application/xml",
        "application/xhtml+xml",
        "image/svg+xml",
    ]
    .iter()
    .map(|t| t.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CompressionConfig::default();
        assert_eq!(config.algorithm, CompressionAlgorithm::Gzip);
        assert_eq!(config.min_size, 1024);
        assert_eq!(config.level, 6);
        assert!(config.minify_html);
    }

    #[test]
    fn test_should_compress_content_type() {
        let config = CompressionConfig::default();

        assert!(config.should_compress_content_type("text/html; charset=utf-8"));
        assert!(config.should_compress_content_type("application/json"));
        assert!(config.should_compress_content_type("image/svg+xml"));

        assert!(!config.should_compress_content_type("image/png"));
        assert!(!config.should_compress_content_type("application/octet-stream"));
    }

    #[test]
    fn test_from_config() {
        let manager = ConfigManager::new();
        manager.set("app.COMPRESSION_MIN_SIZE", "10").unwrap();
        manager.set("app.MINIFY_HTML", false).unwrap();
        manager.set("app.COMPRESSION_ENABLED", "false").unwrap();

        let config = CompressionConfig::from_config(&manager);
        assert_eq!(config.min_size, 10);
        assert!(!config.minify_html);
        assert!(!CompressionConfig::enabled(&manager));
    }
}
