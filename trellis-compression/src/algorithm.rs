//! Compression algorithm implementations

use crate::{CompressionError, Result};
use std::io::Write;

/// Supported compression algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionAlgorithm {
    /// Pick the best coding the client accepts
    Auto,

    /// Gzip compression (widely supported)
    #[default]
    Gzip,

    /// Brotli compression (best ratio for text)
    Brotli,

    /// No compression (pass-through)
    None,
}

impl CompressionAlgorithm {
    /// Parse a configured algorithm name; unknown names mean gzip.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "auto" => Self::Auto,
            "br" | "brotli" => Self::Brotli,
            "none" | "identity" => Self::None,
            _ => Self::Gzip,
        }
    }

    /// Get the Content-Encoding header value for this algorithm
    pub fn encoding_name(&self) -> Option<&'static str> {
        match self {
            Self::Gzip => Some("gzip"),
            Self::Brotli => Some("br"),
            Self::Auto | Self::None => None,
        }
    }

    /// Resolve against the client's `Accept-Encoding`.
    ///
    /// `Auto` prefers brotli over gzip; a fixed algorithm is used only when
    /// the client lists it.
    pub fn negotiate(&self, accept_encoding: &str) -> Self {
        let accepted: Vec<String> = accept_encoding
            .split(',')
            .filter_map(|s| {
                let mut parts = s.split(';');
                let coding = parts.next()?.trim().to_ascii_lowercase();
                let refused = parts.any(|p| {
                    p.trim()
                        .strip_prefix("q=")
                        .and_then(|q| q.parse::<f32>().ok())
                        .is_some_and(|q| q == 0.0)
                });
                (!refused && !coding.is_empty()).then_some(coding)
            })
            .collect();
        let accepts = |coding: &str| accepted.iter().any(|a| a == coding || a == "*");

        match self {
            Self::Auto if accepts("br") => Self::Brotli,
            Self::Auto if accepts("gzip") => Self::Gzip,
            Self::Gzip if accepts("gzip") => Self::Gzip,
            Self::Brotli if accepts("br") => Self::Brotli,
            _ => Self::None,
        }
    }

    /// Highest meaningful level
    pub fn max_level(&self) -> u32 {
        match self {
            Self::Gzip => 9,
            Self::Brotli => 11,
            Self::Auto | Self::None => 0,
        }
    }

    /// Compress data using this algorithm
    pub fn compress(&self, data: &[u8], level: u32) -> Result<Vec<u8>> {
        let level = level.min(self.max_level());
        match self {
            Self::Gzip => compress_gzip(data, level),
            Self::Brotli => compress_brotli(data, level),
            Self::None => Ok(data.to_vec()),
            Self::Auto => Err(CompressionError::UnsupportedAlgorithm(
                "auto must be negotiated first".to_string(),
            )),
        }
    }
}

impl std::fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Gzip => write!(f, "gzip"),
            Self::Brotli => write!(f, "brotli"),
            Self::None => write!(f, "none"),
        }
    }
}

fn compress_gzip(data: &[u8], level: u32) -> Result<Vec<u8>> {
    use flate2::Compression;
    use flate2::write::GzEncoder;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level));
    encoder
        .write_all(data)
        .map_err(|e| CompressionError::CompressionFailed(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| CompressionError::CompressionFailed(e.to_string()))
}

fn compress_brotli(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    let params = brotli::enc::BrotliEncoderParams {
        quality: level as i32,
        ..Default::default()
    };

    let mut reader = std::io::Cursor::new(data);
    brotli::BrotliCompress(&mut reader, &mut output, &params)
        .map_err(|e| CompressionError::CompressionFailed(e.to_string()))?;

    Ok(output)
}
