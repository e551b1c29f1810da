//! Frame Guard (X-Frame-Options)
//!
//! Mitigates clickjacking attacks.

use crate::error::SecurityError;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FrameGuard {
    /// Deny all framing
    #[default]
    Deny,
    /// Allow framing from same origin
    SameOrigin,
    /// Allow framing from specific origin
    AllowFrom(String),
}

impl FrameGuard {
    pub fn to_header_value(&self) -> String {
        match self {
            Self::Deny => "DENY".to_string(),
            Self::SameOrigin => "SAMEORIGIN".to_string(),
            Self::AllowFrom(origin) => format!("ALLOW-FROM {}", origin),
        }
    }
}

impl FromStr for FrameGuard {
    type Err = SecurityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();
        match upper.as_str() {
            "DENY" => Ok(Self::Deny),
            "SAMEORIGIN" => Ok(Self::SameOrigin),
            _ if upper.starts_with("ALLOW-FROM ") => {
                Ok(Self::AllowFrom(trimmed["ALLOW-FROM ".len()..].trim().to_string()))
            }
            _ => Err(SecurityError::InvalidHeaderValue {
                header: "X-Frame-Options",
                value: s.to_string(),
            }),
        }
    }
}
