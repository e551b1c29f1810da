// Environment variable loading

use crate::{ConfigError, Result};
use std::collections::HashMap;
use std::env;

/// Separator that splits an environment variable into `section.KEY`.
pub const SECTION_SEPARATOR: &str = "__";

/// Environment variable loader.
///
/// Variables named `SECTION__KEY` become the dotted key `section.KEY`, so
/// `SECURITY__CSRF_ENABLED=true` is readable as `security.CSRF_ENABLED`.
/// With a prefix, only variables starting with `{prefix}_` are loaded and the
/// prefix is stripped first.
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Load every matching environment variable as a dotted key.
    pub fn load(&self) -> Result<HashMap<String, String>> {
        Ok(self.collect(env::vars()))
    }

    /// Map raw `(name, value)` pairs to dotted keys.
    pub fn collect<I>(&self, vars: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = HashMap::new();

        for (name, value) in vars {
            let name = match &self.prefix {
                Some(prefix) => match name.strip_prefix(prefix.as_str()) {
                    Some(rest) => rest.trim_start_matches('_').to_string(),
                    None => continue,
                },
                None => name,
            };

            if name.is_empty() {
                continue;
            }

            config.insert(Self::dotted_key(&name), value);
        }

        config
    }

    /// `SECURITY__CSRF_ENABLED` -> `security.CSRF_ENABLED`
    pub fn dotted_key(name: &str) -> String {
        match name.split_once(SECTION_SEPARATOR) {
            Some((section, key)) => format!("{}.{}", section.to_lowercase(), key),
            None => name.to_string(),
        }
    }

    /// Load a specific environment variable.
    pub fn load_var(&self, key: &str) -> Result<String> {
        let full_key = match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix, key.to_uppercase()),
            None => key.to_uppercase(),
        };

        env::var(&full_key).map_err(ConfigError::EnvError)
    }

    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(None)
    }
}
