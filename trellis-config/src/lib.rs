//! Configuration management for Trellis.
//!
//! Every tunable in the request pipeline is read through
//! [`ConfigManager::get_or`] with a dotted key such as
//! `security.CSRF_ENABLED`. Values can come from code, TOML/JSON files,
//! `.env` files or the process environment.

pub mod builder;
pub mod env;
pub mod error;
pub mod loader;

pub use builder::ConfigBuilder;
pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Shared, cheaply cloneable configuration store.
#[derive(Clone, Default)]
pub struct ConfigManager {
    config: Arc<RwLock<HashMap<String, Value>>>,
    env_prefix: Option<String>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager that only loads environment variables carrying `prefix`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            config: Arc::default(),
            env_prefix: Some(prefix.into()),
        }
    }

    /// Load configuration from environment variables.
    pub fn load_env(&self) -> Result<()> {
        let loader = EnvLoader::new(self.env_prefix.clone());
        let vars = loader.load()?;

        let mut config = self.config.write();
        for (key, value) in vars {
            config.insert(key, Value::String(value));
        }

        Ok(())
    }

    /// Load a `.env` file into the process environment, then load the environment.
    ///
    /// A missing default `.env` is not an error; a missing explicit path is.
    pub fn load_dotenv(&self, path: Option<&str>) -> Result<()> {
        match path {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| ConfigError::LoadError(e.to_string()))?;
            }
            None => {
                dotenvy::dotenv().ok();
            }
        }
        self.load_env()
    }

    /// Load a configuration file, detecting the format from its extension.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let format = FileFormat::detect(path.as_ref())?;
        self.load_file_as(path, format)
    }

    pub fn load_file_as(&self, path: impl AsRef<Path>, format: FileFormat) -> Result<()> {
        let data = ConfigLoader::new(format).load_file(path)?;
        self.extend(data)
    }

    /// Merge the top-level entries of a JSON object into the store.
    pub fn extend(&self, data: Value) -> Result<()> {
        let Value::Object(map) = data else {
            return Err(ConfigError::InvalidValue {
                key: "<root>".to_string(),
                reason: "configuration source must be an object".to_string(),
            });
        };

        let mut config = self.config.write();
        for (key, value) in map {
            match (config.get_mut(&key), value) {
                (Some(Value::Object(existing)), Value::Object(incoming)) => {
                    existing.extend(incoming);
                }
                (_, value) => {
                    config.insert(key, value);
                }
            }
        }

        Ok(())
    }

    pub fn set<T: serde::Serialize>(&self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;

        self.config.write().insert(key.to_string(), json_value);
        Ok(())
    }

    /// Resolve a key to its raw value.
    ///
    /// A flat entry wins; otherwise the key is split on `.` and walked through
    /// nested objects, so `security.CSRF_ENABLED` finds
    /// `{"security": {"CSRF_ENABLED": true}}`.
    pub fn lookup(&self, key: &str) -> Option<Value> {
        let config = self.config.read();

        if let Some(value) = config.get(key) {
            return Some(value.clone());
        }

        let mut parts = key.split('.');
        let mut current = config.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current.clone())
    }

    /// Get a typed configuration value.
    ///
    /// String values, as loaded from the environment, are coerced to the
    /// requested type: `"true"`, `"1"`, `"on"` read as booleans and numeric
    /// or JSON text is parsed.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .lookup(key)
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;

        match serde_json::from_value::<T>(value.clone()) {
            Ok(typed) => Ok(typed),
            Err(err) => match &value {
                Value::String(raw) => coerce_str(raw).ok_or_else(|| ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: err.to_string(),
                }),
                _ => Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: err.to_string(),
                }),
            },
        }
    }

    /// Get a typed value, falling back to `default` when missing or malformed.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    pub fn get_string(&self, key: &str) -> Result<String> {
        self.get(key)
    }

    pub fn get_int(&self, key: &str) -> Result<i64> {
        self.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.get(key)
    }

    pub fn get_float(&self, key: &str) -> Result<f64> {
        self.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Top-level keys currently stored.
    pub fn keys(&self) -> Vec<String> {
        self.config.read().keys().cloned().collect()
    }

    /// Copy every entry of `other` into this manager, overriding on conflict.
    pub fn merge(&self, other: &ConfigManager) -> Result<()> {
        if Arc::ptr_eq(&self.config, &other.config) {
            return Ok(());
        }
        let snapshot: serde_json::Map<String, Value> = other
            .config
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.extend(Value::Object(snapshot))
    }
}

fn coerce_str<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let trimmed = raw.trim();
    let normalized = match trimmed.to_lowercase().as_str() {
        "true" | "yes" | "on" => Value::Bool(true),
        "false" | "no" | "off" => Value::Bool(false),
        _ => serde_json::from_str::<Value>(trimmed).ok()?,
    };

    if let Ok(typed) = serde_json::from_value::<T>(normalized.clone()) {
        return Some(typed);
    }

    // "1"/"0" parse as numbers; retry them as booleans.
    match normalized {
        Value::Number(n) if n.as_i64() == Some(1) => serde_json::from_value(Value::Bool(true)).ok(),
        Value::Number(n) if n.as_i64() == Some(0) => serde_json::from_value(Value::Bool(false)).ok(),
        _ => None,
    }
}
