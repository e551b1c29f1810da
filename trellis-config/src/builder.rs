// Layered configuration builder

use crate::{ConfigManager, FileFormat, Result};
use serde_json::Value;
use std::path::PathBuf;

/// Builds a [`ConfigManager`] from layered sources.
///
/// Layers apply in order: defaults, files, `.env`, then the environment.
pub struct ConfigBuilder {
    manager: ConfigManager,
    defaults: Vec<Value>,
    files: Vec<(PathBuf, Option<FileFormat>)>,
    load_env: bool,
    load_dotenv: bool,
    dotenv_path: Option<String>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            manager: ConfigManager::new(),
            defaults: Vec::new(),
            files: Vec::new(),
            load_env: false,
            load_dotenv: false,
            dotenv_path: None,
        }
    }

    /// Only read environment variables starting with `{prefix}_`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.manager = ConfigManager::with_prefix(prefix);
        self
    }

    /// Add a JSON object of defaults.
    pub fn defaults(mut self, defaults: Value) -> Self {
        self.defaults.push(defaults);
        self
    }

    pub fn add_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push((path.into(), None));
        self
    }

    pub fn add_file_as(mut self, path: impl Into<PathBuf>, format: FileFormat) -> Self {
        self.files.push((path.into(), Some(format)));
        self
    }

    pub fn load_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn load_dotenv(mut self, path: Option<String>) -> Self {
        self.load_dotenv = true;
        self.dotenv_path = path;
        self
    }

    pub fn build(self) -> Result<ConfigManager> {
        for defaults in self.defaults {
            self.manager.extend(defaults)?;
        }

        for (path, format) in self.files {
            match format {
                Some(format) => self.manager.load_file_as(&path, format)?,
                None => self.manager.load_file(&path)?,
            }
        }

        if self.load_dotenv {
            self.manager.load_dotenv(self.dotenv_path.as_deref())?;
        } else if self.load_env {
            self.manager.load_env()?;
        }

        Ok(self.manager)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
