// Configuration management for Courier

pub mod env;
pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use settings::{CourierSettings, LogSettings};
pub use validation::{ConfigValidator, Validate};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Layered key/value configuration
///
/// Keys are dotted paths (`dispatcher.enable_logging`). Later loads
/// overwrite earlier ones, so load files first and the environment last.
#[derive(Clone)]
pub struct ConfigManager {
    config: Arc<RwLock<HashMap<String, serde_json::Value>>>,
    env_prefix: Option<String>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(HashMap::new())),
            env_prefix: None,
        }
    }

    /// Create with environment variable prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            config: Arc::new(RwLock::new(HashMap::new())),
            env_prefix: Some(prefix.into()),
        }
    }

    /// Load configuration from environment variables
    pub fn load_env(&self) -> Result<()> {
        let loader = EnvLoader::new(self.env_prefix.clone());
        let env_vars = loader.load()?;
        let count = env_vars.len();

        self.config.write().extend(env_vars);

        debug!(keys = count, prefix = ?self.env_prefix, "Loaded configuration from environment");
        Ok(())
    }

    /// Load a `.env` file into the process environment, then the environment
    ///
    /// Without a path, a missing `.env` in the working directory is ignored.
    pub fn load_dotenv(&self, path: Option<&Path>) -> Result<()> {
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

    /// Load configuration from a file, detecting the format from its extension
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let loader = ConfigLoader::auto(&path)?;
        self.load_file_as(path, loader)
    }

    /// Load configuration from a file with an explicit loader
    ///
    /// `.env` files use this manager's prefix unless the loader sets its own.
    pub fn load_file_as(&self, path: impl AsRef<Path>, file_loader: ConfigLoader) -> Result<()> {
        let file_loader = file_loader.or_env_prefix(self.env_prefix.clone());
        let entries = loader::flatten(file_loader.load_file(&path)?);
        let count = entries.len();

        self.config.write().extend(entries);

        debug!(keys = count, path = %path.as_ref().display(), "Loaded configuration file");
        Ok(())
    }

    /// Set a configuration value
    pub fn set<T: serde::Serialize>(&self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;

        self.config.write().insert(key.to_string(), json_value);
        Ok(())
    }

    /// Get a configuration value
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.get_opt(key)?
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))
    }

    /// Get a value if the key exists
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let value = match self.config.read().get(key) {
            Some(value) => value.clone(),
            None => return Ok(None),
        };

        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    /// Get a configuration value with default
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    pub fn has(&self, key: &str) -> bool {
        self.config.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.config.read().keys().cloned().collect()
    }

    /// Merge configuration from another manager, overwriting shared keys
    pub fn merge(&self, other: &ConfigManager) {
        let other_config = other.config.read().clone();
        self.config.write().extend(other_config);
    }

    /// Typed Courier settings from the loaded keys
    pub fn settings(&self) -> Result<CourierSettings> {
        CourierSettings::from_manager(self)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
