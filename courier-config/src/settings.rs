// Typed Courier settings

use crate::loader::ConfigLoader;
use crate::validation::{ConfigValidator, Validate};
use crate::{ConfigError, ConfigManager, Result};
use courier_events::DispatcherConfig;
use courier_log::{LogConfig, LogFormat, LogLevel};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Logging section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub format: String,
    /// Filter directives overriding `level`
    pub filter: Option<String>,
    /// Emit span close events
    pub spans: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
            filter: None,
            spans: false,
        }
    }
}

impl LogSettings {
    /// Convert to a [`LogConfig`] writing to STDOUT
    pub fn to_log_config(&self) -> Result<LogConfig> {
        let level: LogLevel = ConfigValidator::parses(&self.level, "log.level")?;
        let format: LogFormat = ConfigValidator::parses(&self.format, "log.format")?;

        let mut config = LogConfig::new()
            .level(level)
            .format(format)
            .with_spans(self.spans);
        if let Some(filter) = &self.filter {
            config = config.with_env_filter(filter.clone());
        }
        Ok(config)
    }
}

impl Validate for LogSettings {
    fn validate(&self) -> Result<()> {
        if let Some(filter) = &self.filter {
            ConfigValidator::not_empty(filter, "log.filter")?;
        }

        self.to_log_config()?
            .build_filter()
            .map(|_| ())
            .map_err(|e| ConfigError::InvalidValue {
                key: "log.filter".to_string(),
                reason: e.to_string(),
            })
    }
}

/// All Courier settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierSettings {
    pub dispatcher: DispatcherConfig,
    pub log: LogSettings,
}

impl CourierSettings {
    /// Read settings from a JSON or TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let value = ConfigLoader::auto(&path)?.load_file(&path)?;
        let settings: Self = serde_json::from_value(value)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Read settings from dotted keys held by a [`ConfigManager`]
    ///
    /// Missing keys keep their defaults; present keys of the wrong type are errors.
    pub fn from_manager(manager: &ConfigManager) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(v) = manager.get_opt("dispatcher.enable_logging")? {
            settings.dispatcher.enable_logging = v;
        }
        if let Some(v) = manager.get_opt("dispatcher.strict_handler_entries")? {
            settings.dispatcher.strict_handler_entries = v;
        }
        if let Some(v) = manager.get_opt("dispatcher.warn_on_unhandled")? {
            settings.dispatcher.warn_on_unhandled = v;
        }
        if let Some(v) = manager.get_opt("log.level")? {
            settings.log.level = v;
        }
        if let Some(v) = manager.get_opt("log.format")? {
            settings.log.format = v;
        }
        if let Some(v) = manager.get_opt("log.filter")? {
            settings.log.filter = Some(v);
        }
        if let Some(v) = manager.get_opt("log.spans")? {
            settings.log.spans = v;
        }

        settings.validate()?;
        Ok(settings)
    }
}

impl Validate for CourierSettings {
    fn validate(&self) -> Result<()> {
        self.log.validate()
    }
}
