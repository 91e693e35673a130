// Configuration file loaders

use crate::env::EnvLoader;
use crate::{ConfigError, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Toml,
    Env,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            "env" => Some(FileFormat::Env),
            _ => None,
        }
    }
}

/// Configuration file loader
///
/// `.env` files go through the same key mapping as the process
/// environment: with prefix `COURIER`, `COURIER_LOG__LEVEL=debug` loads as
/// `{"log": {"level": "debug"}}`.
pub struct ConfigLoader {
    format: FileFormat,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    pub fn new(format: FileFormat) -> Self {
        Self {
            format,
            env_prefix: None,
        }
    }

    /// Only keep `.env` variables starting with `prefix_`
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Use `prefix` unless one was already set
    pub(crate) fn or_env_prefix(mut self, prefix: Option<String>) -> Self {
        if self.env_prefix.is_none() {
            self.env_prefix = prefix;
        }
        self
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    /// Detect the format from the file extension
    pub fn auto(path: impl AsRef<Path>) -> Result<Self> {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ConfigError::LoadError("No file extension found".to_string()))?;

        let format = FileFormat::from_extension(ext)
            .ok_or_else(|| ConfigError::LoadError(format!("Unsupported format: {}", ext)))?;

        Ok(Self::new(format))
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::LoadError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        self.parse(&content)
    }

    pub fn parse(&self, content: &str) -> Result<Value> {
        match self.format {
            FileFormat::Json => serde_json::from_str(content)
                .map_err(|e| ConfigError::ParseError(format!("JSON parse error: {}", e))),
            FileFormat::Toml => {
                let table: toml::Table = toml::from_str(content)
                    .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;
                serde_json::to_value(table)
                    .map_err(|e| ConfigError::SerializationError(e.to_string()))
            }
            FileFormat::Env => {
                let vars = dotenvy::from_read_iter(content.as_bytes())
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| ConfigError::ParseError(format!("env parse error: {}", e)))?;
                let entries = EnvLoader::new(self.env_prefix.clone()).load_from(vars);
                Ok(nest(entries))
            }
        }
    }
}

// Inverse of `flatten`: dotted keys become nested tables.
fn nest(entries: HashMap<String, Value>) -> Value {
    let mut root = Map::new();

    'entries: for (key, value) in entries {
        let mut table = &mut root;
        let mut parts = key.split('.').peekable();

        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                table.insert(part.to_string(), value);
                continue 'entries;
            }

            let slot = table
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            let Value::Object(next) = slot else {
                continue 'entries;
            };
            table = next;
        }
    }

    Value::Object(root)
}

/// Flatten nested tables into dotted keys
///
/// `{"dispatcher": {"enable_logging": true}}` becomes
/// `[("dispatcher.enable_logging", true)]`. Arrays are kept as values.
pub fn flatten(value: Value) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    flatten_into(String::new(), value, &mut out);
    out
}

fn flatten_into(prefix: String, value: Value, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(map) => {
            for (key, value) in map {
                let key = if prefix.is_empty() {
                    key
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_into(key, value, out);
            }
        }
        other if !prefix.is_empty() => out.push((prefix, other)),
        _ => {}
    }
}
