// Environment variable loading

use crate::{ConfigError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::env;

/// Environment variable loader
///
/// `COURIER_DISPATCHER__ENABLE_LOGGING=false` with prefix `COURIER` becomes
/// the key `dispatcher.enable_logging` with the boolean value `false`. A
/// double underscore separates sections.
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Load matching variables from the process environment
    pub fn load(&self) -> Result<HashMap<String, Value>> {
        Ok(self.load_from(env::vars()))
    }

    /// Load matching variables from an explicit list
    pub fn load_from<I>(&self, vars: I) -> HashMap<String, Value>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        vars.into_iter()
            .filter_map(|(key, value)| self.config_key(&key).map(|key| (key, coerce(&value))))
            .collect()
    }

    fn config_key(&self, var: &str) -> Option<String> {
        let stripped = match &self.prefix {
            Some(prefix) => var.strip_prefix(prefix.as_str())?.strip_prefix('_')?,
            None => var,
        };

        if stripped.is_empty() {
            return None;
        }

        Some(stripped.to_lowercase().replace("__", "."))
    }

    /// Load a specific environment variable
    pub fn load_var(&self, key: &str) -> Result<String> {
        let full_key = match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix, key.to_uppercase()),
            None => key.to_uppercase(),
        };

        env::var(&full_key).map_err(|_| ConfigError::KeyNotFound(full_key))
    }

    /// Load with default value
    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(None)
    }
}

// Booleans and numbers become typed values, everything else stays a string.
fn coerce(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = trimmed.parse::<f64>() {
        return Value::from(float);
    }
    Value::String(raw.to_string())
}
