// Configuration validation

use crate::{ConfigError, Result};
use std::fmt::Display;
use std::str::FromStr;

/// Settings sections that can check themselves after loading
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Checks shared by the settings sections
///
/// Failures name the dotted key so they can be traced back to the file or
/// environment variable that set it.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Reject blank strings
    pub fn not_empty(value: &str, key: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(invalid(key, "must not be blank"));
        }
        Ok(())
    }

    /// Parse `value` as `T`, reporting the key on failure
    pub fn parses<T>(value: &str, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        value.parse::<T>().map_err(|e| invalid(key, e))
    }
}

fn invalid(key: &str, reason: impl Display) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
