//! Engine configuration.
//!
//! Layered: defaults in code, then an optional config file, then `FOODFLOW_*`
//! environment variables (e.g. `FOODFLOW_MAX_TRANSACTION_ATTEMPTS=8`).

use chrono::Weekday;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

pub const ENV_PREFIX: &str = "FOODFLOW";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Total attempts of one transaction body before a conflict is surfaced.
    pub max_transaction_attempts: u32,
    /// First day of a forecasting week; submitted weeks must start on it.
    pub week_starts_on: Weekday,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_transaction_attempts: 5,
            week_starts_on: Weekday::Mon,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by environment variables only.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Defaults, then `file` (any format the `config` crate detects, optional),
    /// then environment variables.
    pub fn load(file: Option<&str>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default(
                "max_transaction_attempts",
                i64::from(defaults.max_transaction_attempts),
            )?
            .set_default("week_starts_on", defaults.week_starts_on.to_string())?;

        if let Some(path) = file {
            builder = builder.add_source(File::with_name(path).required(false));
        }

        let config: Self = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_transaction_attempts == 0 {
            return Err(ConfigError::Message(
                "max_transaction_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = EngineConfig::load(Some("does/not/exist")).unwrap();
        assert_eq!(config.max_transaction_attempts, 5);
        assert_eq!(config.week_starts_on, Weekday::Mon);
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let config = EngineConfig {
            max_transaction_attempts: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
