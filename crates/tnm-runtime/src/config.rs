//! Runtime configuration.
//!
//! Loaded from YAML, with `TNM_*` environment variables taking precedence.
//! Durations are human-readable strings (`"250ms"`, `"5s"`).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable names for overrides.
pub const ENV_CLASSIFIER_TIMEOUT: &str = "TNM_CLASSIFIER_TIMEOUT";
pub const ENV_SOURCE_TIMEOUT: &str = "TNM_SOURCE_TIMEOUT";
pub const ENV_MAX_CONCURRENT_REPORTS: &str = "TNM_MAX_CONCURRENT_REPORTS";
pub const ENV_LOG_FILTER: &str = "TNM_LOG";

/// Errors from loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Orchestration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Upper bound on a single classifier run
    #[serde(with = "humantime_duration")]
    pub classifier_timeout: Duration,

    /// Upper bound on fetching findings from a source
    #[serde(with = "humantime_duration")]
    pub source_timeout: Duration,

    /// Reports staged concurrently by `stage_batch`
    pub max_concurrent_reports: usize,

    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    pub log_filter: String,
}

mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            classifier_timeout: Duration::from_secs(2),
            source_timeout: Duration::from_secs(10),
            max_concurrent_reports: 8,
            log_filter: "info".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Apply `TNM_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_CLASSIFIER_TIMEOUT) {
            self.classifier_timeout = parse_duration(ENV_CLASSIFIER_TIMEOUT, &value)?;
        }
        if let Some(value) = lookup(ENV_SOURCE_TIMEOUT) {
            self.source_timeout = parse_duration(ENV_SOURCE_TIMEOUT, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_CONCURRENT_REPORTS) {
            self.max_concurrent_reports =
                value
                    .trim()
                    .parse()
                    .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                        key: ENV_MAX_CONCURRENT_REPORTS.to_string(),
                        value: value.clone(),
                        reason: e.to_string(),
                    })?;
        }
        if let Some(value) = lookup(ENV_LOG_FILTER) {
            self.log_filter = value;
        }

        self.validate()?;
        Ok(self)
    }

    /// Reject settings the orchestrator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.classifier_timeout.is_zero() {
            return Err(invalid("classifier_timeout", "0s", "must be greater than zero"));
        }
        if self.source_timeout.is_zero() {
            return Err(invalid("source_timeout", "0s", "must be greater than zero"));
        }
        if self.max_concurrent_reports == 0 {
            return Err(invalid("max_concurrent_reports", "0", "must be at least 1"));
        }
        Ok(())
    }
}

fn parse_duration(key: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
