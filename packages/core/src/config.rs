//! Settings shared by every queuectl process.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::RetryPolicy;

/// Effective configuration, treated as immutable once a process has started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SurrealDB endpoint: `mem://`, `rocksdb://path`, `surrealkv://path` or `ws://host:port`.
    pub db_endpoint: String,
    /// Root user for a SurrealDB server that requires authentication.
    pub db_username: Option<String>,
    pub db_password: Option<String>,
    /// Default max retries for newly enqueued jobs.
    pub max_retries: u32,
    pub base_backoff_seconds: u64,
    pub max_backoff_seconds: u64,
    /// Upper bound on a single command's execution time.
    pub processing_timeout_seconds: u64,
    pub log_level: String,
    /// Directory holding one record per running worker process.
    pub registry_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_endpoint: "ws://127.0.0.1:8000".to_string(),
            db_username: None,
            db_password: None,
            max_retries: 3,
            base_backoff_seconds: 2,
            max_backoff_seconds: 300,
            processing_timeout_seconds: 60,
            log_level: "info".to_string(),
            registry_dir: "pidfiles".to_string(),
        }
    }
}

impl Config {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.base_backoff_seconds, self.max_backoff_seconds)
    }

    /// Reject settings the worker cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            (ConfigKey::BaseBackoffSeconds, self.base_backoff_seconds),
            (ConfigKey::MaxBackoffSeconds, self.max_backoff_seconds),
            (ConfigKey::ProcessingTimeoutSeconds, self.processing_timeout_seconds),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.as_str().to_string(),
                    reason: "must be greater than 0".into(),
                });
            }
        }
        if self.db_endpoint.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: ConfigKey::DbEndpoint.as_str().to_string(),
                reason: "must not be empty".into(),
            });
        }
        match (&self.db_username, &self.db_password) {
            (Some(_), None) => Err(ConfigError::InvalidValue {
                key: ConfigKey::DbPassword.as_str().to_string(),
                reason: "required when db_username is set".into(),
            }),
            (None, Some(_)) => Err(ConfigError::InvalidValue {
                key: ConfigKey::DbUsername.as_str().to_string(),
                reason: "required when db_password is set".into(),
            }),
            _ => Ok(()),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown config key '{0}' (allowed: {allowed})", allowed = ConfigKey::allowed_names())]
    UnknownKey(String),

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

/// A settable configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    DbEndpoint,
    DbUsername,
    DbPassword,
    MaxRetries,
    BaseBackoffSeconds,
    MaxBackoffSeconds,
    ProcessingTimeoutSeconds,
    LogLevel,
    RegistryDir,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 9] = [
        ConfigKey::DbEndpoint,
        ConfigKey::DbUsername,
        ConfigKey::DbPassword,
        ConfigKey::MaxRetries,
        ConfigKey::BaseBackoffSeconds,
        ConfigKey::MaxBackoffSeconds,
        ConfigKey::ProcessingTimeoutSeconds,
        ConfigKey::LogLevel,
        ConfigKey::RegistryDir,
    ];

    /// Canonical (snake_case) name, as stored in the config file.
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::DbEndpoint => "db_endpoint",
            ConfigKey::DbUsername => "db_username",
            ConfigKey::DbPassword => "db_password",
            ConfigKey::MaxRetries => "max_retries",
            ConfigKey::BaseBackoffSeconds => "base_backoff_seconds",
            ConfigKey::MaxBackoffSeconds => "max_backoff_seconds",
            ConfigKey::ProcessingTimeoutSeconds => "processing_timeout_seconds",
            ConfigKey::LogLevel => "log_level",
            ConfigKey::RegistryDir => "registry_dir",
        }
    }

    /// Accepts snake_case, kebab-case and camelCase spellings.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        let normalized: String = name
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        ConfigKey::ALL
            .into_iter()
            .find(|key| key.as_str().replace('_', "") == normalized)
            .ok_or_else(|| ConfigError::UnknownKey(name.to_string()))
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ConfigKey::MaxRetries
                | ConfigKey::BaseBackoffSeconds
                | ConfigKey::MaxBackoffSeconds
                | ConfigKey::ProcessingTimeoutSeconds
        )
    }

    /// Convert a raw command-line value into the JSON value stored for this key.
    pub fn parse_value(self, raw: &str) -> Result<serde_json::Value, ConfigError> {
        if !self.is_numeric() {
            return Ok(serde_json::Value::String(raw.to_string()));
        }

        let parsed: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: self.as_str().to_string(),
            reason: format!("'{raw}' is not a non-negative integer"),
        })?;
        if self == ConfigKey::MaxRetries && u32::try_from(parsed).is_err() {
            return Err(ConfigError::InvalidValue {
                key: self.as_str().to_string(),
                reason: format!("'{raw}' is too large"),
            });
        }
        Ok(serde_json::Value::from(parsed))
    }

    fn allowed_names() -> String {
        ConfigKey::ALL
            .iter()
            .map(|key| key.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
