//! Configuration loading and persistence.
//!
//! Precedence, lowest to highest: built-in defaults, the JSON config file,
//! `QUEUECTL_*` environment variables.

use std::path::Path;

use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized};
use queue_core::{Config, ConfigKey};
use serde_json::{Map, Value};

/// Environment variable prefix for overrides (`QUEUECTL_MAX_RETRIES=5`).
pub const ENV_PREFIX: &str = "QUEUECTL_";

fn file_figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Json::file(path))
}

/// Load the effective configuration.
pub fn load(path: &Path) -> Result<Config> {
    let config: Config = file_figment(path)
        .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]))
        .extract()
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Persist `key = value` to the config file, keeping every other key.
///
/// The file is left untouched when the key is unknown or the value invalid.
pub fn set(path: &Path, key: &str, raw_value: &str) -> Result<Config> {
    let key = ConfigKey::parse(key)?;
    let value = key.parse_value(raw_value)?;

    let mut stored = read_file(path)?;
    stored.insert(key.as_str().to_string(), value);

    // Validate what the file would contain, without environment overrides.
    let updated: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Serialized::defaults(&stored))
        .extract()
        .context("invalid configuration")?;
    updated.validate()?;

    let json = serde_json::to_string_pretty(&Value::Object(stored))?;
    std::fs::write(path, json + "\n")
        .with_context(|| format!("failed to write {}", path.display()))?;

    tracing::debug!(key = key.as_str(), "Configuration updated");
    Ok(updated)
}

fn read_file(path: &Path) -> Result<Map<String, Value>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
        Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
    };
    match serde_json::from_str(&raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => bail!("{} must contain a JSON object", path.display()),
        Err(e) => Err(e).with_context(|| format!("malformed JSON in {}", path.display())),
    }
}
