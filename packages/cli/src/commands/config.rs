use std::path::Path;

use anyhow::Result;
use queue_core::Config;

use crate::settings;

pub fn show(config: &Config) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&redacted(config))?);
    Ok(())
}

fn redacted(config: &Config) -> Config {
    let mut shown = config.clone();
    if shown.db_password.is_some() {
        shown.db_password = Some("********".to_string());
    }
    shown
}

pub fn set(path: &Path, key: &str, value: &str) -> Result<()> {
    settings::set(path, key, value)?;
    println!("Set {} = {} in {}", key, value, path.display());
    Ok(())
}
