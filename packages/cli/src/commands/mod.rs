//! Command implementations.

pub mod config;
pub mod enqueue;
pub mod jobs;
pub mod status;
pub mod worker;

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use db::DbConfig;
use queue_core::{Config, Job};

/// Store connection settings derived from the configuration.
fn db_config(config: &Config) -> DbConfig {
    let db_config = DbConfig::endpoint(&config.db_endpoint);
    match (&config.db_username, &config.db_password) {
        (Some(username), Some(password)) => db_config.with_credentials(username, password),
        _ => db_config,
    }
}

/// Connect to the store named in the configuration.
pub async fn connect(config: &Config) -> Result<()> {
    db::init(db_config(config))
        .await
        .with_context(|| format!("failed to connect to store at {}", config.db_endpoint))
}

/// Render a unix-seconds timestamp for humans.
fn format_unix(seconds: i64) -> String {
    match Utc.timestamp_opt(seconds, 0).single() {
        Some(at) => at.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => seconds.to_string(),
    }
}

/// Print jobs as JSON or as an aligned table.
pub fn print_jobs(jobs: &[Job], json: bool, with_errors: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(jobs)?);
        return Ok(());
    }

    if jobs.is_empty() {
        println!("No jobs found.");
        return Ok(());
    }

    println!(
        "{:<28} {:<11} {:>8} {:<20} COMMAND",
        "ID", "STATE", "ATTEMPTS", "RUN AFTER"
    );
    for job in jobs {
        println!(
            "{:<28} {:<11} {:>8} {:<20} {}",
            job.id,
            job.state,
            format!("{}/{}", job.attempts, job.max_retries),
            format_unix(job.run_after),
            job.command
        );
        if with_errors {
            if let Some(error) = &job.last_error {
                println!("{:<28} last error: {}", "", error);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_unix_seconds() {
        assert_eq!(format_unix(0), "1970-01-01 00:00:00");
        assert_eq!(format_unix(1_700_000_000), "2023-11-14 22:13:20");
    }

    #[test]
    fn credentials_reach_the_store_config() {
        let anonymous = db_config(&Config::default());
        assert_eq!(anonymous.endpoint, "ws://127.0.0.1:8000");
        assert!(anonymous.credentials.is_none());

        let config = Config {
            db_username: Some("root".into()),
            db_password: Some("secret".into()),
            ..Config::default()
        };
        assert_eq!(
            db_config(&config).credentials,
            Some(("root".to_string(), "secret".to_string()))
        );
    }
}
