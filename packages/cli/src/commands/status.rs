use std::path::Path;

use anyhow::Result;
use db::repositories::JobRepository;
use queue_core::{Config, JobState, StateCounts};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct StatusReport {
    #[serde(flatten)]
    counts: StateCounts,
    total: u64,
    active_workers: usize,
}

pub async fn run(config: &Config, config_path: &Path, json: bool) -> Result<()> {
    super::connect(config).await?;
    let counts = JobRepository::counts_by_state().await?;

    let workers = super::worker::manager(config, config_path)?.status().await?;
    let active_workers = workers.iter().filter(|worker| worker.alive).count();

    let report = StatusReport {
        counts,
        total: counts.total(),
        active_workers,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for state in JobState::ALL {
        println!("{:<12} {:>6}", state.as_str(), report.counts.get(state));
    }
    println!("{:<12} {:>6}", "total", report.total);
    println!("{:<12} {:>6}", "workers", report.active_workers);
    Ok(())
}
