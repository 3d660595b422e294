use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use actors::{
    Manager, ShellExecutor, StopOutcome, WorkerArgs, WorkerExit, WorkerRegistry, WorkerSettings,
    forward_signals, run_worker, worker_id_for,
};
use anyhow::{Context, Result};
use queue_core::Config;

/// Manager that starts this executable as `worker run` with the same config file.
pub fn manager(config: &Config, config_path: &Path) -> Result<Manager> {
    let program = std::env::current_exe().context("failed to locate the queuectl executable")?;
    let manager = Manager::new(WorkerRegistry::new(&config.registry_dir), program).with_args([
        OsStr::new("--config"),
        config_path.as_os_str(),
        OsStr::new("worker"),
        OsStr::new("run"),
    ]);
    Ok(manager)
}

pub async fn start(
    config: &Config,
    config_path: &Path,
    count: u16,
    log_file: Option<&Path>,
) -> Result<()> {
    let mut manager = manager(config, config_path)?;
    if let Some(path) = log_file {
        manager = manager.with_log_file(path);
    }

    for record in manager.start(usize::from(count)).await? {
        println!("Started {} (pid {})", record.worker_id, record.pid);
    }
    Ok(())
}

pub async fn stop(config: &Config, config_path: &Path) -> Result<()> {
    let reports = manager(config, config_path)?.stop().await?;
    if reports.is_empty() {
        println!("No workers recorded.");
    }

    for report in &reports {
        let what = match report.outcome {
            StopOutcome::Signalled => "sent SIGTERM",
            StopOutcome::Stale => "already exited, record removed",
            StopOutcome::Failed => "could not be signalled",
        };
        println!("{} (pid {}): {}", report.record.worker_id, report.record.pid, what);
    }

    let failed = reports
        .iter()
        .filter(|report| report.outcome == StopOutcome::Failed)
        .count();
    if failed > 0 {
        anyhow::bail!("{} worker(s) could not be stopped", failed);
    }
    Ok(())
}

pub async fn status(config: &Config, config_path: &Path, json: bool) -> Result<()> {
    let statuses = manager(config, config_path)?.status().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    if statuses.is_empty() {
        println!("No workers recorded.");
        return Ok(());
    }

    println!("{:<16} {:>8} {:<8} STARTED", "WORKER", "PID", "ALIVE");
    for status in statuses {
        println!(
            "{:<16} {:>8} {:<8} {}",
            status.record.worker_id,
            status.record.pid,
            if status.alive { "yes" } else { "no" },
            status.record.started_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

/// Body of a worker process started by `worker start`.
pub async fn run(config: &Config) -> Result<()> {
    // A store that cannot be reached at startup is fatal.
    super::connect(config).await?;

    let pid = std::process::id();
    let worker_id = worker_id_for(pid);
    let args = WorkerArgs {
        worker_id: worker_id.clone(),
        executor: Arc::new(ShellExecutor::new(Duration::from_secs(
            config.processing_timeout_seconds,
        ))),
        settings: WorkerSettings {
            retry_policy: config.retry_policy(),
            ..WorkerSettings::default()
        },
    };

    let signals = forward_signals().context("failed to install signal handlers")?;
    let exit = run_worker(args, signals).await?;

    // Usually removed already by `worker stop`.
    if let Err(e) = WorkerRegistry::new(&config.registry_dir).remove(pid).await {
        tracing::warn!(worker_id = %worker_id, error = %e, "Failed to remove registry record");
    }

    match exit {
        WorkerExit::Drained => tracing::info!(worker_id = %worker_id, "Worker exited cleanly"),
        WorkerExit::GraceExpired => {
            tracing::warn!(worker_id = %worker_id, "Worker exited with a job still in flight")
        }
    }
    Ok(())
}
