//! Worker pool supervision: spawn, track and signal worker processes.
//!
//! Each worker is an independent OS process, so a crashed worker never takes
//! down its siblings or the manager. The manager holds no job state; it only
//! talks to processes and the [`WorkerRegistry`].

use std::ffi::OsString;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde::Serialize;
use thiserror::Error;

use crate::registry::{RegistryError, WorkerRecord, WorkerRegistry};

/// Manager errors.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Failed to spawn worker: {0}")]
    Spawn(std::io::Error),

    #[error("Failed to signal pid {pid}: {reason}")]
    Signal { pid: u32, reason: String },
}

/// What `stop` did for one recorded worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    /// SIGTERM delivered.
    Signalled,
    /// The process was already gone; its record was cleaned up.
    Stale,
    /// Delivery failed; the record was kept.
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct StopReport {
    pub record: WorkerRecord,
    pub outcome: StopOutcome,
}

/// A registered worker and whether its process is still alive.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatus {
    pub record: WorkerRecord,
    pub alive: bool,
}

/// Result of delivering a signal to a pid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Delivered,
    NoSuchProcess,
}

/// Supervises a pool of worker processes.
#[derive(Debug, Clone)]
pub struct Manager {
    registry: WorkerRegistry,
    /// Executable started for each worker.
    program: PathBuf,
    /// Arguments passed to every worker.
    args: Vec<OsString>,
    /// Worker stdout/stderr are appended here; discarded when unset.
    log_file: Option<PathBuf>,
}

impl Manager {
    pub fn new(registry: WorkerRegistry, program: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            program: program.into(),
            args: Vec::new(),
            log_file: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    /// Spawn `count` workers and record each one.
    ///
    /// Workers already spawned stay registered if a later spawn fails.
    pub async fn start(&self, count: usize) -> Result<Vec<WorkerRecord>, ManagerError> {
        let mut started = Vec::with_capacity(count);

        for _ in 0..count {
            let child = self.command()?.spawn().map_err(ManagerError::Spawn)?;
            let record = WorkerRecord::new(child.id());
            // The child is not waited on; it outlives this process.
            drop(child);

            self.registry.register(&record).await?;
            tracing::info!(worker_id = %record.worker_id, pid = record.pid, "Started worker");
            started.push(record);
        }

        Ok(started)
    }

    fn command(&self) -> Result<Command, ManagerError> {
        let mut command = Command::new(&self.program);
        command.args(&self.args).stdin(Stdio::null());

        match &self.log_file {
            Some(path) => {
                let log = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(ManagerError::Spawn)?;
                let err_log = log.try_clone().map_err(ManagerError::Spawn)?;
                command.stdout(log).stderr(err_log);
            }
            None => {
                command.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        // Keep workers out of the terminal's process group so Ctrl+C on the
        // manager does not reach them.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        Ok(command)
    }

    /// Send SIGTERM to every recorded worker.
    ///
    /// Records are removed once the signal is delivered or the process turns
    /// out to be gone already. Other delivery failures are logged and the
    /// record is kept for a later attempt.
    pub async fn stop(&self) -> Result<Vec<StopReport>, ManagerError> {
        let mut reports = Vec::new();

        for record in self.registry.list().await? {
            let outcome = match send_signal(record.pid, "-TERM").await {
                Ok(Delivery::Delivered) => {
                    self.registry.remove(record.pid).await?;
                    tracing::info!(
                        worker_id = %record.worker_id,
                        pid = record.pid,
                        "Sent SIGTERM to worker"
                    );
                    StopOutcome::Signalled
                }
                Ok(Delivery::NoSuchProcess) => {
                    self.registry.remove(record.pid).await?;
                    tracing::info!(
                        worker_id = %record.worker_id,
                        pid = record.pid,
                        "Removed stale worker record"
                    );
                    StopOutcome::Stale
                }
                Err(e) => {
                    tracing::error!(
                        worker_id = %record.worker_id,
                        pid = record.pid,
                        error = %e,
                        "Failed to stop worker"
                    );
                    StopOutcome::Failed
                }
            };
            reports.push(StopReport { record, outcome });
        }

        Ok(reports)
    }

    /// List recorded workers with their liveness.
    pub async fn status(&self) -> Result<Vec<WorkerStatus>, ManagerError> {
        let mut statuses = Vec::new();

        for record in self.registry.list().await? {
            let alive = matches!(send_signal(record.pid, "-0").await, Ok(Delivery::Delivered));
            statuses.push(WorkerStatus { record, alive });
        }

        Ok(statuses)
    }
}

/// Deliver a signal through the system `kill` utility. `-0` only probes.
async fn send_signal(pid: u32, signal: &str) -> Result<Delivery, ManagerError> {
    let output = tokio::process::Command::new("kill")
        .args([signal, &pid.to_string()])
        .output()
        .await
        .map_err(|e| ManagerError::Signal {
            pid,
            reason: e.to_string(),
        })?;

    if output.status.success() {
        return Ok(Delivery::Delivered);
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.contains("No such process") {
        Ok(Delivery::NoSuchProcess)
    } else {
        Err(ManagerError::Signal {
            pid,
            reason: stderr.trim().to_string(),
        })
    }
}
