//! Worker process driver: one worker actor plus shutdown signal handling.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Sleep;

use crate::signals::ShutdownSignal;
use crate::worker_actor::{WorkerArgs, request_shutdown, spawn_worker};

/// How a worker process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The worker terminated on its own after a shutdown request.
    Drained,
    /// The grace period ran out with a job still in flight.
    GraceExpired,
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Failed to spawn worker actor: {0}")]
    Spawn(#[from] ractor::SpawnErr),

    #[error("Worker actor panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Run a worker until it terminates.
///
/// Each signal received on `shutdown` is forwarded to the worker. The first
/// signal that arms the grace deadline starts the countdown; when it expires
/// the worker is killed and the in-flight job is abandoned in `processing`.
pub async fn run_worker(
    args: WorkerArgs,
    mut shutdown: mpsc::Receiver<ShutdownSignal>,
) -> Result<WorkerExit, WorkerError> {
    let grace_period = args.settings.grace_period;
    let worker_id = args.worker_id.clone();
    let (worker, mut handle) = spawn_worker(args).await?;

    let mut deadline: Option<Pin<Box<Sleep>>> = None;

    loop {
        tokio::select! {
            joined = &mut handle => {
                joined?;
                tracing::info!(worker_id = %worker_id, "Worker terminated");
                return Ok(WorkerExit::Drained);
            }
            Some(signal) = shutdown.recv() => {
                request_shutdown(&worker, signal);
                if signal.arms_grace_deadline() && deadline.is_none() {
                    tracing::info!(
                        worker_id = %worker_id,
                        grace_secs = grace_period.as_secs(),
                        "Grace period started"
                    );
                    deadline = Some(Box::pin(tokio::time::sleep(grace_period)));
                }
            }
            () = expired(&mut deadline) => {
                tracing::warn!(worker_id = %worker_id, "Grace period expired, forcing exit");
                worker.kill();
                // The actor is going away regardless of how the join resolves.
                let _ = handle.await;
                return Ok(WorkerExit::GraceExpired);
            }
        }
    }
}

/// Resolve when the deadline passes; never resolve while none is armed.
fn expired(deadline: &mut Option<Pin<Box<Sleep>>>) -> impl Future<Output = ()> + '_ {
    async move {
        match deadline {
            Some(sleep) => sleep.as_mut().await,
            None => std::future::pending().await,
        }
    }
}
