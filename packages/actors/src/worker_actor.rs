//! Worker actor: claims jobs from the store and runs them one at a time.

use std::sync::Arc;
use std::time::Duration;

use db::DbError;
use db::repositories::JobRepository;
use queue_core::{Job, RetryPolicy, unix_now};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::executor::{ExecOutcome, Executor};
use crate::messages::WorkerMessage;
use crate::signals::ShutdownSignal;

/// Phase of the worker loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Claiming work, or waiting for the next poll.
    Polling,
    /// A claimed job is running.
    Executing,
    /// Shutdown requested while a job was running; no new job will start.
    ShuttingDown,
    /// Final.
    Terminated,
}

/// Timing knobs for the worker loop.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Wait before re-polling an empty queue.
    pub idle_interval: Duration,
    /// Wait after an operational fault (store unreachable and the like).
    pub error_backoff: Duration,
    /// Time allowed for the in-flight job after SIGTERM before forced exit.
    pub grace_period: Duration,
    /// Reschedule policy for failed jobs.
    pub retry_policy: RetryPolicy,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            idle_interval: Duration::from_secs(1),
            error_backoff: Duration::from_secs(5),
            grace_period: Duration::from_secs(30),
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// Tally of settled jobs, logged when the worker stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerTally {
    pub completed: u64,
    pub retried: u64,
    pub dead: u64,
}

/// State for the worker actor.
pub struct WorkerActorState {
    /// Unique worker ID.
    pub worker_id: String,
    /// Current loop phase.
    pub phase: WorkerState,
    pub executor: Arc<dyn Executor>,
    pub settings: WorkerSettings,
    /// Task running the in-flight job.
    in_flight: Option<JoinHandle<()>>,
    pub tally: WorkerTally,
}

impl WorkerActorState {
    fn new(args: WorkerArgs) -> Self {
        Self {
            worker_id: args.worker_id,
            phase: WorkerState::Polling,
            executor: args.executor,
            settings: args.settings,
            in_flight: None,
            tally: WorkerTally::default(),
        }
    }
}

/// Worker actor arguments.
pub struct WorkerArgs {
    pub worker_id: String,
    pub executor: Arc<dyn Executor>,
    pub settings: WorkerSettings,
}

/// Worker actor that executes jobs.
pub struct WorkerActor;

impl WorkerActor {
    async fn poll(
        myself: &ActorRef<WorkerMessage>,
        state: &mut WorkerActorState,
    ) -> Result<(), ActorProcessingErr> {
        if state.phase != WorkerState::Polling {
            return Ok(());
        }

        match JobRepository::claim_next(&state.worker_id).await {
            Ok(Some(job)) => {
                tracing::info!(
                    worker_id = %state.worker_id,
                    job_id = %job.id,
                    attempts = job.attempts,
                    "Processing job: {}",
                    job.command
                );
                state.phase = WorkerState::Executing;

                let executor = Arc::clone(&state.executor);
                let reply_to = myself.clone();
                state.in_flight = Some(tokio::spawn(async move {
                    let outcome = executor.execute(&job.command).await;
                    // The actor may already be gone after a forced stop.
                    let _ = reply_to.send_message(WorkerMessage::Finished {
                        job: Box::new(job),
                        outcome,
                    });
                }));
            }
            Ok(None) => {
                myself.send_after(state.settings.idle_interval, || WorkerMessage::Poll);
            }
            Err(e) => {
                tracing::error!(worker_id = %state.worker_id, error = %e, "Failed to claim job");
                myself.send_after(state.settings.error_backoff, || WorkerMessage::Poll);
            }
        }

        Ok(())
    }

    /// Record the outcome of a finished job in the store.
    async fn settle(
        state: &mut WorkerActorState,
        job: &Job,
        outcome: ExecOutcome,
    ) -> Result<(), DbError> {
        match outcome {
            ExecOutcome::Succeeded => {
                JobRepository::mark_completed(&job.id).await?;
                state.tally.completed += 1;
                tracing::info!(worker_id = %state.worker_id, job_id = %job.id, "Job completed");
            }
            ExecOutcome::Failed(reason) => {
                let attempts = job.attempts + 1;
                if job.is_exhausted_at(attempts) {
                    JobRepository::mark_dead(&job.id, attempts, &reason).await?;
                    state.tally.dead += 1;
                    tracing::warn!(
                        worker_id = %state.worker_id,
                        job_id = %job.id,
                        attempts,
                        error = %reason,
                        "Job failed and moved to the dead-letter queue"
                    );
                } else {
                    let run_after = state
                        .settings
                        .retry_policy
                        .next_run_after(attempts, unix_now());
                    JobRepository::mark_failed_for_retry(&job.id, run_after, attempts, &reason)
                        .await?;
                    state.tally.retried += 1;
                    tracing::info!(
                        worker_id = %state.worker_id,
                        job_id = %job.id,
                        attempts,
                        max_retries = job.max_retries,
                        run_after,
                        error = %reason,
                        "Job failed, rescheduled"
                    );
                }
            }
        }
        Ok(())
    }

    fn terminate(myself: &ActorRef<WorkerMessage>, state: &mut WorkerActorState) {
        state.phase = WorkerState::Terminated;
        myself.stop(Some("shutdown requested".to_string()));
    }
}

impl Actor for WorkerActor {
    type Msg = WorkerMessage;
    type State = WorkerActorState;
    type Arguments = WorkerArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting worker: {}", args.worker_id);

        let state = WorkerActorState::new(args);

        // Start the work loop
        myself.send_message(WorkerMessage::Poll)?;

        Ok(state)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::Poll => {
                Self::poll(&myself, state).await?;
            }

            WorkerMessage::Finished { job, outcome } => {
                state.in_flight = None;
                let settled = Self::settle(state, &job, outcome).await;

                if state.phase == WorkerState::ShuttingDown {
                    if let Err(e) = settled {
                        tracing::error!(
                            worker_id = %state.worker_id,
                            job_id = %job.id,
                            error = %e,
                            "Failed to record job outcome"
                        );
                    }
                    tracing::info!(
                        worker_id = %state.worker_id,
                        "In-flight job settled, terminating"
                    );
                    Self::terminate(&myself, state);
                    return Ok(());
                }

                state.phase = WorkerState::Polling;
                match settled {
                    // Drain burst work without idling.
                    Ok(()) => myself.send_message(WorkerMessage::Poll)?,
                    Err(e) => {
                        tracing::error!(
                            worker_id = %state.worker_id,
                            job_id = %job.id,
                            error = %e,
                            "Failed to record job outcome"
                        );
                        myself.send_after(state.settings.error_backoff, || WorkerMessage::Poll);
                    }
                }
            }

            WorkerMessage::Shutdown { signal } => match state.phase {
                WorkerState::Polling => {
                    tracing::info!(
                        worker_id = %state.worker_id,
                        %signal,
                        "Shutting down idle worker"
                    );
                    Self::terminate(&myself, state);
                }
                WorkerState::Executing => {
                    tracing::info!(
                        worker_id = %state.worker_id,
                        %signal,
                        "Shutdown requested, finishing in-flight job"
                    );
                    state.phase = WorkerState::ShuttingDown;
                }
                WorkerState::ShuttingDown | WorkerState::Terminated => {
                    tracing::debug!(
                        worker_id = %state.worker_id,
                        %signal,
                        "Shutdown already in progress"
                    );
                }
            },

            WorkerMessage::GetState { reply } => {
                let _ = reply.send(state.phase);
            }
        }

        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if let Some(task) = state.in_flight.take() {
            tracing::warn!(worker_id = %state.worker_id, "Worker stopped with a job in flight");
            task.abort();
        }
        state.phase = WorkerState::Terminated;
        tracing::info!(
            worker_id = %state.worker_id,
            completed = state.tally.completed,
            retried = state.tally.retried,
            dead = state.tally.dead,
            "Worker stopped"
        );
        Ok(())
    }
}

/// Spawn a worker actor.
pub async fn spawn_worker(
    args: WorkerArgs,
) -> Result<(ActorRef<WorkerMessage>, JoinHandle<()>), ractor::SpawnErr> {
    WorkerActor::spawn(None, WorkerActor, args).await
}

/// Ask a worker for its current loop state.
pub async fn worker_state(worker: &ActorRef<WorkerMessage>) -> Option<WorkerState> {
    let result = ractor::rpc::call(
        worker,
        |reply| WorkerMessage::GetState { reply },
        Some(Duration::from_secs(5)),
    )
    .await;
    match result {
        Ok(ractor::rpc::CallResult::Success(phase)) => Some(phase),
        _ => None,
    }
}

/// Request a graceful stop, logging when the worker is already gone.
pub fn request_shutdown(worker: &ActorRef<WorkerMessage>, signal: ShutdownSignal) {
    if worker.send_message(WorkerMessage::Shutdown { signal }).is_err() {
        tracing::debug!("Worker already stopped");
    }
}
