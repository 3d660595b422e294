//! Worker processes for the job queue.
//!
//! This crate provides the Ractor-based worker loop and the process-level
//! machinery around it.
//!
//! # Architecture
//!
//! - `WorkerActor` - Claims one job at a time from the store, runs it through
//!   an [`Executor`] and records the outcome
//! - [`run_worker`] - Hosts a worker actor in a process and applies shutdown
//!   signals and the grace period
//! - [`Manager`] - Spawns, tracks and stops worker processes through the
//!   [`WorkerRegistry`]
//!
//! # Usage
//!
//! ```ignore
//! use actors::{forward_signals, run_worker, ShellExecutor, WorkerArgs, WorkerSettings};
//!
//! let args = WorkerArgs {
//!     worker_id: "worker-1".into(),
//!     executor: Arc::new(ShellExecutor::new(Duration::from_secs(60))),
//!     settings: WorkerSettings::default(),
//! };
//! let exit = run_worker(args, forward_signals()?).await?;
//! ```

mod executor;
mod manager;
mod messages;
pub mod registry;
mod runner;
mod signals;
mod worker_actor;

pub use executor::{ExecFuture, ExecOutcome, Executor, FnExecutor, ShellExecutor};
pub use manager::{Manager, ManagerError, StopOutcome, StopReport, WorkerStatus};
pub use messages::WorkerMessage;
pub use registry::{RegistryError, WorkerRecord, WorkerRegistry, worker_id_for};
pub use runner::{WorkerError, WorkerExit, run_worker};
pub use signals::{ShutdownSignal, forward_signals};
pub use worker_actor::{
    WorkerActor, WorkerArgs, WorkerSettings, WorkerState, WorkerTally, request_shutdown,
    spawn_worker, worker_state,
};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef};
