//! Message types for actor communication.

use queue_core::Job;
use ractor::RpcReplyPort;

use crate::executor::ExecOutcome;
use crate::signals::ShutdownSignal;
use crate::worker_actor::WorkerState;

/// Messages for the WorkerActor.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Try to claim and start the next eligible job.
    Poll,

    /// The in-flight job finished executing.
    Finished {
        job: Box<Job>,
        outcome: ExecOutcome,
    },

    /// Stop taking new work and terminate once the in-flight job is settled.
    Shutdown { signal: ShutdownSignal },

    /// Report the current loop state.
    GetState { reply: RpcReplyPort<WorkerState> },
}
