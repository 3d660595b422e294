use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use queue_core::JobState;

/// Durable shell-command job queue.
#[derive(Debug, Parser)]
#[command(name = "queuectl", version)]
pub struct Cli {
    /// Configuration file (JSON).
    #[arg(long, global = true, env = "QUEUECTL_CONFIG", default_value = "queuectl.config.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add a job to the queue.
    Enqueue(EnqueueArgs),

    /// Start, stop or inspect worker processes.
    #[command(subcommand)]
    Worker(WorkerCommand),

    /// Show job counts per state.
    Status {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// List jobs in a state, oldest first.
    List {
        #[arg(long, default_value = "pending")]
        state: JobState,

        #[arg(long, default_value_t = 10)]
        limit: usize,

        #[arg(long)]
        json: bool,
    },

    /// Inspect or retry dead-lettered jobs.
    #[command(subcommand)]
    Dlq(DlqCommand),

    /// Show or change configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Args)]
pub struct EnqueueArgs {
    /// Shell command to run. May be omitted when the JSON supplies `command`.
    pub command: Option<String>,

    /// JSON object with optional `id`, `command` and `max_retries`.
    #[arg(long, conflicts_with = "file")]
    pub json: Option<String>,

    /// File containing the JSON object.
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Attempts allowed before the job is dead-lettered.
    #[arg(long)]
    pub max_retries: Option<u32>,
}

#[derive(Debug, Subcommand)]
pub enum WorkerCommand {
    /// Spawn worker processes in the background.
    Start {
        #[arg(
            long,
            short = 'c',
            default_value_t = 1,
            value_parser = clap::value_parser!(u16).range(1..)
        )]
        count: u16,

        /// Append worker output to this file instead of discarding it.
        #[arg(long)]
        log_file: Option<PathBuf>,
    },

    /// Gracefully stop all recorded workers.
    Stop,

    /// List recorded workers and whether they are alive.
    Status {
        #[arg(long)]
        json: bool,
    },

    /// Run a single worker in the foreground.
    #[command(hide = true)]
    Run,
}

#[derive(Debug, Subcommand)]
pub enum DlqCommand {
    /// List dead jobs.
    List {
        #[arg(long, default_value_t = 10)]
        limit: usize,

        #[arg(long)]
        json: bool,
    },

    /// Move a dead job back to pending with its attempts reset.
    Retry {
        job_id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration.
    Show,

    /// Persist a setting to the configuration file.
    Set {
        key: String,
        value: String,
    },
}
