//! Core domain types for the job queue system.
//!
//! This crate contains shared types used across all packages:
//! - Job, JobId and JobState for work items
//! - StateCounts for per-state aggregates
//! - RetryPolicy for failure rescheduling
//! - Config for the settings every process starts from

mod config;
mod job;
mod retry;
mod stats;

pub use config::{Config, ConfigError, ConfigKey};
pub use job::{Job, JobId, JobSpec, JobSpecError, JobState, ParseStateError, unix_now};
pub use retry::RetryPolicy;
pub use stats::StateCounts;
