//! Job domain types for work items in the queue.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ulid::Ulid;

/// Current wall-clock time as unix seconds, the unit of `run_after`.
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

/// Unique identifier for a job.
///
/// Generated ids are ULIDs so they sort by creation time; ids supplied by
/// callers are accepted verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Create a new unique job ID.
    pub fn new() -> Self {
        Self(Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle stage of a job.
///
/// `Completed` and `Dead` are terminal. `Failed` is kept as a recognised value
/// for listing and counting, but the worker never writes it: a failed attempt
/// goes back to `Pending` or on to `Dead`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Dead,
}

impl JobState {
    pub const ALL: [JobState; 5] = [
        JobState::Pending,
        JobState::Processing,
        JobState::Completed,
        JobState::Failed,
        JobState::Dead,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Dead => "dead",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown job state '{0}' (expected pending, processing, completed, failed or dead)")]
pub struct ParseStateError(String);

impl FromStr for JobState {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseStateError(s.to_string()))
    }
}

/// A job: one shell command and its execution history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier, immutable once enqueued.
    pub id: JobId,
    /// Shell command to execute.
    pub command: String,
    /// Current lifecycle stage.
    pub state: JobState,
    /// Number of failed executions so far.
    pub attempts: u32,
    /// Attempts allowed before the job is moved to the dead-letter queue.
    pub max_retries: u32,
    /// Earliest unix second at which a pending job may be claimed.
    pub run_after: i64,
    /// Diagnostic captured from the most recent failure.
    pub last_error: Option<String>,
    /// Worker currently or last holding the job.
    pub worker_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new pending job, eligible immediately.
    pub fn new(command: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            command: command.into(),
            state: JobState::Pending,
            attempts: 0,
            max_retries: 3,
            run_after: now.timestamp(),
            last_error: None,
            worker_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Use a caller-supplied id instead of a generated one.
    pub fn with_id(mut self, id: impl Into<JobId>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the max retries for this job.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Delay the first eligible claim.
    pub fn with_run_after(mut self, run_after: i64) -> Self {
        self.run_after = run_after;
        self
    }

    /// Whether a failure recorded now, bringing the count to `attempts`,
    /// exhausts the job.
    pub fn is_exhausted_at(&self, attempts: u32) -> bool {
        attempts >= self.max_retries
    }
}

/// Errors raised while turning enqueue input into a job.
#[derive(Debug, Error)]
pub enum JobSpecError {
    #[error("malformed job JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("job JSON must be an object")]
    NotAnObject,

    #[error("job command must not be empty")]
    EmptyCommand,

    #[error("job id must not be empty")]
    EmptyId,
}

/// Optional overrides supplied as a JSON object at enqueue time.
///
/// Unknown keys are ignored; `id`, `command` and `max_retries` replace the
/// values given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JobSpec {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl JobSpec {
    /// Parse a JSON object into a spec.
    pub fn from_json(raw: &str) -> Result<Self, JobSpecError> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        if !value.is_object() {
            return Err(JobSpecError::NotAnObject);
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Build the job, letting spec fields win over the given defaults.
    pub fn into_job(self, command: &str, max_retries: u32) -> Result<Job, JobSpecError> {
        let command = self.command.unwrap_or_else(|| command.to_string());
        if command.trim().is_empty() {
            return Err(JobSpecError::EmptyCommand);
        }

        let mut job = Job::new(command).with_max_retries(self.max_retries.unwrap_or(max_retries));
        if let Some(id) = self.id {
            if id.trim().is_empty() {
                return Err(JobSpecError::EmptyId);
            }
            job = job.with_id(id);
        }
        Ok(job)
    }
}
