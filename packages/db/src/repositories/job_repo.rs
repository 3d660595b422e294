//! Job repository: the durable store and the claim protocol.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use queue_core::{Job, JobId, JobState, StateCounts};
use serde::{Deserialize, Serialize};

use crate::{DbError, get_db};

/// Attempts made when a write loses an optimistic-concurrency race.
const CONFLICT_RETRIES: u32 = 5;

/// Base pause between conflict retries, multiplied by the attempt number.
const CONFLICT_BACKOFF: Duration = Duration::from_millis(10);

/// Repository for job persistence operations.
pub struct JobRepository;

/// Internal record type for SurrealDB.
///
/// The record key (`job:<id>`) is never read back; `job_id` mirrors it as a
/// plain string.
#[derive(Debug, Serialize, Deserialize)]
struct JobRecord {
    job_id: String,
    command: String,
    state: JobState,
    attempts: u32,
    max_retries: u32,
    run_after: i64,
    last_error: Option<String>,
    worker_id: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl JobRecord {
    fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id.to_string(),
            command: job.command.clone(),
            state: job.state,
            attempts: job.attempts,
            max_retries: job.max_retries,
            run_after: job.run_after,
            last_error: job.last_error.clone(),
            worker_id: job.worker_id.clone(),
            created_at: job.created_at.timestamp_micros(),
            updated_at: job.updated_at.timestamp_micros(),
        }
    }

    fn into_job(self) -> Job {
        Job {
            id: JobId::from(self.job_id),
            command: self.command,
            state: self.state,
            attempts: self.attempts,
            max_retries: self.max_retries,
            run_after: self.run_after,
            last_error: self.last_error,
            worker_id: self.worker_id,
            created_at: from_micros(self.created_at),
            updated_at: from_micros(self.updated_at),
        }
    }
}

/// Row shape of the per-state count query.
#[derive(Debug, Deserialize)]
struct StateCountRow {
    state: JobState,
    count: u64,
}

fn from_micros(micros: i64) -> DateTime<Utc> {
    Utc.timestamp_micros(micros).single().unwrap_or_default()
}

fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}

/// Run a write, retrying while it keeps losing optimistic-concurrency races.
async fn retry_on_conflict<T, F, Fut>(mut op: F) -> Result<T, DbError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, DbError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(err) if err.is_conflict() && attempt < CONFLICT_RETRIES => {
                tracing::debug!(attempt, error = %err, "Write conflict, retrying");
                tokio::time::sleep(CONFLICT_BACKOFF * attempt).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

impl JobRepository {
    /// Insert a new job in `pending` state.
    ///
    /// Fails with [`DbError::DuplicateKey`] if a job with the same id exists.
    pub async fn enqueue(job: &Job) -> Result<Job, DbError> {
        let db = get_db()?;
        let id = job.id.to_string();

        let mut record = JobRecord::from_job(job);
        record.state = JobState::Pending;
        record.worker_id = None;

        let created: Option<JobRecord> = db
            .create(("job", id.clone()))
            .content(record)
            .await
            .map_err(|e| DbError::classify(e, &id))?;

        let job = created
            .map(JobRecord::into_job)
            .ok_or_else(|| DbError::Query("Failed to create job".into()))?;

        tracing::debug!(job_id = %job.id, "Job enqueued");
        Ok(job)
    }

    /// Atomically claim the oldest eligible pending job for `worker_id`.
    ///
    /// The selection and the transition to `processing` happen in one
    /// statement; the `WHERE state = 'pending'` guard on the update means a
    /// job already taken by a concurrent claimer is never returned twice.
    /// Returns `None` when nothing is eligible, or when every retry lost the
    /// race to another claimer.
    ///
    /// "Oldest" means smallest `created_at` (microseconds). Jobs created in
    /// the same microsecond are taken in `job_id` order, not insertion order;
    /// generated ids are ULIDs, so the two agree unless callers supply ids.
    pub async fn claim_next(worker_id: &str) -> Result<Option<Job>, DbError> {
        let db = get_db()?;

        for attempt in 1..=CONFLICT_RETRIES {
            let result = db
                .query(
                    r#"
                    UPDATE (
                        SELECT id, created_at, job_id FROM job
                        WHERE state = 'pending' AND run_after <= $now
                        ORDER BY created_at ASC, job_id ASC
                        LIMIT 1
                    )
                    SET state = 'processing', worker_id = $worker_id, updated_at = $now_micros
                    WHERE state = 'pending'
                    RETURN AFTER
                    "#,
                )
                .bind(("now", Utc::now().timestamp()))
                .bind(("now_micros", now_micros()))
                .bind(("worker_id", worker_id.to_string()))
                .await
                .and_then(|mut response| response.take::<Vec<JobRecord>>(0));

            match result {
                Ok(records) => {
                    let job = records.into_iter().next().map(JobRecord::into_job);
                    if let Some(job) = &job {
                        tracing::debug!(job_id = %job.id, worker_id, "Job claimed");
                    }
                    return Ok(job);
                }
                Err(err) => {
                    let err = DbError::classify(err, "");
                    if !err.is_conflict() {
                        return Err(err);
                    }
                    tracing::debug!(attempt, worker_id, "Claim conflicted with another worker");
                    tokio::time::sleep(CONFLICT_BACKOFF * attempt).await;
                }
            }
        }

        Ok(None)
    }

    /// Mark a processing job as completed.
    pub async fn mark_completed(id: &JobId) -> Result<Job, DbError> {
        Self::transition(
            id,
            JobState::Processing,
            "UPDATE type::thing('job', $id) SET state = 'completed', updated_at = $now_micros \
             WHERE state = 'processing' RETURN AFTER",
            serde_json::json!({}),
        )
        .await
    }

    /// Return a processing job to `pending`, to be retried no earlier than
    /// `run_after`.
    pub async fn mark_failed_for_retry(
        id: &JobId,
        run_after: i64,
        attempts: u32,
        last_error: &str,
    ) -> Result<Job, DbError> {
        Self::transition(
            id,
            JobState::Processing,
            "UPDATE type::thing('job', $id) SET state = 'pending', run_after = $run_after, \
             attempts = $attempts, last_error = $last_error, updated_at = $now_micros \
             WHERE state = 'processing' RETURN AFTER",
            serde_json::json!({
                "run_after": run_after,
                "attempts": attempts,
                "last_error": last_error,
            }),
        )
        .await
    }

    /// Move a processing job whose retries are exhausted to the dead-letter queue.
    pub async fn mark_dead(id: &JobId, attempts: u32, last_error: &str) -> Result<Job, DbError> {
        Self::transition(
            id,
            JobState::Processing,
            "UPDATE type::thing('job', $id) SET state = 'dead', attempts = $attempts, \
             last_error = $last_error, updated_at = $now_micros \
             WHERE state = 'processing' RETURN AFTER",
            serde_json::json!({
                "attempts": attempts,
                "last_error": last_error,
            }),
        )
        .await
    }

    /// Revive a dead job: back to `pending` with `attempts = 0`, eligible now.
    pub async fn requeue_dead(id: &JobId) -> Result<Job, DbError> {
        Self::transition(
            id,
            JobState::Dead,
            "UPDATE type::thing('job', $id) SET state = 'pending', attempts = 0, \
             run_after = $now, worker_id = NONE, updated_at = $now_micros \
             WHERE state = 'dead' RETURN AFTER",
            serde_json::json!({ "now": Utc::now().timestamp() }),
        )
        .await
    }

    /// Apply a state-guarded update.
    ///
    /// When the guard does not match, nothing is written and the caller gets
    /// `NotFound` or `InvalidTransition` depending on whether the job exists.
    async fn transition(
        id: &JobId,
        expected: JobState,
        query: &'static str,
        bindings: serde_json::Value,
    ) -> Result<Job, DbError> {
        let db = get_db()?;

        let updated = retry_on_conflict(|| {
            let bindings = bindings.clone();
            async move {
                let mut response = db
                    .query(query)
                    .bind(("id", id.to_string()))
                    .bind(("now_micros", now_micros()))
                    .bind(bindings)
                    .await
                    .map_err(|e| DbError::classify(e, id.as_str()))?;
                let records: Vec<JobRecord> = response
                    .take(0)
                    .map_err(|e| DbError::classify(e, id.as_str()))?;
                Ok(records.into_iter().next())
            }
        })
        .await?;

        if let Some(record) = updated {
            let job = record.into_job();
            tracing::debug!(job_id = %job.id, state = %job.state, "Job updated");
            return Ok(job);
        }

        match Self::find(id).await? {
            Some(current) => Err(DbError::InvalidTransition {
                id: id.to_string(),
                expected: expected.as_str(),
                actual: current.state.to_string(),
            }),
            None => Err(DbError::NotFound(format!("Job not found: {}", id))),
        }
    }

    /// Get a job by ID, if it exists.
    pub async fn find(id: &JobId) -> Result<Option<Job>, DbError> {
        let db = get_db()?;

        let record: Option<JobRecord> = db.select(("job", id.to_string())).await?;

        Ok(record.map(JobRecord::into_job))
    }

    /// Get a job by ID.
    pub async fn get(id: &JobId) -> Result<Job, DbError> {
        Self::find(id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("Job not found: {}", id)))
    }

    /// List jobs in a state, oldest first, with the same tie-break as
    /// [`JobRepository::claim_next`].
    pub async fn list_by_state(state: JobState, limit: usize) -> Result<Vec<Job>, DbError> {
        let db = get_db()?;

        let mut result = db
            .query(
                r#"
                SELECT * FROM job
                WHERE state = $state
                ORDER BY created_at ASC, job_id ASC
                LIMIT $limit
                "#,
            )
            .bind(("state", state.as_str()))
            .bind(("limit", limit))
            .await?;

        let records: Vec<JobRecord> = result.take(0)?;

        Ok(records.into_iter().map(JobRecord::into_job).collect())
    }

    /// Count jobs per state. States with no jobs report zero.
    pub async fn counts_by_state() -> Result<StateCounts, DbError> {
        let db = get_db()?;

        let mut result = db
            .query("SELECT state, count() AS count FROM job GROUP BY state")
            .await?;

        let rows: Vec<StateCountRow> = result.take(0)?;

        let mut counts = StateCounts::default();
        for row in rows {
            counts.set(row.state, row.count);
        }

        Ok(counts)
    }
}
