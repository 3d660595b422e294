use anyhow::{Context, Result, bail};
use db::DbError;
use db::repositories::JobRepository;
use queue_core::{Config, JobId, JobState};

pub async fn list(config: &Config, state: JobState, limit: usize, json: bool) -> Result<()> {
    super::connect(config).await?;
    let jobs = JobRepository::list_by_state(state, limit).await?;
    super::print_jobs(&jobs, json, state == JobState::Dead || state == JobState::Failed)
}

pub async fn dlq_list(config: &Config, limit: usize, json: bool) -> Result<()> {
    list(config, JobState::Dead, limit, json).await
}

pub async fn dlq_retry(config: &Config, job_id: &str) -> Result<()> {
    super::connect(config).await?;

    let id = JobId::from(job_id);
    let job = match JobRepository::requeue_dead(&id).await {
        Ok(job) => job,
        Err(DbError::NotFound(_)) => bail!("job {} not found", job_id),
        Err(DbError::InvalidTransition { actual, .. }) => {
            bail!("job {} is {}, only dead jobs can be retried", job_id, actual)
        }
        Err(e) => return Err(e).context("failed to requeue job"),
    };

    tracing::info!(job_id = %job.id, "Job moved from the dead-letter queue back to pending");
    println!("Job {} requeued.", job.id);
    Ok(())
}
