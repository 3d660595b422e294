#![allow(dead_code)]

use std::error::Error;
use std::future::Future;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use actors::{ExecFuture, ExecOutcome, Executor, FnExecutor, WorkerArgs, WorkerSettings};
use db::repositories::JobRepository;
use db::{DbConfig, DbError};
use queue_core::{Job, JobId, RetryPolicy, StateCounts};
use tokio::runtime::Runtime;
use tokio::sync::{Mutex, MutexGuard};

/// The store connection is process-global and its background task lives on
/// the runtime that opened it, so every test in a binary shares one runtime.
static RUNTIME: LazyLock<Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build test runtime")
});

static TEST_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub type TestResult = Result<(), Box<dyn Error>>;

/// Drive a test body on the shared runtime.
pub fn run<F>(test: F) -> TestResult
where
    F: Future<Output = TestResult>,
{
    RUNTIME.block_on(test)
}

pub async fn setup_db() -> Result<MutexGuard<'static, ()>, DbError> {
    let guard = TEST_LOCK.lock().await;
    db::init(DbConfig::memory()).await?;
    let db_conn = db::get_db()?;
    db_conn.query("DELETE job;").await?.check()?;
    Ok(guard)
}

/// Fast polling, one-second backoff steps.
pub fn fast_settings() -> WorkerSettings {
    WorkerSettings {
        idle_interval: Duration::from_millis(50),
        error_backoff: Duration::from_millis(200),
        grace_period: Duration::from_secs(30),
        retry_policy: RetryPolicy::new(1, 300),
    }
}

pub fn worker_args(
    worker_id: &str,
    executor: Arc<dyn Executor>,
    settings: WorkerSettings,
) -> WorkerArgs {
    WorkerArgs {
        worker_id: worker_id.to_string(),
        executor,
        settings,
    }
}

/// Succeeds unless the command starts with `fail`.
pub fn scripted_executor() -> Arc<dyn Executor> {
    Arc::new(FnExecutor::new(|command: &str| -> ExecFuture {
        let outcome = if command.starts_with("fail") {
            ExecOutcome::failed(format!("{command}: boom"))
        } else {
            ExecOutcome::Succeeded
        };
        Box::pin(async move { outcome })
    }))
}

pub async fn wait_for_job<F>(
    id: &JobId,
    timeout: Duration,
    mut done: F,
) -> Result<Job, Box<dyn Error>>
where
    F: FnMut(&Job) -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        let job = JobRepository::get(id).await?;
        if done(&job) {
            return Ok(job);
        }
        if Instant::now() > deadline {
            return Err(format!("timed out waiting for job {id}: {job:?}").into());
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

pub async fn wait_for_counts<F>(
    timeout: Duration,
    mut done: F,
) -> Result<StateCounts, Box<dyn Error>>
where
    F: FnMut(&StateCounts) -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        let counts = JobRepository::counts_by_state().await?;
        if done(&counts) {
            return Ok(counts);
        }
        if Instant::now() > deadline {
            return Err(format!("timed out waiting for counts: {counts:?}").into());
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}
