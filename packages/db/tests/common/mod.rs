use std::error::Error;
use std::future::Future;
use std::sync::LazyLock;

use tokio::runtime::Runtime;
use tokio::sync::{Mutex, MutexGuard};

use db::{DbConfig, DbError};

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
