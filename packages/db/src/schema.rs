//! Database schema definitions using SurrealQL.

use crate::{DbError, get_db};

/// Initialize the database schema.
///
/// This creates all necessary tables, fields, and indexes. Every statement is
/// idempotent so each process may run it at startup.
pub async fn init_schema() -> Result<(), DbError> {
    let db = get_db()?;

    tracing::info!("Initializing database schema...");

    db.query(JOB_SCHEMA).await?.check()?;

    tracing::info!("Database schema initialized");

    Ok(())
}

/// Job table schema.
///
/// Timestamps are integers: `run_after` in unix seconds, `created_at` and
/// `updated_at` in unix microseconds.
const JOB_SCHEMA: &str = r#"
-- Job table, keyed by job id
DEFINE TABLE IF NOT EXISTS job SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS job_id ON job TYPE string;
DEFINE FIELD IF NOT EXISTS command ON job TYPE string;
DEFINE FIELD IF NOT EXISTS state ON job TYPE string
    ASSERT $value IN ["pending", "processing", "completed", "failed", "dead"];
DEFINE FIELD IF NOT EXISTS attempts ON job TYPE int DEFAULT 0;
DEFINE FIELD IF NOT EXISTS max_retries ON job TYPE int DEFAULT 3;
DEFINE FIELD IF NOT EXISTS run_after ON job TYPE int;
DEFINE FIELD IF NOT EXISTS last_error ON job TYPE option<string>;
DEFINE FIELD IF NOT EXISTS worker_id ON job TYPE option<string>;
DEFINE FIELD IF NOT EXISTS created_at ON job TYPE int;
DEFINE FIELD IF NOT EXISTS updated_at ON job TYPE int;

DEFINE INDEX IF NOT EXISTS job_id_unique ON job FIELDS job_id UNIQUE;
DEFINE INDEX IF NOT EXISTS job_state ON job FIELDS state;

-- Compound index for the claim selection (eligible pending jobs, oldest first)
DEFINE INDEX IF NOT EXISTS job_claim ON job FIELDS state, run_after, created_at;
"#;
