//! Database connection management with lazy initialization.

use std::sync::LazyLock;
use surrealdb::Surreal;
use surrealdb::engine::any::{Any, connect};
use surrealdb::opt::auth::Root;
use thiserror::Error;
use tokio::sync::OnceCell;

/// Global database instance using lazy initialization.
static DB: LazyLock<OnceCell<Surreal<Any>>> = LazyLock::new(OnceCell::new);

/// Database connection wrapper.
pub type Database = Surreal<Any>;

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Connection endpoint: "mem://", "rocksdb://path", "surrealkv://path" or "ws://host:port"
    pub endpoint: String,
    /// Namespace to use
    pub namespace: String,
    /// Database name to use
    pub database: String,
    /// Optional root credentials for authentication
    pub credentials: Option<(String, String)>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            endpoint: "mem://".to_string(),
            namespace: "queuectl".to_string(),
            database: "main".to_string(),
            credentials: None,
        }
    }
}

impl DbConfig {
    /// Create a config for in-memory testing.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Create a config for an arbitrary endpoint.
    pub fn endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set root credentials for authentication.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }
}

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database not initialized - call init_db first")]
    NotInitialized,
    #[error("Connection error: {0}")]
    Connection(#[from] surrealdb::Error),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Duplicate key: job {0} already exists")]
    DuplicateKey(String),
    #[error("Invalid transition for job {id}: expected state {expected}, found {actual}")]
    InvalidTransition {
        id: String,
        expected: &'static str,
        actual: String,
    },
    #[error("Write conflict: {0}")]
    Conflict(String),
}

impl DbError {
    /// Classify a raw SurrealDB error, recognising optimistic-concurrency
    /// conflicts and duplicate record ids.
    pub(crate) fn classify(err: surrealdb::Error, id: &str) -> Self {
        let message = err.to_string();
        if message.contains("already exists") {
            DbError::DuplicateKey(id.to_string())
        } else if is_conflict_message(&message) {
            DbError::Conflict(message)
        } else {
            DbError::Connection(err)
        }
    }

    /// Whether retrying the same operation may succeed.
    pub fn is_conflict(&self) -> bool {
        match self {
            DbError::Conflict(_) => true,
            DbError::Connection(err) => is_conflict_message(&err.to_string()),
            _ => false,
        }
    }
}

fn is_conflict_message(message: &str) -> bool {
    message.contains("conflict") || message.contains("can be retried")
}

/// Initialize the database connection.
///
/// This should be called once at application startup before any database operations.
pub async fn init_db(config: DbConfig) -> Result<&'static Database, DbError> {
    DB.get_or_try_init(|| async {
        tracing::info!("Connecting to database: {}", config.endpoint);

        let db = connect(&config.endpoint).await?;

        // Authenticate if credentials provided
        if let Some((username, password)) = &config.credentials {
            db.signin(Root {
                username,
                password,
            })
            .await?;
        }

        // Select namespace and database
        db.use_ns(&config.namespace).use_db(&config.database).await?;

        tracing::info!(
            "Connected to database: {}/{}",
            config.namespace,
            config.database
        );

        Ok(db)
    })
    .await
}

/// Get the database connection.
pub fn get_db() -> Result<&'static Database, DbError> {
    DB.get().ok_or(DbError::NotInitialized)
}

