//! SurrealDB integration for the job queue system.
//!
//! This crate provides database connectivity and the job repository, which
//! is the single source of truth and the only coordination point between
//! worker processes.
//!
//! # Features
//!
//! - `memory` (default): in-memory storage for testing
//! - `remote` (default): connect to a SurrealDB server over WebSocket, required
//!   when several worker processes share one queue
//! - `rocksdb` / `surrealkv`: embedded file storage for a single process

mod connection;
mod schema;
pub mod repositories;

pub use connection::{Database, DbConfig, DbError, get_db, init_db};
pub use schema::init_schema;

/// Initialize the database with the given configuration.
///
/// This should be called once at application startup.
pub async fn init(config: DbConfig) -> Result<(), DbError> {
    init_db(config).await?;
    init_schema().await?;
    Ok(())
}
