//! Durable registry of running worker processes.
//!
//! One JSON file per worker (`worker-<pid>.json`) so that a later, separate
//! `worker stop` invocation can find every process started earlier.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Identity of one spawned worker process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub worker_id: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}

impl WorkerRecord {
    pub fn new(pid: u32) -> Self {
        Self {
            worker_id: worker_id_for(pid),
            pid,
            started_at: Utc::now(),
        }
    }
}

/// Worker identity used in job rows and logs.
pub fn worker_id_for(pid: u32) -> String {
    format!("worker-{}", pid)
}

/// File-backed worker registry.
#[derive(Debug, Clone)]
pub struct WorkerRegistry {
    /// Directory holding one record file per worker.
    dir: PathBuf,
}

impl WorkerRegistry {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, pid: u32) -> PathBuf {
        self.dir.join(format!("worker-{}.json", pid))
    }

    /// Record a worker.
    pub async fn register(&self, record: &WorkerRecord) -> Result<(), RegistryError> {
        fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(record.pid);
        let json = serde_json::to_string_pretty(record)?;

        // Write to temp file first, then rename for atomicity
        let temp_path = self.dir.join(format!("worker-{}.json.tmp", record.pid));
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, &path).await?;

        tracing::debug!("Registered worker {} at {:?}", record.worker_id, path);
        Ok(())
    }

    /// Forget a worker. Removing an unknown pid is not an error.
    pub async fn remove(&self, pid: u32) -> Result<(), RegistryError> {
        match fs::remove_file(self.path_for(pid)).await {
            Ok(()) => {
                tracing::debug!("Removed registry record for pid {}", pid);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// All recorded workers, ordered by pid.
    ///
    /// Unreadable or malformed record files are skipped with a warning.
    pub async fn list(&self) -> Result<Vec<WorkerRecord>, RegistryError> {
        let mut records = Vec::new();

        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(records),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|e| e != "json") {
                continue;
            }

            let parsed = match fs::read_to_string(&path).await {
                Ok(json) => {
                    serde_json::from_str::<WorkerRecord>(&json).map_err(RegistryError::from)
                }
                Err(e) => Err(e.into()),
            };
            match parsed {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Skipping registry file {:?}: {}", path, e),
            }
        }

        records.sort_by_key(|record| record.pid);
        Ok(records)
    }
}

/// Registry errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_list_remove() {
        let dir = tempfile::tempdir().unwrap();
        let registry = WorkerRegistry::new(dir.path().join("pidfiles"));

        assert!(registry.list().await.unwrap().is_empty());

        let second = WorkerRecord::new(4321);
        let first = WorkerRecord::new(1234);
        registry.register(&second).await.unwrap();
        registry.register(&first).await.unwrap();

        let listed = registry.list().await.unwrap();
        assert_eq!(listed, vec![first.clone(), second.clone()]);
        assert_eq!(listed[0].worker_id, "worker-1234");
        assert!(dir.path().join("pidfiles/worker-1234.json").exists());
        assert!(!dir.path().join("pidfiles/worker-1234.json.tmp").exists());

        registry.remove(1234).await.unwrap();
        registry.remove(1234).await.unwrap();
        assert_eq!(registry.list().await.unwrap(), vec![second]);
    }

    #[tokio::test]
    async fn malformed_records_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let registry = WorkerRegistry::new(dir.path());

        registry.register(&WorkerRecord::new(7)).await.unwrap();
        std::fs::write(dir.path().join("worker-8.json"), "not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let listed = registry.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].pid, 7);
    }
}
