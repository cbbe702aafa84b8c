//! Audit persistence backends.
//!
//! The logger only needs one operation: append a record. Stores are
//! append-only and keyed by nothing.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::audit::record::AuditRecord;

/// Errors from an audit store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Append-only persistence for audit records.
pub trait AuditStore: Send + Sync + 'static {
    fn store<'a>(&'a self, record: &'a AuditRecord) -> BoxFuture<'a, Result<(), StoreError>>;
}

/// Writes one JSON document per line to a file.
#[derive(Debug)]
pub struct JsonLinesStore {
    path: PathBuf,
    file: tokio::sync::Mutex<tokio::fs::File>,
}

impl JsonLinesStore {
    /// Open (creating if needed) `path` for appending.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: tokio::sync::Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditStore for JsonLinesStore {
    fn store<'a>(&'a self, record: &'a AuditRecord) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let mut line = serde_json::to_vec(record)?;
            line.push(b'\n');

            let mut file = self.file.lock().await;
            file.write_all(&line).await?;
            file.flush().await?;
            Ok(())
        })
    }
}

/// Keeps records in memory. Useful for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything stored so far, in arrival order.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().expect("memory store mutex poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("memory store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditStore for MemoryStore {
    fn store<'a>(&'a self, record: &'a AuditRecord) -> BoxFuture<'a, Result<(), StoreError>> {
        self.records
            .lock()
            .expect("memory store mutex poisoned")
            .push(record.clone());
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::record::RecordDraft;
    use crate::transport::RequestMeta;
    use axum::http::{Method, StatusCode};

    fn record(endpoint: &str) -> AuditRecord {
        RecordDraft::new(&RequestMeta::default(), Method::GET, endpoint, String::new())
            .completed(StatusCode::OK, String::new(), None)
    }

    #[tokio::test]
    async fn test_json_lines_appends() {
        let dir = std::env::temp_dir().join(format!("audit-store-{}", uuid::Uuid::new_v4()));
        let path = dir.join("audit.jsonl");

        let store = JsonLinesStore::open(&path).await.unwrap();
        store.store(&record("http://a")).await.unwrap();
        store.store(&record("http://b")).await.unwrap();
        drop(store);

        // Reopening appends rather than truncates.
        let store = JsonLinesStore::open(&path).await.unwrap();
        store.store(&record("http://c")).await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let endpoints: Vec<String> = content
            .lines()
            .map(|line| serde_json::from_str::<AuditRecord>(line).unwrap().endpoint)
            .collect();
        assert_eq!(endpoints, vec!["http://a", "http://b", "http://c"]);

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
