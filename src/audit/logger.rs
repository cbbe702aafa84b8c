//! Bounded asynchronous audit logger.
//!
//! # Responsibilities
//! - Accept records from any number of request tasks without blocking them
//! - Persist them one at a time on a single background consumer
//! - Drain everything accepted before `close` returns
//!
//! # Design Decisions
//! - Overflow policy is drop-newest: a full queue rejects the incoming record
//!   and counts it, so a slow store never stalls request handling
//! - Delivery to the store is at-most-once; store failures are logged only
//! - Each store call is bounded by a timeout

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::audit::record::AuditRecord;
use crate::audit::store::AuditStore;
use crate::config::AuditConfig;
use crate::observability::metrics;

/// Outcome of [`AuditLogger::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Queued,
    /// The queue was full; the record was discarded.
    DroppedFull,
    /// The logger is closed; the record was discarded.
    DroppedClosed,
}

/// Owns the audit queue and its consumer task.
#[derive(Debug)]
pub struct AuditLogger {
    sender: RwLock<Option<mpsc::Sender<AuditRecord>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    dropped: AtomicU64,
}

impl AuditLogger {
    /// Start the consumer task. Must be called inside a Tokio runtime.
    pub fn spawn(store: Arc<dyn AuditStore>, config: &AuditConfig) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let store_timeout = Duration::from_millis(config.store_timeout_ms);
        let worker = tokio::spawn(consume(rx, store, store_timeout));

        Arc::new(Self {
            sender: RwLock::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            dropped: AtomicU64::new(0),
        })
    }

    /// Hand a record to the consumer. Never waits.
    pub fn submit(&self, record: AuditRecord) -> Submission {
        let sender = self.sender.read().expect("audit sender lock poisoned");
        let Some(sender) = sender.as_ref() else {
            self.note_drop("closed", &record);
            return Submission::DroppedClosed;
        };

        match sender.try_send(record) {
            Ok(()) => Submission::Queued,
            Err(TrySendError::Full(record)) => {
                self.note_drop("queue_full", &record);
                Submission::DroppedFull
            }
            Err(TrySendError::Closed(record)) => {
                self.note_drop("closed", &record);
                Submission::DroppedClosed
            }
        }
    }

    /// Number of records discarded so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.read().expect("audit sender lock poisoned").is_none()
    }

    /// Stop accepting records, drain the queue and wait for the consumer.
    ///
    /// Safe to call more than once; later calls return immediately.
    pub async fn close(&self) {
        // Dropping the only sender lets the consumer finish once drained.
        drop(self.sender.write().expect("audit sender lock poisoned").take());

        let worker = self.worker.lock().expect("audit worker lock poisoned").take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "Audit consumer terminated abnormally");
            }
            tracing::info!(dropped = self.dropped(), "Audit logger closed");
        }
    }

    fn note_drop(&self, reason: &'static str, record: &AuditRecord) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        metrics::record_audit_dropped(reason);
        tracing::warn!(
            reason,
            endpoint = %record.endpoint,
            status = ?record.status,
            "Audit record dropped"
        );
    }
}

async fn consume(
    mut rx: mpsc::Receiver<AuditRecord>,
    store: Arc<dyn AuditStore>,
    store_timeout: Duration,
) {
    while let Some(record) = rx.recv().await {
        match tokio::time::timeout(store_timeout, store.store(&record)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                metrics::record_audit_store_failure();
                tracing::error!(error = %e, endpoint = %record.endpoint, "Failed to persist audit record");
            }
            Err(_) => {
                metrics::record_audit_store_failure();
                tracing::error!(
                    timeout_ms = store_timeout.as_millis() as u64,
                    endpoint = %record.endpoint,
                    "Timed out persisting audit record"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::record::RecordDraft;
    use crate::audit::store::{MemoryStore, StoreError};
    use crate::transport::RequestMeta;
    use axum::http::{Method, StatusCode};
    use futures_util::future::BoxFuture;
    use std::time::Instant;
    use tokio::sync::Semaphore;

    fn record(n: usize) -> AuditRecord {
        RecordDraft::new(&RequestMeta::default(), Method::GET, format!("http://up/{n}"), String::new())
            .completed(StatusCode::OK, String::new(), None)
    }

    fn config(queue_capacity: usize) -> AuditConfig {
        AuditConfig {
            queue_capacity,
            store_timeout_ms: 1_000,
            ..AuditConfig::default()
        }
    }

    /// A store that always fails.
    struct BrokenStore;

    impl AuditStore for BrokenStore {
        fn store<'a>(&'a self, _record: &'a AuditRecord) -> BoxFuture<'a, Result<(), StoreError>> {
            Box::pin(async { Err(StoreError::Unavailable("down".into())) })
        }
    }

    /// A store that waits for a permit before accepting each record.
    struct GatedStore {
        gate: Arc<Semaphore>,
        inner: MemoryStore,
    }

    impl AuditStore for GatedStore {
        fn store<'a>(&'a self, record: &'a AuditRecord) -> BoxFuture<'a, Result<(), StoreError>> {
            Box::pin(async move {
                let permit = self.gate.acquire().await.map_err(|e| StoreError::Unavailable(e.to_string()))?;
                permit.forget();
                self.inner.store(record).await
            })
        }
    }

    #[tokio::test]
    async fn test_close_drains_everything_submitted() {
        let store = Arc::new(MemoryStore::new());
        let logger = AuditLogger::spawn(store.clone(), &config(128));

        for n in 0..100 {
            assert_eq!(logger.submit(record(n)), Submission::Queued);
        }
        logger.close().await;

        let stored = store.records();
        assert_eq!(stored.len(), 100);
        assert_eq!(stored[0].endpoint, "http://up/0");
        assert_eq!(stored[99].endpoint, "http://up/99");

        assert_eq!(logger.submit(record(100)), Submission::DroppedClosed);
        assert!(logger.is_closed());
        logger.close().await;
    }

    #[tokio::test]
    async fn test_store_failure_does_not_block_submit() {
        let logger = AuditLogger::spawn(Arc::new(BrokenStore), &config(1024));

        let start = Instant::now();
        for n in 0..500 {
            logger.submit(record(n));
        }
        assert!(start.elapsed() < Duration::from_millis(500));

        logger.close().await;
        assert_eq!(logger.dropped(), 0);
    }

    #[tokio::test]
    async fn test_full_queue_drops_newest() {
        let gate = Arc::new(Semaphore::new(0));
        let store = Arc::new(GatedStore { gate: gate.clone(), inner: MemoryStore::new() });
        let logger = AuditLogger::spawn(store.clone(), &config(2));

        // The consumer takes the first record and parks on the gate, leaving
        // room for exactly two more.
        assert_eq!(logger.submit(record(0)), Submission::Queued);
        while logger.sender.read().unwrap().as_ref().unwrap().capacity() < 2 {
            tokio::task::yield_now().await;
        }
        assert_eq!(logger.submit(record(1)), Submission::Queued);
        assert_eq!(logger.submit(record(2)), Submission::Queued);
        assert_eq!(logger.submit(record(3)), Submission::DroppedFull);
        assert_eq!(logger.dropped(), 1);

        gate.add_permits(10);
        logger.close().await;

        let endpoints: Vec<String> = store.inner.records().into_iter().map(|r| r.endpoint).collect();
        assert_eq!(endpoints, vec!["http://up/0", "http://up/1", "http://up/2"]);
    }
}
