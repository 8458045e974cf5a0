//! Durable work queue consumed by the external worker pool.
//!
//! The queue guarantees at-least-once delivery and idempotent acceptance:
//! submitting the same job id twice never creates a second logical job.
//! Depth and worker-liveness reads are point-in-time snapshots with no
//! freshness guarantee relative to concurrent admissions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use docflow_core::{JobId, QueueEntry};

#[cfg(feature = "redis")]
pub mod redis_streams;

/// Queue operation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueueError {
    #[error("queue connection error: {0}")]
    Connection(String),

    #[error("queue command error: {0}")]
    Command(String),

    #[error("queue payload serialization error: {0}")]
    Serialization(String),
}

/// Point-in-time snapshot of queue occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct QueueDepth {
    /// Accepted, not yet picked up by a worker
    pub queued: u64,
    /// Currently being processed
    pub in_flight: u64,
}

impl QueueDepth {
    pub fn total(&self) -> u64 {
        self.queued + self.in_flight
    }
}

/// Work queue abstraction.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// How many workers are currently registered against the queue.
    ///
    /// Best-effort liveness signal; workers may register or deregister
    /// concurrently with the read.
    async fn worker_count(&self) -> Result<u32, QueueError>;

    /// Snapshot of not-yet-started and in-flight entry counts.
    async fn depth(&self) -> Result<QueueDepth, QueueError>;

    /// Submit an entry keyed by its job id.
    ///
    /// Idempotent acceptance: a second submission with an already-seen job
    /// id is a no-op, not an error. Entries are configured for a single
    /// delivery attempt with no automatic retry and are discarded by the
    /// queue runtime on terminal processing.
    async fn submit(&self, entry: QueueEntry) -> Result<(), QueueError>;
}

#[async_trait]
impl<Q> JobQueue for Arc<Q>
where
    Q: JobQueue + ?Sized,
{
    async fn worker_count(&self) -> Result<u32, QueueError> {
        (**self).worker_count().await
    }

    async fn depth(&self) -> Result<QueueDepth, QueueError> {
        (**self).depth().await
    }

    async fn submit(&self, entry: QueueEntry) -> Result<(), QueueError> {
        (**self).submit(entry).await
    }
}

/// In-memory queue for tests/dev.
///
/// Worker count and in-flight depth are injectable so admission guards can
/// be exercised without a worker pool.
#[derive(Debug, Default)]
pub struct InMemoryJobQueue {
    entries: Mutex<HashMap<JobId, QueueEntry>>,
    workers: AtomicU32,
    in_flight: AtomicU64,
    fail_submits: AtomicBool,
}

impl InMemoryJobQueue {
    /// A queue with a single registered worker.
    pub fn new() -> Self {
        Self::with_workers(1)
    }

    pub fn with_workers(workers: u32) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            workers: AtomicU32::new(workers),
            in_flight: AtomicU64::new(0),
            fail_submits: AtomicBool::new(false),
        }
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn set_workers(&self, workers: u32) {
        self.workers.store(workers, Ordering::SeqCst);
    }

    pub fn set_in_flight(&self, in_flight: u64) {
        self.in_flight.store(in_flight, Ordering::SeqCst);
    }

    /// Make every subsequent submit fail with a command error.
    pub fn fail_submits(&self, fail: bool) {
        self.fail_submits.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, job_id: &JobId) -> bool {
        self.entries.lock().unwrap().contains_key(job_id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn worker_count(&self) -> Result<u32, QueueError> {
        Ok(self.workers.load(Ordering::SeqCst))
    }

    async fn depth(&self) -> Result<QueueDepth, QueueError> {
        Ok(QueueDepth {
            queued: self.entries.lock().unwrap().len() as u64,
            in_flight: self.in_flight.load(Ordering::SeqCst),
        })
    }

    async fn submit(&self, entry: QueueEntry) -> Result<(), QueueError> {
        if self.fail_submits.load(Ordering::SeqCst) {
            return Err(QueueError::Command("submit failed (injected)".to_string()));
        }

        let mut entries = self.entries.lock().unwrap();
        // Duplicate ids are accepted and dropped.
        entries.entry(entry.job_id.clone()).or_insert(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docflow_core::{DocumentId, PrincipalKey, TransformRequest};

    fn entry(job_id: &str) -> QueueEntry {
        QueueEntry::new(
            JobId::new(job_id).unwrap(),
            DocumentId::new(),
            PrincipalKey::new("alice@x.com").unwrap(),
            TransformRequest::Summarize,
        )
    }

    #[tokio::test]
    async fn duplicate_submit_is_a_noop() {
        let queue = InMemoryJobQueue::new();

        queue.submit(entry("job-1")).await.unwrap();
        queue.submit(entry("job-1")).await.unwrap();

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.depth().await.unwrap().queued, 1);
    }

    #[tokio::test]
    async fn depth_counts_queued_and_in_flight() {
        let queue = InMemoryJobQueue::new();

        queue.submit(entry("job-1")).await.unwrap();
        queue.submit(entry("job-2")).await.unwrap();
        queue.set_in_flight(3);

        let depth = queue.depth().await.unwrap();
        assert_eq!(depth.queued, 2);
        assert_eq!(depth.in_flight, 3);
        assert_eq!(depth.total(), 5);
    }

    #[tokio::test]
    async fn worker_count_is_injectable() {
        let queue = InMemoryJobQueue::with_workers(0);
        assert_eq!(queue.worker_count().await.unwrap(), 0);

        queue.set_workers(4);
        assert_eq!(queue.worker_count().await.unwrap(), 4);
    }
}
