//! Job admission: liveness, locking, capacity, status, enqueue.
//!
//! Many request handlers call [`AdmissionController::admit`] concurrently,
//! across threads and across processes. The only synchronization between
//! them is the store-backed create-if-absent lock; worker liveness and queue
//! depth are unfenced snapshots and are treated as guards, not guarantees.

use chrono::Utc;
use tracing::{info, instrument, warn};

use docflow_core::{
    DocumentId, JobId, JobStatusRecord, PrincipalKey, QueueEntry, TransformRequest,
};
use docflow_infra::{JobQueue, JobStatusStore, KeyValueStore, LockManager};

use crate::config::AdmissionConfig;

/// Why an admission was rejected.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    /// No workers are registered against the queue; retryable later.
    #[error("no workers registered against the job queue")]
    WorkerPoolUnavailable,

    /// The principal already holds a live processing lock.
    #[error("principal already has a job in flight")]
    AlreadyProcessing,

    /// Queue depth reached the ceiling; backpressure, retryable after delay.
    #[error("job queue is at capacity")]
    QueueFull,

    /// Infrastructure failure. Admission must never be assumed successful
    /// when this is returned.
    #[error("store failure during admission: {0}")]
    Store(String),
}

impl AdmissionError {
    fn store(err: impl std::fmt::Display) -> Self {
        Self::Store(err.to_string())
    }
}

/// Why a status lookup returned no record.
#[derive(Debug, thiserror::Error)]
pub enum StatusLookupError {
    /// Unknown or expired job id: "processing status unavailable", not a
    /// statement about whether the job ever existed.
    #[error("job not found")]
    JobNotFound,

    #[error("store failure during status lookup: {0}")]
    Store(String),
}

/// Admission controller over the shared store and work queue.
///
/// Admission runs a fixed sequence, short-circuiting on first failure:
/// worker liveness, per-principal lock, queue capacity, status record,
/// enqueue. Any failure after the lock was taken releases it before the
/// error propagates, so a failed admission never leaves a principal blocked
/// for the whole lease.
///
/// Ordinary completion does **not** release the lock: the lease simply
/// expires. A principal whose job outlives the lease can therefore be
/// admitted again while the first job still runs. Adding worker-side
/// release would change observable retry timing, so that behavior is a
/// product decision, not a code fix.
#[derive(Debug, Clone)]
pub struct AdmissionController<S, Q> {
    locks: LockManager<S>,
    statuses: JobStatusStore<S>,
    queue: Q,
    config: AdmissionConfig,
}

impl<S, Q> AdmissionController<S, Q>
where
    S: KeyValueStore + Clone,
    Q: JobQueue,
{
    pub fn new(store: S, queue: Q, config: AdmissionConfig) -> Self {
        Self {
            locks: LockManager::new(store.clone()),
            statuses: JobStatusStore::new(store),
            queue,
            config,
        }
    }

    /// Admit a job for the principal, or explain the rejection.
    ///
    /// On success exactly one lock, one status record and one queue entry
    /// exist for the admission. The capacity check and the enqueue are not
    /// atomic with each other; under heavy concurrency the true depth may
    /// briefly exceed the ceiling. That window is accepted: the ceiling is
    /// a soft admission heuristic, and the queue runtime's own bounded
    /// worker concurrency is what ultimately protects the pool.
    #[instrument(
        skip(self, document_id, transform),
        fields(principal = %principal, job_id = %job_id),
        err
    )]
    pub async fn admit(
        &self,
        principal: PrincipalKey,
        job_id: JobId,
        document_id: DocumentId,
        transform: TransformRequest,
    ) -> Result<(), AdmissionError> {
        let workers = self
            .queue
            .worker_count()
            .await
            .map_err(AdmissionError::store)?;
        if workers == 0 {
            return Err(AdmissionError::WorkerPoolUnavailable);
        }

        let acquired = self
            .locks
            .acquire(&self.config.lock_domain, &principal, self.config.lock_ttl)
            .await
            .map_err(AdmissionError::store)?;
        if !acquired {
            return Err(AdmissionError::AlreadyProcessing);
        }

        // From here on the lock is held; every failure path must release it
        // before propagating.
        match self
            .admit_locked(&principal, &job_id, document_id, transform)
            .await
        {
            Ok(()) => {
                info!(principal = %principal, job_id = %job_id, "job admitted");
                Ok(())
            }
            Err(err) => {
                self.release_after_failure(&principal).await;
                Err(err)
            }
        }
    }

    /// Steps 3-5: capacity, status record, enqueue. Caller owns the lock.
    async fn admit_locked(
        &self,
        principal: &PrincipalKey,
        job_id: &JobId,
        document_id: DocumentId,
        transform: TransformRequest,
    ) -> Result<(), AdmissionError> {
        let depth = self.queue.depth().await.map_err(AdmissionError::store)?;
        if depth.total() >= self.config.queue_ceiling {
            return Err(AdmissionError::QueueFull);
        }

        let record = JobStatusRecord::queued(document_id, Utc::now());
        self.statuses
            .write(job_id, &record, self.config.status_ttl)
            .await
            .map_err(AdmissionError::store)?;

        let entry = QueueEntry::new(
            job_id.clone(),
            document_id,
            principal.clone(),
            transform,
        );
        self.queue
            .submit(entry)
            .await
            .map_err(AdmissionError::store)?;

        Ok(())
    }

    /// Best-effort release on the failure path. A failed release is logged
    /// and swallowed: the lease TTL is the safety net, and the admission
    /// error being propagated is the one the caller needs to see.
    async fn release_after_failure(&self, principal: &PrincipalKey) {
        if let Err(err) = self
            .locks
            .release(&self.config.lock_domain, principal)
            .await
        {
            warn!(
                principal = %principal,
                error = %err,
                "failed to release admission lock; lease will expire on its own"
            );
        }
    }

    /// Look up the eventually-consistent status for a job.
    ///
    /// Absent and expired records are indistinguishable and both surface as
    /// [`StatusLookupError::JobNotFound`].
    #[instrument(skip(self), fields(job_id = %job_id), err)]
    pub async fn get_status(&self, job_id: &JobId) -> Result<JobStatusRecord, StatusLookupError> {
        match self.statuses.read(job_id).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(StatusLookupError::JobNotFound),
            Err(err) => Err(StatusLookupError::Store(err.to_string())),
        }
    }
}
