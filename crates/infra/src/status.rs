//! Job status records in the shared expiring store.

use std::time::Duration;

use tracing::instrument;

use docflow_core::{JobId, JobStatusRecord};

use crate::kv::{KeyValueStore, KvError};

fn status_key(job_id: &JobId) -> String {
    format!("job:status:{}", job_id)
}

/// Status store operation error.
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error(transparent)]
    Store(#[from] KvError),

    #[error("status record encode failed: {0}")]
    Encode(String),

    /// The key existed but its payload was not a valid record. Distinct from
    /// "not found" so callers never mistake corruption for expiry.
    #[error("status record decode failed: {0}")]
    Decode(String),
}

/// Store for eventually-consistent job status records.
///
/// The admission path writes a record exactly once per admitted job; the
/// external worker pool rewrites it as the job progresses through the same
/// contract. Records expire with their TTL and are then indistinguishable
/// from never-written ones.
#[derive(Debug, Clone)]
pub struct JobStatusStore<S> {
    store: S,
}

impl<S: KeyValueStore> JobStatusStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Write the record with the given TTL (last write wins).
    #[instrument(skip(self, record), fields(job_id = %job_id), err)]
    pub async fn write(
        &self,
        job_id: &JobId,
        record: &JobStatusRecord,
        ttl: Duration,
    ) -> Result<(), StatusError> {
        let payload =
            serde_json::to_string(record).map_err(|e| StatusError::Encode(e.to_string()))?;
        self.store.put(&status_key(job_id), &payload, ttl).await?;
        Ok(())
    }

    /// Read the record; `None` for unknown or expired job ids.
    #[instrument(skip(self), fields(job_id = %job_id), err)]
    pub async fn read(&self, job_id: &JobId) -> Result<Option<JobStatusRecord>, StatusError> {
        let payload = match self.store.get(&status_key(job_id)).await? {
            Some(p) => p,
            None => return Ok(None),
        };

        let record = serde_json::from_str(&payload)
            .map_err(|e| StatusError::Decode(format!("{}: {}", job_id, e)))?;
        Ok(Some(record))
    }
}
