//! Job status data model and queue payload types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{DocumentId, JobId, PrincipalKey};

/// Processing state of a submitted job.
///
/// Written as `queued` by the admission path; every later transition is made
/// by the external worker through the same status store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Accepted and enqueued, not yet picked up
    Queued,
    /// A worker is processing the job
    Active,
    /// Finished successfully
    Completed,
    /// Finished with an error (see `JobStatusRecord::error`)
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// Eventually-consistent status record for a submitted job.
///
/// Created once by the admission path with a fixed TTL and never mutated by
/// it afterwards; the worker pool owns every subsequent update. After the TTL
/// the record is indistinguishable from one that never existed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusRecord {
    /// Document/resource the job transforms
    pub document_id: DocumentId,
    /// Current state
    pub state: JobState,
    /// Error message, set by the worker on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the job was admitted
    pub submitted_at: DateTime<Utc>,
}

impl JobStatusRecord {
    /// The record written at admission time.
    pub fn queued(document_id: DocumentId, submitted_at: DateTime<Utc>) -> Self {
        Self {
            document_id,
            state: JobState::Queued,
            error: None,
            submitted_at,
        }
    }
}

/// Target transformation the worker should apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TransformRequest {
    /// Translate the document into the given language
    Translate { target_language: String },
    /// Produce a summary of the document
    Summarize,
    /// Answer a prompt against the document
    ChatCompletion { prompt: String },
}

/// Unit of work handed to the worker pool.
///
/// Keyed by the job id: the queue treats a second submission with the same id
/// as a no-op, so the entry is safe to resubmit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub job_id: JobId,
    pub document_id: DocumentId,
    pub principal: PrincipalKey,
    pub transform: TransformRequest,
}

impl QueueEntry {
    pub fn new(
        job_id: JobId,
        document_id: DocumentId,
        principal: PrincipalKey,
        transform: TransformRequest,
    ) -> Self {
        Self {
            job_id,
            document_id,
            principal,
            transform,
        }
    }
}
