//! `docflow-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the job status data model, and the account-cleanup entity.

pub mod account;
pub mod error;
pub mod id;
pub mod job;

pub use account::{AccountState, CleanupCandidate};
pub use error::{DomainError, DomainResult};
pub use id::{DocumentId, JobId, PrincipalKey};
pub use job::{JobState, JobStatusRecord, QueueEntry, TransformRequest};
