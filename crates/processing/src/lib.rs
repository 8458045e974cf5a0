//! `docflow-processing` — job admission and background reclamation.
//!
//! The library-level contract invoked by the surrounding HTTP layer:
//! - [`AdmissionController`] decides whether a new document-processing job
//!   may be accepted (worker liveness, per-principal lock, queue capacity)
//!   and exposes eventually-consistent job status.
//! - [`ReclamationSweep`] periodically purges dependent data for accounts
//!   flagged for deletion, racing their scheduled hard delete.

pub mod admission;
pub mod config;
pub mod janitor;


pub use admission::{AdmissionController, AdmissionError, StatusLookupError};
pub use config::{AdmissionConfig, SweepConfig};
pub use janitor::{ReclamationSweep, SweepError, SweepReport};
