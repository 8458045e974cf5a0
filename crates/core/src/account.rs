//! Account-cleanup entity consumed by the reclamation sweep.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::PrincipalKey;

/// Lifecycle state of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountState {
    Active,
    /// Flagged for deletion; dependent data must be purged before the
    /// scheduled hard delete removes the account itself.
    Deleted,
}

/// An account pending dependent-data purge.
///
/// The external deletion action sets `state = Deleted, purge_completed =
/// false`; the sweep flips `purge_completed` once every dependent store has
/// been purged. An external expiry mechanism hard-deletes the account when
/// `hard_delete_at` elapses regardless of the flag, so the sweep races that
/// deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupCandidate {
    pub principal: PrincipalKey,
    pub state: AccountState,
    pub purge_completed: bool,
    pub hard_delete_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CleanupCandidate {
    /// Whether this candidate should be picked up by a sweep run.
    pub fn pending_cleanup(&self) -> bool {
        self.state == AccountState::Deleted && !self.purge_completed
    }
}
