//! Account directory: the source of cleanup candidates.
//!
//! The directory owns account lifecycle records. The reclamation sweep only
//! ever reads a bounded batch of pending candidates and flips their
//! completion flag; the deletion action and the hard-delete expiry are
//! external to this workspace.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use docflow_core::{CleanupCandidate, PrincipalKey};

pub mod postgres;

/// Directory operation error.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("account not found: {0}")]
    NotFound(PrincipalKey),

    #[error("directory storage error: {0}")]
    Storage(String),
}

/// Bounded, filterable view of accounts pending cleanup.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Fetch up to `limit` accounts with `state = deleted` and
    /// `purge_completed = false`, oldest first.
    async fn fetch_pending_cleanup(
        &self,
        limit: usize,
    ) -> Result<Vec<CleanupCandidate>, DirectoryError>;

    /// Atomically set `purge_completed = true` and refresh `updated_at`.
    async fn mark_purge_complete(&self, principal: &PrincipalKey) -> Result<(), DirectoryError>;
}

#[async_trait]
impl<D> AccountDirectory for Arc<D>
where
    D: AccountDirectory + ?Sized,
{
    async fn fetch_pending_cleanup(
        &self,
        limit: usize,
    ) -> Result<Vec<CleanupCandidate>, DirectoryError> {
        (**self).fetch_pending_cleanup(limit).await
    }

    async fn mark_purge_complete(&self, principal: &PrincipalKey) -> Result<(), DirectoryError> {
        (**self).mark_purge_complete(principal).await
    }
}

/// In-memory directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAccountDirectory {
    accounts: RwLock<HashMap<String, CleanupCandidate>>,
}

impl InMemoryAccountDirectory {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
        }
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn insert(&self, candidate: CleanupCandidate) {
        let mut accounts = self.accounts.write().unwrap();
        accounts.insert(candidate.principal.as_str().to_string(), candidate);
    }

    pub fn get(&self, principal: &PrincipalKey) -> Option<CleanupCandidate> {
        let accounts = self.accounts.read().unwrap();
        accounts.get(principal.as_str()).cloned()
    }
}

#[async_trait]
impl AccountDirectory for InMemoryAccountDirectory {
    async fn fetch_pending_cleanup(
        &self,
        limit: usize,
    ) -> Result<Vec<CleanupCandidate>, DirectoryError> {
        let accounts = self.accounts.read().unwrap();
        let mut pending: Vec<_> = accounts
            .values()
            .filter(|c| c.pending_cleanup())
            .cloned()
            .collect();

        pending.sort_by_key(|c| c.updated_at);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn mark_purge_complete(&self, principal: &PrincipalKey) -> Result<(), DirectoryError> {
        let mut accounts = self.accounts.write().unwrap();
        let candidate = accounts
            .get_mut(principal.as_str())
            .ok_or_else(|| DirectoryError::NotFound(principal.clone()))?;

        candidate.purge_completed = true;
        candidate.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use docflow_core::AccountState;

    fn candidate(principal: &str, state: AccountState, completed: bool) -> CleanupCandidate {
        CleanupCandidate {
            principal: PrincipalKey::new(principal).unwrap(),
            state,
            purge_completed: completed,
            hard_delete_at: Utc::now() + Duration::days(30),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn fetch_filters_to_deleted_and_incomplete() {
        let directory = InMemoryAccountDirectory::new();
        directory.insert(candidate("a@x.com", AccountState::Deleted, false));
        directory.insert(candidate("b@x.com", AccountState::Active, false));
        directory.insert(candidate("c@x.com", AccountState::Deleted, true));

        let pending = directory.fetch_pending_cleanup(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].principal.as_str(), "a@x.com");
    }

    #[tokio::test]
    async fn fetch_is_bounded() {
        let directory = InMemoryAccountDirectory::new();
        for i in 0..150 {
            directory.insert(candidate(
                &format!("user-{i}@x.com"),
                AccountState::Deleted,
                false,
            ));
        }

        let pending = directory.fetch_pending_cleanup(100).await.unwrap();
        assert_eq!(pending.len(), 100);
    }

    #[tokio::test]
    async fn mark_complete_flips_flag_and_refreshes_timestamp() {
        let directory = InMemoryAccountDirectory::new();
        let before = Utc::now() - Duration::hours(1);
        let mut stale = candidate("a@x.com", AccountState::Deleted, false);
        stale.updated_at = before;
        directory.insert(stale);

        let principal = PrincipalKey::new("a@x.com").unwrap();
        directory.mark_purge_complete(&principal).await.unwrap();

        let updated = directory.get(&principal).unwrap();
        assert!(updated.purge_completed);
        assert!(updated.updated_at > before);
        assert!(directory.fetch_pending_cleanup(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mark_complete_on_unknown_account_is_not_found() {
        let directory = InMemoryAccountDirectory::new();
        let principal = PrincipalKey::new("ghost@x.com").unwrap();

        assert!(matches!(
            directory.mark_purge_complete(&principal).await,
            Err(DirectoryError::NotFound(_))
        ));
    }
}
