//! Reclamation sweep: purge dependent data for deleted accounts.
//!
//! Runs on an external schedule, independent of the request path and of
//! per-request locking. Each run fetches a bounded batch of accounts
//! pending cleanup and processes them as isolated tasks: one candidate's
//! failure can neither mask nor abort another's. A candidate is only marked
//! complete once every dependent store has been purged; anything less
//! leaves it pending for the next run.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use docflow_core::{CleanupCandidate, PrincipalKey};
use docflow_infra::{AccountDirectory, PurgeTarget};

use crate::config::SweepConfig;

/// Sweep operation error.
///
/// Only the initial candidate fetch surfaces here; per-candidate failures
/// are logged, counted in the [`SweepReport`] and retried on the next run.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("cleanup candidate fetch failed: {0}")]
    Fetch(String),
}

/// Outcome counts for one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SweepReport {
    /// Candidates fetched this run
    pub fetched: usize,
    /// Candidates fully purged and marked complete
    pub completed: usize,
    /// Candidates left pending for the next run
    pub failed: usize,
}

/// Periodic batch purge of dependent data for deleted accounts.
pub struct ReclamationSweep<D> {
    directory: D,
    targets: Vec<Arc<dyn PurgeTarget>>,
    config: SweepConfig,
}

impl<D> ReclamationSweep<D>
where
    D: AccountDirectory + Clone + Send + Sync + 'static,
{
    pub fn new(directory: D, targets: Vec<Arc<dyn PurgeTarget>>, config: SweepConfig) -> Self {
        Self {
            directory,
            targets,
            config,
        }
    }

    /// Run one sweep pass.
    ///
    /// Fetches at most `batch_size` candidates and fans out over them with
    /// bounded concurrency. Returns how the batch fared; an empty fetch is
    /// a no-op run.
    #[instrument(skip(self), err)]
    pub async fn run_once(&self) -> Result<SweepReport, SweepError> {
        let candidates = self
            .directory
            .fetch_pending_cleanup(self.config.batch_size)
            .await
            .map_err(|e| SweepError::Fetch(e.to_string()))?;

        if candidates.is_empty() {
            debug!("no accounts pending cleanup");
            return Ok(SweepReport::default());
        }

        let fetched = candidates.len();
        info!(fetched, "reclamation sweep started");

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for candidate in candidates {
            let directory = self.directory.clone();
            let targets = self.targets.clone();
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("sweep semaphore closed");
                reclaim_candidate(&directory, &targets, &candidate).await
            });
        }

        let mut completed = 0usize;
        let mut failed = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(true) => completed += 1,
                Ok(false) => failed += 1,
                Err(err) => {
                    // A panicked task counts as that candidate failing.
                    warn!(error = %err, "sweep task panicked");
                    failed += 1;
                }
            }
        }

        info!(fetched, completed, failed, "reclamation sweep finished");
        Ok(SweepReport {
            fetched,
            completed,
            failed,
        })
    }
}

/// Purge one candidate's dependent data, then mark it complete.
///
/// All-or-nothing per run: every target must succeed before the flag flips.
/// Purges are idempotent, so a crash after purging but before marking only
/// costs a redundant purge on the next run. Returns whether the candidate
/// was completed.
async fn reclaim_candidate<D: AccountDirectory>(
    directory: &D,
    targets: &[Arc<dyn PurgeTarget>],
    candidate: &CleanupCandidate,
) -> bool {
    let principal = &candidate.principal;

    if let Err((target, err)) = purge_all(targets, principal).await {
        warn!(
            principal = %principal,
            target = %target,
            error = %err,
            "dependent purge failed; candidate stays pending"
        );
        return false;
    }

    match directory.mark_purge_complete(principal).await {
        Ok(()) => {
            debug!(principal = %principal, "account purge completed");
            true
        }
        Err(err) => {
            warn!(
                principal = %principal,
                error = %err,
                "purge succeeded but completion mark failed; candidate stays pending"
            );
            false
        }
    }
}

/// Run every purge target for the principal concurrently.
///
/// All targets are awaited even after a failure so no purge is left
/// detached mid-flight; the first failure is reported.
async fn purge_all(
    targets: &[Arc<dyn PurgeTarget>],
    principal: &PrincipalKey,
) -> Result<(), (String, String)> {
    let mut purges = JoinSet::new();
    for target in targets {
        let target = Arc::clone(target);
        let principal = principal.clone();
        purges.spawn(async move {
            let name = target.name().to_string();
            target.purge(&principal).await.map_err(|e| (name, e.to_string()))
        });
    }

    let mut first_failure = None;
    while let Some(joined) = purges.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(failure)) => {
                first_failure.get_or_insert(failure);
            }
            Err(err) => {
                first_failure.get_or_insert(("purge task".to_string(), err.to_string()));
            }
        }
    }

    match first_failure {
        None => Ok(()),
        Some(failure) => Err(failure),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    use docflow_core::AccountState;
    use docflow_infra::{InMemoryAccountDirectory, InMemoryPurgeTarget};

    fn principal(s: &str) -> PrincipalKey {
        PrincipalKey::new(s).unwrap()
    }

    fn deleted_account(p: &str) -> CleanupCandidate {
        CleanupCandidate {
            principal: principal(p),
            state: AccountState::Deleted,
            purge_completed: false,
            hard_delete_at: Utc::now() + Duration::days(30),
            updated_at: Utc::now(),
        }
    }

    fn sweep(
        directory: Arc<InMemoryAccountDirectory>,
        targets: Vec<Arc<dyn PurgeTarget>>,
    ) -> ReclamationSweep<Arc<InMemoryAccountDirectory>> {
        ReclamationSweep::new(directory, targets, SweepConfig::default())
    }

    #[tokio::test]
    async fn empty_directory_is_a_noop_run() {
        let directory = InMemoryAccountDirectory::arc();
        let sweep = sweep(directory, vec![InMemoryPurgeTarget::arc("documents")]);

        let report = sweep.run_once().await.unwrap();
        assert_eq!(report, SweepReport::default());
    }

    #[tokio::test]
    async fn purges_every_target_then_marks_complete() {
        let directory = InMemoryAccountDirectory::arc();
        let documents = InMemoryPurgeTarget::arc("documents");
        let conversations = InMemoryPurgeTarget::arc("conversations");

        let alice = principal("alice@x.com");
        directory.insert(deleted_account("alice@x.com"));
        documents.insert(&alice, "doc-1");
        conversations.insert(&alice, "chat-1");

        let sweep = sweep(directory.clone(), vec![documents.clone(), conversations.clone()]);
        let report = sweep.run_once().await.unwrap();

        assert_eq!(report.completed, 1);
        assert_eq!(documents.count(&alice), 0);
        assert_eq!(conversations.count(&alice), 0);
        assert!(directory.get(&alice).unwrap().purge_completed);
    }

    #[tokio::test]
    async fn one_failing_candidate_does_not_block_the_others() {
        let directory = InMemoryAccountDirectory::arc();
        let documents = InMemoryPurgeTarget::arc("documents");

        for p in ["a@x.com", "b@x.com", "c@x.com"] {
            directory.insert(deleted_account(p));
        }
        documents.fail_for(&principal("b@x.com"));

        let sweep = sweep(directory.clone(), vec![documents.clone()]);
        let report = sweep.run_once().await.unwrap();

        assert_eq!(report.fetched, 3);
        assert_eq!(report.completed, 2);
        assert_eq!(report.failed, 1);

        assert!(directory.get(&principal("a@x.com")).unwrap().purge_completed);
        assert!(!directory.get(&principal("b@x.com")).unwrap().purge_completed);
        assert!(directory.get(&principal("c@x.com")).unwrap().purge_completed);

        // The failed candidate is picked up again next run.
        let next = directory.fetch_pending_cleanup(100).await.unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].principal.as_str(), "b@x.com");
    }

    #[tokio::test]
    async fn candidate_with_any_failing_target_stays_pending() {
        let directory = InMemoryAccountDirectory::arc();
        let documents = InMemoryPurgeTarget::arc("documents");
        let conversations = InMemoryPurgeTarget::arc("conversations");

        let alice = principal("alice@x.com");
        directory.insert(deleted_account("alice@x.com"));
        documents.insert(&alice, "doc-1");
        conversations.fail_for(&alice);

        let sweep = sweep(directory.clone(), vec![documents, conversations.clone()]);
        let report = sweep.run_once().await.unwrap();

        assert_eq!(report.failed, 1);
        assert!(!directory.get(&alice).unwrap().purge_completed);

        // Retry after the fault clears; the repeated document purge is a
        // safe no-op.
        conversations.clear_failures();
        let report = sweep.run_once().await.unwrap();
        assert_eq!(report.completed, 1);
        assert!(directory.get(&alice).unwrap().purge_completed);
    }

    #[tokio::test]
    async fn batch_size_bounds_one_run() {
        let directory = InMemoryAccountDirectory::arc();
        for i in 0..150 {
            directory.insert(deleted_account(&format!("user-{i}@x.com")));
        }

        let sweep = sweep(directory.clone(), vec![InMemoryPurgeTarget::arc("documents")]);
        let report = sweep.run_once().await.unwrap();

        assert_eq!(report.fetched, 100);
        assert_eq!(report.completed, 100);

        // The remainder waits for the next scheduled run.
        let rest = directory.fetch_pending_cleanup(1000).await.unwrap();
        assert_eq!(rest.len(), 50);
    }
}
