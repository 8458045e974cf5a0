//! Per-principal mutual-exclusion leases.
//!
//! A lock is a presence marker with expiry in the shared store, keyed by
//! `(domain, principal)`. Acquisition is a single atomic create-if-absent;
//! expiry is the only recovery path for a lock whose holder never released
//! it (process crash, network partition).

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, instrument};

use docflow_core::PrincipalKey;

use crate::kv::{KeyValueStore, KvError};

fn lock_key(domain: &str, principal: &PrincipalKey) -> String {
    format!("lock:{}:{}", domain, principal)
}

/// Distributed lock manager backed by the shared expiring store.
#[derive(Debug, Clone)]
pub struct LockManager<S> {
    store: S,
}

impl<S: KeyValueStore> LockManager<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Atomically take the `(domain, principal)` lease with the given expiry.
    ///
    /// Returns whether this call created the lock. `false` means another
    /// holder's lease is still live. Store failure is a hard error: callers
    /// must treat it as "cannot admit", never as a free pass.
    #[instrument(skip(self), fields(domain = %domain, principal = %principal), err)]
    pub async fn acquire(
        &self,
        domain: &str,
        principal: &PrincipalKey,
        ttl: Duration,
    ) -> Result<bool, KvError> {
        let key = lock_key(domain, principal);
        // The value is informational only; presence of the key is the lock.
        let acquired_at = Utc::now().to_rfc3339();

        let created = self.store.put_if_absent(&key, &acquired_at, ttl).await?;
        debug!(created, "lock acquisition attempted");
        Ok(created)
    }

    /// Unconditionally drop the lease. A no-op on an absent lock.
    #[instrument(skip(self), fields(domain = %domain, principal = %principal), err)]
    pub async fn release(&self, domain: &str, principal: &PrincipalKey) -> Result<(), KvError> {
        self.store.remove(&lock_key(domain, principal)).await
    }
}
