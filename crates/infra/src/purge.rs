//! Dependent-data purge targets.
//!
//! Each target owns one dependent store (generated documents, conversation
//! histories) and can bulk-delete everything a principal owns. Purges must be
//! idempotent: a crash between purging and marking the account complete means
//! the next sweep run repeats the purge against already-deleted data.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use docflow_core::PrincipalKey;

/// Purge operation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PurgeError {
    #[error("purge storage error: {0}")]
    Storage(String),
}

/// Per-principal bulk delete against one dependent store.
#[async_trait]
pub trait PurgeTarget: Send + Sync {
    /// Stable name for logging.
    fn name(&self) -> &str;

    /// Delete everything the principal owns in this store. Idempotent:
    /// deleting nothing is success, not an error.
    async fn purge(&self, principal: &PrincipalKey) -> Result<(), PurgeError>;
}

/// Generated documents owned by a principal (Postgres).
#[derive(Debug, Clone)]
pub struct PgGeneratedDocuments {
    pool: Arc<PgPool>,
}

impl PgGeneratedDocuments {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl PurgeTarget for PgGeneratedDocuments {
    fn name(&self) -> &str {
        "generated_documents"
    }

    #[instrument(skip(self), fields(target = self.name(), principal = %principal), err)]
    async fn purge(&self, principal: &PrincipalKey) -> Result<(), PurgeError> {
        sqlx::query("DELETE FROM generated_documents WHERE owner = $1")
            .bind(principal.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| PurgeError::Storage(format!("delete generated_documents: {}", e)))?;
        Ok(())
    }
}

/// Conversation histories owned by a principal (Postgres).
#[derive(Debug, Clone)]
pub struct PgConversationHistory {
    pool: Arc<PgPool>,
}

impl PgConversationHistory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl PurgeTarget for PgConversationHistory {
    fn name(&self) -> &str {
        "conversation_history"
    }

    #[instrument(skip(self), fields(target = self.name(), principal = %principal), err)]
    async fn purge(&self, principal: &PrincipalKey) -> Result<(), PurgeError> {
        sqlx::query("DELETE FROM conversations WHERE owner = $1")
            .bind(principal.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| PurgeError::Storage(format!("delete conversations: {}", e)))?;
        Ok(())
    }
}

/// In-memory purge target for tests/dev, with per-principal failure
/// injection to exercise the sweep's isolation guarantees.
#[derive(Debug)]
pub struct InMemoryPurgeTarget {
    name: String,
    records: RwLock<HashMap<String, Vec<String>>>,
    fail_for: RwLock<HashSet<String>>,
}

impl InMemoryPurgeTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: RwLock::new(HashMap::new()),
            fail_for: RwLock::new(HashSet::new()),
        }
    }

    pub fn arc(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(name))
    }

    /// Seed a record owned by the principal.
    pub fn insert(&self, principal: &PrincipalKey, record: impl Into<String>) {
        let mut records = self.records.write().unwrap();
        records
            .entry(principal.as_str().to_string())
            .or_default()
            .push(record.into());
    }

    /// Make purges for this principal fail until cleared.
    pub fn fail_for(&self, principal: &PrincipalKey) {
        self.fail_for
            .write()
            .unwrap()
            .insert(principal.as_str().to_string());
    }

    pub fn clear_failures(&self) {
        self.fail_for.write().unwrap().clear();
    }

    pub fn count(&self, principal: &PrincipalKey) -> usize {
        self.records
            .read()
            .unwrap()
            .get(principal.as_str())
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl PurgeTarget for InMemoryPurgeTarget {
    fn name(&self) -> &str {
        &self.name
    }

    async fn purge(&self, principal: &PrincipalKey) -> Result<(), PurgeError> {
        if self.fail_for.read().unwrap().contains(principal.as_str()) {
            return Err(PurgeError::Storage(format!(
                "{}: purge failed (injected)",
                self.name
            )));
        }

        let mut records = self.records.write().unwrap();
        // Removing an absent principal is the idempotent-repeat case.
        records.remove(principal.as_str());
        Ok(())
    }
}
