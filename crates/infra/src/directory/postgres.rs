//! Postgres-backed account directory.
//!
//! Expects an `accounts` table:
//!
//! ```sql
//! CREATE TABLE accounts (
//!     principal       TEXT PRIMARY KEY,
//!     state           TEXT NOT NULL,
//!     purge_completed BOOLEAN NOT NULL DEFAULT FALSE,
//!     hard_delete_at  TIMESTAMPTZ NOT NULL,
//!     updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```
//!
//! The deletion action (`state = 'deleted', purge_completed = FALSE`) and the
//! hard-delete expiry job are owned elsewhere; this adapter only reads
//! pending candidates and flips the completion flag.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;

use docflow_core::{AccountState, CleanupCandidate, PrincipalKey};

use super::{AccountDirectory, DirectoryError};

/// Postgres account directory.
#[derive(Debug, Clone)]
pub struct PgAccountDirectory {
    pool: Arc<PgPool>,
}

impl PgAccountDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

/// Map SQLx errors to DirectoryError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> DirectoryError {
    match err {
        sqlx::Error::Database(db_err) => DirectoryError::Storage(format!(
            "database error in {}: {}",
            operation,
            db_err.message()
        )),
        sqlx::Error::PoolClosed => {
            DirectoryError::Storage(format!("connection pool closed in {}", operation))
        }
        _ => DirectoryError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn candidate_from_row(row: &sqlx::postgres::PgRow) -> Result<CleanupCandidate, DirectoryError> {
    let principal: String = row
        .try_get("principal")
        .map_err(|e| DirectoryError::Storage(format!("failed to read principal: {}", e)))?;
    let state: String = row
        .try_get("state")
        .map_err(|e| DirectoryError::Storage(format!("failed to read state: {}", e)))?;
    let purge_completed: bool = row
        .try_get("purge_completed")
        .map_err(|e| DirectoryError::Storage(format!("failed to read purge_completed: {}", e)))?;
    let hard_delete_at: DateTime<Utc> = row
        .try_get("hard_delete_at")
        .map_err(|e| DirectoryError::Storage(format!("failed to read hard_delete_at: {}", e)))?;
    let updated_at: DateTime<Utc> = row
        .try_get("updated_at")
        .map_err(|e| DirectoryError::Storage(format!("failed to read updated_at: {}", e)))?;

    let state = match state.as_str() {
        "active" => AccountState::Active,
        "deleted" => AccountState::Deleted,
        other => {
            return Err(DirectoryError::Storage(format!(
                "unknown account state: {}",
                other
            )))
        }
    };

    Ok(CleanupCandidate {
        principal: PrincipalKey::from_str(&principal)
            .map_err(|e| DirectoryError::Storage(format!("invalid principal: {}", e)))?,
        state,
        purge_completed,
        hard_delete_at,
        updated_at,
    })
}

#[async_trait]
impl AccountDirectory for PgAccountDirectory {
    #[instrument(skip(self), err)]
    async fn fetch_pending_cleanup(
        &self,
        limit: usize,
    ) -> Result<Vec<CleanupCandidate>, DirectoryError> {
        let rows = sqlx::query(
            r#"
            SELECT principal, state, purge_completed, hard_delete_at, updated_at
            FROM accounts
            WHERE state = 'deleted' AND purge_completed = FALSE
            ORDER BY updated_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_pending_cleanup", e))?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in rows {
            candidates.push(candidate_from_row(&row)?);
        }
        Ok(candidates)
    }

    #[instrument(skip(self), fields(principal = %principal), err)]
    async fn mark_purge_complete(&self, principal: &PrincipalKey) -> Result<(), DirectoryError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET purge_completed = TRUE, updated_at = NOW()
            WHERE principal = $1
            "#,
        )
        .bind(principal.as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("mark_purge_complete", e))?;

        if result.rows_affected() == 0 {
            return Err(DirectoryError::NotFound(principal.clone()));
        }
        Ok(())
    }
}
