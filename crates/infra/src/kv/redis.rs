//! Redis-backed expiring key-value store.
//!
//! Locks and job status records share this store in production. The
//! create-if-absent primitive maps to a single `SET .. NX EX ..`, so mutual
//! exclusion holds across independent processes without any in-process
//! coordination.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::instrument;

use super::{KeyValueStore, KvError};

#[derive(Debug, Clone)]
pub struct RedisKeyValueStore {
    client: Arc<redis::Client>,
}

impl RedisKeyValueStore {
    /// Create a new store client.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, KvError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| KvError::Connection(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection, KvError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| KvError::Connection(e.to_string()))
    }
}

/// Redis EX takes whole seconds; never round a positive TTL down to zero.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl KeyValueStore for RedisKeyValueStore {
    #[instrument(skip(self, value), fields(key = %key), err)]
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        let mut conn = self.conn().await?;

        let _: String = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| KvError::Command(format!("SET failed: {}", e)))?;

        Ok(())
    }

    #[instrument(skip(self, value), fields(key = %key), err)]
    async fn put_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, KvError> {
        let mut conn = self.conn().await?;

        // SET NX EX is the atomic create-if-absent-with-expiry primitive;
        // Redis replies OK on create and Nil when the key already exists.
        let created: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| KvError::Command(format!("SET NX failed: {}", e)))?;

        Ok(created.is_some())
    }

    #[instrument(skip(self), fields(key = %key), err)]
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut conn = self.conn().await?;

        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| KvError::Command(format!("GET failed: {}", e)))?;

        Ok(value)
    }

    #[instrument(skip(self), fields(key = %key), err)]
    async fn remove(&self, key: &str) -> Result<(), KvError> {
        let mut conn = self.conn().await?;

        let _: u64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| KvError::Command(format!("DEL failed: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_never_truncates_to_zero() {
        assert_eq!(ttl_secs(Duration::from_millis(200)), 1);
        assert_eq!(ttl_secs(Duration::from_secs(600)), 600);
    }
}
