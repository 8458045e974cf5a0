//! Redis Streams-backed job queue (durable, at-least-once delivery).
//!
//! This implementation uses Redis Streams (XADD/XREADGROUP) to provide:
//! - **Durable delivery**: Entries persist until a worker acknowledges them
//! - **Worker registration**: The worker pool consumes through a consumer
//!   group; registered consumers double as the liveness signal
//! - **Idempotent acceptance**: Streams have no native idempotent-id
//!   support, so a `SET NX EX` marker per job id suppresses duplicates
//! - **No history**: Workers XACK + XDEL on terminal processing, so the
//!   stream holds only not-yet-terminal entries
//!
//! ## Architecture
//!
//! - **Stream Key**: `docflow:jobs` (single stream for all jobs)
//! - **Consumer Group**: `workers` (the external worker pool)
//! - **Dedup Markers**: `docflow:jobs:id:{job_id}`, expiring alongside the
//!   job's status record
//!
//! Entries are delivered once: workers never XCLAIM stale pending entries,
//! which is the stream rendition of "single delivery attempt, no retry".

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use docflow_core::QueueEntry;

use super::{JobQueue, QueueDepth, QueueError};

/// Default stream key for job entries
const DEFAULT_STREAM_KEY: &str = "docflow:jobs";

/// Default consumer group the worker pool registers against
const DEFAULT_WORKER_GROUP: &str = "workers";

/// Default expiry for idempotency markers (matches the status record TTL)
const DEFAULT_DEDUP_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct RedisStreamsJobQueue {
    client: Arc<redis::Client>,
    stream_key: String,
    worker_group: String,
    dedup_ttl: Duration,
}

impl RedisStreamsJobQueue {
    /// Create a new Redis Streams job queue.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    /// * `stream_key` - Redis stream key (default: "docflow:jobs")
    /// * `worker_group` - Worker consumer group name (default: "workers")
    pub fn new(
        redis_url: impl AsRef<str>,
        stream_key: Option<String>,
        worker_group: Option<String>,
    ) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| QueueError::Connection(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            stream_key: stream_key.unwrap_or_else(|| DEFAULT_STREAM_KEY.to_string()),
            worker_group: worker_group.unwrap_or_else(|| DEFAULT_WORKER_GROUP.to_string()),
            dedup_ttl: DEFAULT_DEDUP_TTL,
        })
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection, QueueError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))
    }

    /// Ensure the worker consumer group exists (idempotent).
    ///
    /// XGROUP CREATE with MKSTREAM creates the stream if it doesn't exist.
    /// If the group already exists, Redis returns an error, which we ignore.
    pub async fn ensure_worker_group(&self) -> Result<(), QueueError> {
        let mut conn = self.conn().await?;

        let _: Result<String, _> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.stream_key)
            .arg(&self.worker_group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        Ok(())
    }

    fn dedup_key(&self, job_id: &str) -> String {
        format!("{}:id:{}", self.stream_key, job_id)
    }
}

/// Whether a Redis error means the consumer group doesn't exist yet.
///
/// Before the first worker registers there is no group, which reads as
/// "zero workers, zero pending", not as a fault.
fn is_no_group(e: &redis::RedisError) -> bool {
    e.to_string().contains("NOGROUP")
}

#[async_trait]
impl JobQueue for RedisStreamsJobQueue {
    #[instrument(skip(self), fields(stream_key = %self.stream_key), err)]
    async fn worker_count(&self) -> Result<u32, QueueError> {
        let mut conn = self.conn().await?;

        // XINFO CONSUMERS lists the consumers registered in the group; each
        // array element is one registered worker.
        let consumers: Result<Vec<redis::Value>, redis::RedisError> = redis::cmd("XINFO")
            .arg("CONSUMERS")
            .arg(&self.stream_key)
            .arg(&self.worker_group)
            .query_async(&mut conn)
            .await;

        match consumers {
            Ok(list) => Ok(list.len() as u32),
            Err(e) if is_no_group(&e) => Ok(0),
            Err(e) => Err(QueueError::Command(format!("XINFO CONSUMERS failed: {}", e))),
        }
    }

    #[instrument(skip(self), fields(stream_key = %self.stream_key), err)]
    async fn depth(&self) -> Result<QueueDepth, QueueError> {
        let mut conn = self.conn().await?;

        // Workers XACK+XDEL terminal entries, so stream length approximates
        // queued + in-flight.
        let total: u64 = redis::cmd("XLEN")
            .arg(&self.stream_key)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Command(format!("XLEN failed: {}", e)))?;

        // XPENDING summary: [count, min-id, max-id, per-consumer counts]
        let pending: Result<redis::Value, redis::RedisError> = redis::cmd("XPENDING")
            .arg(&self.stream_key)
            .arg(&self.worker_group)
            .query_async(&mut conn)
            .await;

        let in_flight = match pending {
            Ok(redis::Value::Bulk(summary)) => match summary.first() {
                Some(redis::Value::Int(count)) => *count as u64,
                _ => 0,
            },
            Ok(_) => 0,
            Err(e) if is_no_group(&e) => 0,
            Err(e) => return Err(QueueError::Command(format!("XPENDING failed: {}", e))),
        };

        Ok(QueueDepth {
            queued: total.saturating_sub(in_flight),
            in_flight,
        })
    }

    #[instrument(
        skip(self, entry),
        fields(
            stream_key = %self.stream_key,
            job_id = %entry.job_id,
            principal = %entry.principal
        ),
        err
    )]
    async fn submit(&self, entry: QueueEntry) -> Result<(), QueueError> {
        let payload = serde_json::to_string(&entry)
            .map_err(|e| QueueError::Serialization(e.to_string()))?;

        let mut conn = self.conn().await?;

        // Idempotency marker first: only the call that creates it appends.
        let created: Option<String> = redis::cmd("SET")
            .arg(self.dedup_key(entry.job_id.as_str()))
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(self.dedup_ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Command(format!("SET NX failed: {}", e)))?;

        if created.is_none() {
            debug!(job_id = %entry.job_id, "duplicate submission dropped");
            return Ok(());
        }

        let _: String = redis::cmd("XADD")
            .arg(&self.stream_key)
            .arg("*") // Auto-generate entry ID
            .arg("job_id")
            .arg(entry.job_id.as_str())
            .arg("principal")
            .arg(entry.principal.as_str())
            .arg("payload")
            .arg(&payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Command(format!("XADD failed: {}", e)))?;

        Ok(())
    }
}
