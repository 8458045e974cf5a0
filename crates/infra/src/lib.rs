//! Infrastructure layer: shared expiring store, locks, queue, directory.
//!
//! Every adapter here comes in pairs: a production backend (Redis/Postgres)
//! and an in-memory implementation for tests and local development. All
//! cross-request coordination flows through these adapters; nothing in this
//! workspace coordinates through in-process shared memory.

pub mod directory;
pub mod kv;
pub mod lock;
pub mod purge;
pub mod queue;
pub mod status;

pub use directory::postgres::PgAccountDirectory;
pub use directory::{AccountDirectory, DirectoryError, InMemoryAccountDirectory};
pub use kv::{InMemoryKeyValueStore, KeyValueStore, KvError};
pub use lock::LockManager;
pub use purge::{
    InMemoryPurgeTarget, PgConversationHistory, PgGeneratedDocuments, PurgeError, PurgeTarget,
};
pub use queue::{InMemoryJobQueue, JobQueue, QueueDepth, QueueError};
pub use status::{JobStatusStore, StatusError};

#[cfg(feature = "redis")]
pub use kv::redis::RedisKeyValueStore;
#[cfg(feature = "redis")]
pub use queue::redis_streams::RedisStreamsJobQueue;
