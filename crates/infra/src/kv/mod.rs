//! Shared expiring key-value store.
//!
//! The single shared mutable resource in the system: job status records and
//! per-principal locks both live here. The store must provide atomic
//! create-if-absent-with-expiry, the sole synchronization primitive the
//! admission path relies on.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;

#[cfg(feature = "redis")]
pub mod redis;

/// Key-value store operation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum KvError {
    #[error("store connection error: {0}")]
    Connection(String),

    #[error("store command error: {0}")]
    Command(String),
}

/// Expiring key-value store abstraction.
///
/// An expired key is indistinguishable from one that never existed; callers
/// must not read meaning into absence beyond "unknown".
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Unconditional write with expiry.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError>;

    /// Atomically create the key only if absent, with expiry.
    ///
    /// Returns whether this call was the one that created it. Must be a
    /// single atomic operation against the store, never an existence check
    /// followed by a write.
    async fn put_if_absent(&self, key: &str, value: &str, ttl: Duration)
        -> Result<bool, KvError>;

    /// Read a key. Absent and expired both return `None`.
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Unconditional delete; a no-op on a missing key.
    async fn remove(&self, key: &str) -> Result<(), KvError>;
}

#[async_trait]
impl<S> KeyValueStore for Arc<S>
where
    S: KeyValueStore + ?Sized,
{
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        (**self).put(key, value, ttl).await
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, KvError> {
        (**self).put_if_absent(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        (**self).get(key).await
    }

    async fn remove(&self, key: &str) -> Result<(), KvError> {
        (**self).remove(key).await
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-memory expiring store for tests/dev.
///
/// Expiry is lazy: entries are dropped when a later operation observes them
/// past their deadline, which is enough to make absent and expired
/// indistinguishable to callers.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    inner: RwLock<HashMap<String, Entry>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let map = self.inner.read().unwrap();
        map.values().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        let mut map = self.inner.write().unwrap();
        map.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, KvError> {
        let now = Instant::now();
        let mut map = self.inner.write().unwrap();

        if let Some(existing) = map.get(key) {
            if !existing.is_expired(now) {
                return Ok(false);
            }
        }

        map.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let now = Instant::now();

        {
            let map = self.inner.read().unwrap();
            match map.get(key) {
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Drop the expired entry so it doesn't linger.
        let mut map = self.inner.write().unwrap();
        if map.get(key).is_some_and(|e| e.is_expired(now)) {
            map.remove(key);
        }
        Ok(None)
    }

    async fn remove(&self, key: &str) -> Result<(), KvError> {
        let mut map = self.inner.write().unwrap();
        map.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn put_if_absent_is_first_writer_wins() {
        let store = InMemoryKeyValueStore::new();

        assert!(store.put_if_absent("k", "first", TTL).await.unwrap());
        assert!(!store.put_if_absent("k", "second", TTL).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent() {
        let store = InMemoryKeyValueStore::new();

        store.put("k", "v", Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;

        assert_eq!(store.get("k").await.unwrap(), None);
        // Expiry frees the key for a fresh create.
        assert!(store.put_if_absent("k", "again", TTL).await.unwrap());
    }

    #[tokio::test]
    async fn remove_is_noop_on_missing_key() {
        let store = InMemoryKeyValueStore::new();

        store.remove("missing").await.unwrap();
        store.put("k", "v", TTL).await.unwrap();
        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Put(u8, String),
        PutIfAbsent(u8, String),
        Remove(u8),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..8, "[a-z]{1,8}").prop_map(|(k, v)| Op::Put(k, v)),
            (0u8..8, "[a-z]{1,8}").prop_map(|(k, v)| Op::PutIfAbsent(k, v)),
            (0u8..8).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: with no expiry in play, the store agrees with a plain
        /// map model under any interleaving of put/put_if_absent/remove.
        #[test]
        fn store_matches_map_model(ops in prop::collection::vec(op_strategy(), 1..40)) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();

            rt.block_on(async {
                let store = InMemoryKeyValueStore::new();
                let mut model: HashMap<u8, String> = HashMap::new();

                for op in ops {
                    match op {
                        Op::Put(k, v) => {
                            store.put(&k.to_string(), &v, TTL).await.unwrap();
                            model.insert(k, v);
                        }
                        Op::PutIfAbsent(k, v) => {
                            let created =
                                store.put_if_absent(&k.to_string(), &v, TTL).await.unwrap();
                            assert_eq!(created, !model.contains_key(&k));
                            model.entry(k).or_insert(v);
                        }
                        Op::Remove(k) => {
                            store.remove(&k.to_string()).await.unwrap();
                            model.remove(&k);
                        }
                    }
                }

                for (k, v) in &model {
                    assert_eq!(store.get(&k.to_string()).await.unwrap().as_deref(), Some(v.as_str()));
                }
            });
        }
    }
}
