//! In-process key-value store.
//!
//! A `DashMap`-backed [`KeyValueStore`] with lazy expiry. It counts every
//! operation, so tests can assert how the coordinator talks to its store.

use async_trait::async_trait;
use dashmap::DashMap;
use shopfront_core::ShopResult;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::key::CacheKey;
use super::traits::{CacheStats, KeyValueStore};

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Number of calls made per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCalls {
    pub get: u64,
    pub mget: u64,
    pub set: u64,
    pub set_many: u64,
    pub del: u64,
    pub keys: u64,
}

impl StoreCalls {
    /// Calls that wrote or deleted anything.
    pub fn mutations(&self) -> u64 {
        self.set + self.set_many + self.del
    }
}

#[derive(Debug, Default)]
struct Counters {
    get: AtomicU64,
    mget: AtomicU64,
    set: AtomicU64,
    set_many: AtomicU64,
    del: AtomicU64,
    keys: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    written: AtomicU64,
    deleted: AtomicU64,
}

/// In-memory key-value store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: DashMap<String, Entry>,
    counters: Counters,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of per-operation call counts.
    pub fn calls(&self) -> StoreCalls {
        StoreCalls {
            get: self.counters.get.load(Ordering::Relaxed),
            mget: self.counters.mget.load(Ordering::Relaxed),
            set: self.counters.set.load(Ordering::Relaxed),
            set_many: self.counters.set_many.load(Ordering::Relaxed),
            del: self.counters.del.load(Ordering::Relaxed),
            keys: self.counters.keys.load(Ordering::Relaxed),
        }
    }

    /// Write raw bytes without expiry or counting, for seeding tests.
    pub fn insert_raw(&self, key: &CacheKey, value: impl Into<Vec<u8>>) {
        self.entries.insert(
            key.as_str().to_string(),
            Entry {
                value: value.into(),
                expires_at: None,
            },
        );
    }

    /// Remaining time to live of a key, `None` if absent or persistent.
    pub fn ttl(&self, key: &CacheKey) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .get(key.as_str())
            .filter(|e| e.is_live(now))
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self, key: &CacheKey, now: Instant) -> Option<Vec<u8>> {
        // Release the shard guard before any removal.
        let lookup = self
            .entries
            .get(key.as_str())
            .map(|entry| entry.is_live(now).then(|| entry.value.clone()));
        let value = match lookup {
            Some(Some(value)) => Some(value),
            Some(None) => {
                self.entries
                    .remove_if(key.as_str(), |_, entry| !entry.is_live(now));
                None
            }
            None => None,
        };
        let counter = if value.is_some() {
            &self.counters.hits
        } else {
            &self.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        value
    }

    fn write(&self, key: &CacheKey, value: Vec<u8>, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .insert(key.as_str().to_string(), Entry { value, expires_at });
        self.counters.written.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &CacheKey) -> ShopResult<Option<Vec<u8>>> {
        self.counters.get.fetch_add(1, Ordering::Relaxed);
        Ok(self.read(key, Instant::now()))
    }

    async fn mget(&self, keys: &[CacheKey]) -> ShopResult<Vec<Option<Vec<u8>>>> {
        self.counters.mget.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        Ok(keys.iter().map(|key| self.read(key, now)).collect())
    }

    async fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: Option<Duration>) -> ShopResult<()> {
        self.counters.set.fetch_add(1, Ordering::Relaxed);
        self.write(key, value, ttl);
        Ok(())
    }

    async fn set_many(
        &self,
        entries: Vec<(CacheKey, Vec<u8>)>,
        ttl: Option<Duration>,
    ) -> ShopResult<()> {
        self.counters.set_many.fetch_add(1, Ordering::Relaxed);
        for (key, value) in entries {
            self.write(&key, value, ttl);
        }
        Ok(())
    }

    async fn del(&self, keys: &[CacheKey]) -> ShopResult<u64> {
        self.counters.del.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        let deleted = keys
            .iter()
            .filter_map(|key| self.entries.remove(key.as_str()))
            .filter(|(_, entry)| entry.is_live(now))
            .count() as u64;
        self.counters.deleted.fetch_add(deleted, Ordering::Relaxed);
        Ok(deleted)
    }

    async fn keys(&self, pattern: &CacheKey) -> ShopResult<Vec<CacheKey>> {
        self.counters.keys.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        let mut keys: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|entry| entry.value().is_live(now))
            .filter(|entry| super::key::glob_match(pattern.as_str(), entry.key()))
            .map(|entry| CacheKey::from_raw_unchecked(entry.key().clone()))
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn stats(&self) -> ShopResult<CacheStats> {
        Ok(CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            writes: self.counters.written.load(Ordering::Relaxed),
            deletes: self.counters.deleted.load(Ordering::Relaxed),
            enumerations: self.counters.keys.load(Ordering::Relaxed),
            entry_count: Some(self.len() as u64),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::KeyPart;
    use shopfront_core::EntityFamily;

    fn cart_key(user: &str, product: &str) -> CacheKey {
        CacheKey::composite(
            EntityFamily::Cart,
            &[KeyPart::value(user), KeyPart::value(product), KeyPart::Absent],
        )
    }

    #[tokio::test]
    async fn test_set_get_del() {
        let store = InMemoryStore::new();
        let key = CacheKey::simple(EntityFamily::Category, "a");
        store.set(&key, b"1".to_vec(), None).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.del(&[key.clone()]).await.unwrap(), 1);
        assert_eq!(store.get(&key).await.unwrap(), None);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[tokio::test]
    async fn test_keys_respects_scope() {
        let store = InMemoryStore::new();
        store.insert_raw(&cart_key("u1", "p1"), "x");
        store.insert_raw(&cart_key("u1", "p2"), "x");
        store.insert_raw(&cart_key("u2", "p1"), "x");
        store.insert_raw(&CacheKey::simple(EntityFamily::Category, "c"), "x");

        let pattern = CacheKey::composite(EntityFamily::Cart, &[KeyPart::value("u1")]);
        let keys = store.keys(&pattern).await.unwrap();
        assert_eq!(keys, vec![cart_key("u1", "p1"), cart_key("u1", "p2")]);
    }

    #[tokio::test]
    async fn test_expired_entries_are_invisible() {
        let store = InMemoryStore::new();
        let key = CacheKey::simple(EntityFamily::MediaItem, "m");
        store
            .set(&key, b"v".to_vec(), Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.get(&key).await.unwrap(), None);
        assert!(store
            .keys(&CacheKey::family_pattern(EntityFamily::MediaItem))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_mget_is_positional() {
        let store = InMemoryStore::new();
        let a = CacheKey::simple(EntityFamily::User, "a");
        let b = CacheKey::simple(EntityFamily::User, "b");
        store.insert_raw(&b, "B");
        let values = store.mget(&[a, b]).await.unwrap();
        assert_eq!(values, vec![None, Some(b"B".to_vec())]);
        assert_eq!(store.calls().mget, 1);
    }

    #[tokio::test]
    async fn test_ttl_is_recorded() {
        let store = InMemoryStore::new();
        let key = CacheKey::simple(EntityFamily::User, "a");
        store
            .set(&key, b"v".to_vec(), Some(Duration::from_secs(60)))
            .await
            .unwrap();
        let ttl = store.ttl(&key).unwrap();
        assert!(ttl > Duration::from_secs(59) && ttl <= Duration::from_secs(60));
    }
}
