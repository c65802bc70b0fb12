//! Core traits for the cache layer.

use async_trait::async_trait;
use shopfront_core::{EntityFamily, Schema, ShopResult};
use std::fmt::Debug;
use std::time::Duration;

use super::key::{CacheKey, KeyPart};

/// Key-value store the cache layer writes through.
///
/// Implementations propagate connectivity failures unchanged; there is no
/// fallback mode at this layer.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Read one key.
    async fn get(&self, key: &CacheKey) -> ShopResult<Option<Vec<u8>>>;

    /// Read many keys in one round trip. The result is positionally aligned
    /// with `keys`.
    async fn mget(&self, keys: &[CacheKey]) -> ShopResult<Vec<Option<Vec<u8>>>>;

    /// Write one key, optionally with an expiration.
    async fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: Option<Duration>) -> ShopResult<()>;

    /// Write many keys in one pipelined round trip.
    async fn set_many(
        &self,
        entries: Vec<(CacheKey, Vec<u8>)>,
        ttl: Option<Duration>,
    ) -> ShopResult<()>;

    /// Delete keys, returning how many existed.
    async fn del(&self, keys: &[CacheKey]) -> ShopResult<u64>;

    /// Enumerate every key matching `pattern`.
    async fn keys(&self, pattern: &CacheKey) -> ShopResult<Vec<CacheKey>>;

    /// Get store statistics.
    async fn stats(&self) -> ShopResult<CacheStats>;
}

/// Store statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Keys read that were present.
    pub hits: u64,
    /// Keys read that were absent.
    pub misses: u64,
    /// Keys written.
    pub writes: u64,
    /// Keys deleted.
    pub deletes: u64,
    /// Pattern enumerations performed.
    pub enumerations: u64,
    /// Current number of live entries, when the store can tell cheaply.
    pub entry_count: Option<u64>,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// How a family is invalidated after a relational mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation {
    /// Delete exactly the mutated entity's key.
    Targeted,
    /// Delete every key in the mutated entity's scope.
    ScopeWide,
}

/// Static description of one cached entity family.
///
/// A family ties together the relational row shape, the cached shape, the
/// identity tuple that keys an entry and the scope that bounds enumeration.
pub trait CacheFamily: Send + Sync + 'static {
    const FAMILY: EntityFamily;
    const INVALIDATION: Invalidation;

    /// Shape returned by the relational provider.
    type Row: Send + Sync + 'static;
    /// Shape stored in and served from the cache.
    type Entity: Schema + Clone + Send + Sync + 'static;
    /// Concrete identity of a single entry.
    type Identity: Clone + Debug + Send + Sync + 'static;
    /// Enumeration scope; `()` for global families.
    type Scope: Clone + Debug + Send + Sync + 'static;

    /// Concrete components of an identity, in key order.
    fn identity_parts(identity: &Self::Identity) -> Vec<KeyPart>;

    /// Components of a scope; positions outside the scope are left off and
    /// render as wildcards.
    fn scope_parts(scope: &Self::Scope) -> Vec<KeyPart>;

    fn identity_of(entity: &Self::Entity) -> Self::Identity;

    fn row_identity(row: &Self::Row) -> Self::Identity;

    fn scope_of(identity: &Self::Identity) -> Self::Scope;

    /// Key for one entry.
    fn key(identity: &Self::Identity) -> CacheKey {
        CacheKey::new(Self::FAMILY, &Self::identity_parts(identity))
    }

    /// Enumeration pattern for a scope.
    fn pattern(scope: &Self::Scope) -> CacheKey {
        CacheKey::new(Self::FAMILY, &Self::scope_parts(scope))
    }
}
