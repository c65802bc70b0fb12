//! Generic cache-aside coordinator.
//!
//! One [`CacheCoordinator`] is instantiated per entity family. Reads go to the
//! store first and fall back to the relational source; collection reads are
//! guarded by the count-based [`Staleness`] check and rebuilt wholesale when it
//! fails. Writes never update cached values in place: mutations go to the
//! relational source and are followed by invalidation, and the next read
//! rebuilds.
//!
//! There is no single-flight guard. Concurrent readers of a cold or stale
//! scope may each rebuild it; the writes are identical so the result converges.

use async_trait::async_trait;
use shopfront_core::{Schema, ShopResult, Validate};
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::codec::{Codec, JsonCodec, SchemaCodec};
use super::key::CacheKey;
use super::staleness::{detect, Staleness};
use super::traits::{CacheFamily, Invalidation, KeyValueStore};
use crate::relational::{RowSource, RowUpdater, RowWriter};

/// Turns relational rows into cacheable entities.
///
/// This is the per-family strategy: plain families pass rows through, while
/// product-bearing families resolve media first.
#[async_trait]
pub trait Materializer<F: CacheFamily>: Send + Sync + 'static {
    async fn materialize(&self, rows: Vec<F::Row>) -> ShopResult<Vec<F::Entity>>;
}

/// Materializer for families whose row already is the cached shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

#[async_trait]
impl<F> Materializer<F> for Passthrough
where
    F: CacheFamily,
    F::Row: Into<F::Entity>,
{
    async fn materialize(&self, rows: Vec<F::Row>) -> ShopResult<Vec<F::Entity>> {
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Cache-aside coordinator for family `F`.
///
/// # Type Parameters
///
/// - `F`: The entity family
/// - `S`: The relational source
/// - `K`: The key-value store
/// - `C`: The byte codec for cached values
pub struct CacheCoordinator<F, S, K, C = JsonCodec>
where
    F: CacheFamily,
    S: RowSource<F>,
    K: KeyValueStore,
    C: Codec,
{
    source: Arc<S>,
    store: Arc<K>,
    materializer: Arc<dyn Materializer<F>>,
    codec: SchemaCodec<C>,
    ttl: Duration,
    _family: PhantomData<fn() -> F>,
}

impl<F, S, K> CacheCoordinator<F, S, K, JsonCodec>
where
    F: CacheFamily,
    S: RowSource<F>,
    K: KeyValueStore,
{
    /// Create a coordinator storing JSON values.
    pub fn new(
        source: Arc<S>,
        store: Arc<K>,
        materializer: Arc<dyn Materializer<F>>,
        ttl: Duration,
    ) -> Self {
        Self {
            source,
            store,
            materializer,
            codec: SchemaCodec::default(),
            ttl,
            _family: PhantomData,
        }
    }
}

impl<F, S, K, C> CacheCoordinator<F, S, K, C>
where
    F: CacheFamily,
    S: RowSource<F>,
    K: KeyValueStore,
    C: Codec,
{
    /// Swap the byte codec.
    pub fn with_codec<C2: Codec>(self, codec: C2) -> CacheCoordinator<F, S, K, C2> {
        CacheCoordinator {
            source: self.source,
            store: self.store,
            materializer: self.materializer,
            codec: SchemaCodec::new(codec),
            ttl: self.ttl,
            _family: PhantomData,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn store(&self) -> &K {
        &self.store
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Read one entity, falling back to the relational source on a miss or
    /// an unreadable cached value. `None` only when the source has no row.
    pub async fn get(&self, identity: &F::Identity) -> ShopResult<Option<F::Entity>> {
        let key = F::key(identity);
        if let Some(bytes) = self.store.get(&key).await? {
            if let Some(entity) = self.codec.decode_tolerant::<F::Entity>(&key, &bytes) {
                debug!(family = %F::FAMILY, key = %key, "Cache hit");
                return Ok(Some(entity));
            }
            // Unreadable; drop it so a missing row doesn't leave it behind
            self.store.del(std::slice::from_ref(&key)).await?;
        }

        debug!(family = %F::FAMILY, key = %key, "Cache miss");
        let Some(row) = RowSource::<F>::get(&*self.source, identity).await? else {
            return Ok(None);
        };
        let Some(entity) = self.materializer.materialize(vec![row]).await?.pop() else {
            return Ok(None);
        };
        self.add(&entity).await?;
        Ok(Some(entity))
    }

    /// Read a set of entities in one store round trip, fetching misses from
    /// the relational source in one batch and writing them through.
    ///
    /// Duplicate identities are collapsed. Identities unknown to the source
    /// are omitted, and so are source rows that fail their schema: they are
    /// never cached and read as absent. Output follows the first occurrence
    /// of each identity.
    pub async fn get_many(&self, identities: &[F::Identity]) -> ShopResult<Vec<F::Entity>> {
        let mut seen = HashSet::new();
        let unique: Vec<(CacheKey, &F::Identity)> = identities
            .iter()
            .map(|identity| (F::key(identity), identity))
            .filter(|(key, _)| seen.insert(key.clone()))
            .collect();
        if unique.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<CacheKey> = unique.iter().map(|(key, _)| key.clone()).collect();
        let values = self.store.mget(&keys).await?;

        let mut found: HashMap<CacheKey, F::Entity> = HashMap::with_capacity(unique.len());
        let mut missing = Vec::new();
        for ((key, identity), value) in unique.iter().zip(values) {
            match value.and_then(|bytes| self.codec.decode_tolerant::<F::Entity>(key, &bytes)) {
                Some(entity) => {
                    found.insert(key.clone(), entity);
                }
                None => missing.push((*identity).clone()),
            }
        }

        if !missing.is_empty() {
            debug!(family = %F::FAMILY, missing = missing.len(), "Fetching cache misses");
            let rows = RowSource::<F>::get_many(&*self.source, &missing).await?;
            let fetched: Vec<F::Entity> = self
                .materializer
                .materialize(rows)
                .await?
                .into_iter()
                .filter(|entity| match entity.check() {
                    Ok(()) => true,
                    Err(e) => {
                        let key = F::key(&F::identity_of(entity));
                        warn!(family = %F::FAMILY, key = %key, error = %e, "Skipping invalid row");
                        false
                    }
                })
                .collect();
            self.batch(&fetched).await?;
            for entity in fetched {
                found.insert(F::key(&F::identity_of(&entity)), entity);
            }
        }

        Ok(unique
            .into_iter()
            .filter_map(|(key, _)| found.remove(&key))
            .collect())
    }

    /// Read every entity in `scope`, rebuilding the scope when the cached key
    /// count disagrees with the relational row count.
    ///
    /// Output is ordered by cache key, so repeated scans of an unchanged
    /// scope return identical results whether served from the rebuild or from
    /// the store.
    pub async fn scan(&self, scope: &F::Scope) -> ShopResult<Vec<F::Entity>> {
        match detect::<F, S, K>(&*self.source, &*self.store, scope).await? {
            Staleness::Empty => Ok(Vec::new()),
            Staleness::Fresh { keys } => self.read_keys(keys).await,
            Staleness::Stale { rows, keys } => {
                info!(
                    family = %F::FAMILY,
                    scope = ?scope,
                    rows,
                    keys = keys.len(),
                    "Cache stale, rebuilding scope"
                );
                self.rebuild(scope, keys).await
            }
        }
    }

    /// Upsert one entity with the family expiration.
    pub async fn add(&self, entity: &F::Entity) -> ShopResult<()> {
        let key = F::key(&F::identity_of(entity));
        let bytes = self.codec.encode(entity)?;
        self.store.set(&key, bytes, Some(self.ttl)).await
    }

    /// Upsert many entities in one round trip. Every entity is checked before
    /// anything is written, so a single invalid entity aborts the whole batch.
    pub async fn batch(&self, entities: &[F::Entity]) -> ShopResult<usize> {
        let entries = entities
            .iter()
            .map(|entity| {
                let key = F::key(&F::identity_of(entity));
                self.codec.encode(entity).map(|bytes| (key, bytes))
            })
            .collect::<ShopResult<Vec<_>>>()?;
        if entries.is_empty() {
            return Ok(0);
        }
        let written = entries.len();
        self.store.set_many(entries, Some(self.ttl)).await?;
        Ok(written)
    }

    /// Delete the key of one concrete identity.
    pub async fn remove(&self, identity: &F::Identity) -> ShopResult<bool> {
        let key = F::key(identity);
        let deleted = self.store.del(std::slice::from_ref(&key)).await?;
        debug!(family = %F::FAMILY, key = %key, deleted, "Removed cache entry");
        Ok(deleted > 0)
    }

    /// Delete every key in `scope`.
    pub async fn drop(&self, scope: &F::Scope) -> ShopResult<u64> {
        let keys = self.store.keys(&F::pattern(scope)).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        let deleted = self.store.del(&keys).await?;
        debug!(family = %F::FAMILY, scope = ?scope, deleted, "Dropped cache scope");
        Ok(deleted)
    }

    /// Invalidate after a relational mutation of `identity`, using the
    /// family's invalidation policy.
    pub async fn invalidate(&self, identity: &F::Identity) -> ShopResult<()> {
        match F::INVALIDATION {
            Invalidation::Targeted => {
                self.remove(identity).await?;
            }
            Invalidation::ScopeWide => {
                self.drop(&F::scope_of(identity)).await?;
            }
        }
        Ok(())
    }

    async fn read_keys(&self, mut keys: Vec<CacheKey>) -> ShopResult<Vec<F::Entity>> {
        keys.sort();
        keys.dedup();
        let values = self.store.mget(&keys).await?;
        Ok(keys
            .iter()
            .zip(values)
            .filter_map(|(key, value)| {
                value.and_then(|bytes| self.codec.decode_tolerant::<F::Entity>(key, &bytes))
            })
            .collect())
    }

    async fn rebuild(
        &self,
        scope: &F::Scope,
        stale_keys: Vec<CacheKey>,
    ) -> ShopResult<Vec<F::Entity>> {
        // Drop before refetch so no half-stale key survives the rewrite.
        if !stale_keys.is_empty() {
            self.store.del(&stale_keys).await?;
        }

        let rows = RowSource::<F>::scan(&*self.source, scope).await?;
        let mut entities = self.materializer.materialize(rows).await?;
        entities.sort_by_cached_key(|entity| F::key(&F::identity_of(entity)));

        self.batch(&entities).await?;
        Ok(entities)
    }
}

impl<F, S, K, C> CacheCoordinator<F, S, K, C>
where
    F: CacheFamily<Scope = ()>,
    S: RowSource<F>,
    K: KeyValueStore,
    C: Codec,
{
    /// Scan a global family.
    pub async fn scan_all(&self) -> ShopResult<Vec<F::Entity>> {
        self.scan(&()).await
    }

    /// Drop every key of a global family.
    pub async fn drop_all(&self) -> ShopResult<u64> {
        self.drop(&()).await
    }
}

impl<F, S, K, C> CacheCoordinator<F, S, K, C>
where
    F: CacheFamily,
    S: RowWriter<F>,
    K: KeyValueStore,
    C: Codec,
{
    /// Check the input, insert relationally, then invalidate.
    pub async fn create(&self, input: S::Create) -> ShopResult<F::Row> {
        input.validate()?;
        let row = RowWriter::<F>::create(&*self.source, input).await?;
        self.invalidate(&F::row_identity(&row)).await?;
        Ok(row)
    }

    /// Delete relationally, then invalidate.
    pub async fn delete(&self, identity: &F::Identity) -> ShopResult<bool> {
        let deleted = RowWriter::<F>::delete(&*self.source, identity).await?;
        self.invalidate(identity).await?;
        Ok(deleted)
    }
}

impl<F, S, K, C> CacheCoordinator<F, S, K, C>
where
    F: CacheFamily,
    S: RowUpdater<F>,
    K: KeyValueStore,
    C: Codec,
{
    /// Check the patch, update relationally, then invalidate.
    pub async fn update(
        &self,
        identity: &F::Identity,
        patch: S::Update,
    ) -> ShopResult<Option<F::Row>> {
        patch.validate()?;
        let row = RowUpdater::<F>::update(&*self.source, identity, patch).await?;
        self.invalidate(identity).await?;
        Ok(row)
    }
}

impl<F, S, K, C> Clone for CacheCoordinator<F, S, K, C>
where
    F: CacheFamily,
    S: RowSource<F>,
    K: KeyValueStore,
    C: Codec,
{
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            store: Arc::clone(&self.store),
            materializer: Arc::clone(&self.materializer),
            codec: self.codec.clone(),
            ttl: self.ttl,
            _family: PhantomData,
        }
    }
}
