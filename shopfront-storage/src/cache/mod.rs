//! Cache-aside layer over a key-value store.
//!
//! The relational store is authoritative; the key-value store holds validated,
//! denormalized snapshots of it. Each entity family gets a
//! [`CacheCoordinator`] that:
//!
//! - keys entries deterministically from identity tuples ([`CacheKey`])
//! - trusts a scope's cached collection only while its key count matches the
//!   relational row count ([`Staleness`]), rebuilding it wholesale otherwise
//! - resolves media references in one batched lookup before caching product
//!   bearing rows ([`enrich`])
//! - checks every value against its schema on the way in and the way out
//!   ([`SchemaCodec`])
//!
//! # Example
//!
//! ```ignore
//! let store = Arc::new(RedisStore::connect(&RedisConfig::from_env()).await?);
//! let categories = CategoryCache::new(db.clone(), store.clone(), Arc::new(Passthrough), ttl);
//!
//! // Count check, then either one MGET or a full rebuild
//! let all = categories.scan_all().await?;
//!
//! // Mutations go to the database, then bust the cache
//! categories.create(NewCategory { .. }).await?;
//! ```

pub mod codec;
pub mod coordinator;
pub mod enrichment;
pub mod families;
pub mod key;
pub mod memory_backend;
pub mod redis_backend;
pub mod staleness;
pub mod traits;

pub use codec::{Codec, JsonCodec, MsgPackCodec, SchemaCodec};
pub use coordinator::{CacheCoordinator, Materializer, Passthrough};
pub use enrichment::{enrich, MediaBearing, MediaEnricher, MediaLookup, MediaResolver};
pub use families::{
    CartCache, CartFamily, CartLineKey, CategoryCache, CategoryFamily, MediaCache, MediaFamily,
    ProductTypeCache, ProductTypeFamily, SubcategoryCache, SubcategoryFamily, UserCache,
    UserFamily, WishlistCache, WishlistFamily, WishlistKey,
};
pub use key::{CacheKey, KeyPart, ABSENT, SEPARATOR, WILDCARD};
pub use memory_backend::{InMemoryStore, StoreCalls};
pub use redis_backend::{RedisCacheError, RedisConfig, RedisStore};
pub use staleness::{detect, Staleness};
pub use traits::{CacheFamily, CacheStats, Invalidation, KeyValueStore};
