//! Shopfront Storage - Cache-Aside Consistency Layer
//!
//! Keeps a key-value cache of storefront entities consistent with the
//! relational store that owns them. The relational side is abstracted by the
//! traits in [`relational`]; the Postgres implementation lives in
//! shopfront-db.

pub mod cache;
pub mod memory_catalog;
pub mod relational;
pub mod storefront;

pub use cache::{
    CacheCoordinator, CacheFamily, CacheKey, CacheStats, CartCache, CartFamily, CartLineKey,
    CategoryCache, CategoryFamily, Codec, InMemoryStore, Invalidation, JsonCodec, KeyPart,
    KeyValueStore, Materializer, MediaBearing, MediaCache, MediaEnricher, MediaFamily,
    MediaResolver, MsgPackCodec, Passthrough, ProductTypeCache, ProductTypeFamily,
    RedisCacheError, RedisConfig, RedisStore, SchemaCodec, Staleness, SubcategoryCache,
    SubcategoryFamily, UserCache, UserFamily, WishlistCache, WishlistFamily, WishlistKey,
};
pub use memory_catalog::{MemoryCatalog, SourceOp};
pub use relational::{AddressBook, RowSource, RowUpdater, RowWriter};
pub use storefront::{Catalog, Storefront};
