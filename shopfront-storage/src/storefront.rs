//! Storefront facade.
//!
//! Owns one coordinator per entity family, all sharing the same relational
//! catalog and key-value store. Dependencies are passed in; nothing here
//! reaches for a global connection.

use shopfront_core::{CacheConfig, EntityFamily, ShopResult};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{
    CartCache, CartFamily, CategoryCache, CategoryFamily, KeyValueStore, MediaCache,
    MediaEnricher, MediaFamily, Passthrough, ProductTypeCache, ProductTypeFamily,
    SubcategoryCache, SubcategoryFamily, UserCache, UserFamily, WishlistCache, WishlistFamily,
};
use crate::relational::{AddressBook, RowSource};

/// Everything a storefront needs from the relational store.
pub trait Catalog:
    RowSource<CategoryFamily>
    + RowSource<SubcategoryFamily>
    + RowSource<ProductTypeFamily>
    + RowSource<MediaFamily>
    + RowSource<UserFamily>
    + RowSource<CartFamily>
    + RowSource<WishlistFamily>
    + AddressBook
{
}

impl<T> Catalog for T where
    T: RowSource<CategoryFamily>
        + RowSource<SubcategoryFamily>
        + RowSource<ProductTypeFamily>
        + RowSource<MediaFamily>
        + RowSource<UserFamily>
        + RowSource<CartFamily>
        + RowSource<WishlistFamily>
        + AddressBook
{
}

/// Per-family cache coordinators over one catalog and one store.
pub struct Storefront<S: Catalog, K: KeyValueStore> {
    catalog: Arc<S>,
    store: Arc<K>,
    categories: CategoryCache<S, K>,
    subcategories: SubcategoryCache<S, K>,
    product_types: ProductTypeCache<S, K>,
    media: Arc<MediaCache<S, K>>,
    users: UserCache<S, K>,
    carts: CartCache<S, K>,
    wishlists: WishlistCache<S, K>,
}

impl<S: Catalog, K: KeyValueStore> Storefront<S, K> {
    /// Wire every family. Cart and wishlist rows are enriched through the
    /// media coordinator, so their media lookups hit the cache first.
    pub fn new(catalog: Arc<S>, store: Arc<K>, config: &CacheConfig) -> ShopResult<Self> {
        config.validate()?;
        let ttl = |family: EntityFamily| -> Duration { config.ttl_for(family) };

        let media = Arc::new(MediaCache::new(
            catalog.clone(),
            store.clone(),
            Arc::new(Passthrough),
            ttl(EntityFamily::MediaItem),
        ));
        let enricher = Arc::new(MediaEnricher::new(media.clone()));

        tracing::info!(
            cart_ttl_secs = ttl(EntityFamily::Cart).as_secs(),
            "storefront caches wired"
        );

        Ok(Self {
            categories: CategoryCache::new(
                catalog.clone(),
                store.clone(),
                Arc::new(Passthrough),
                ttl(EntityFamily::Category),
            ),
            subcategories: SubcategoryCache::new(
                catalog.clone(),
                store.clone(),
                Arc::new(Passthrough),
                ttl(EntityFamily::Subcategory),
            ),
            product_types: ProductTypeCache::new(
                catalog.clone(),
                store.clone(),
                Arc::new(Passthrough),
                ttl(EntityFamily::ProductType),
            ),
            users: UserCache::new(
                catalog.clone(),
                store.clone(),
                Arc::new(Passthrough),
                ttl(EntityFamily::User),
            ),
            carts: CartCache::new(
                catalog.clone(),
                store.clone(),
                enricher.clone(),
                ttl(EntityFamily::Cart),
            ),
            wishlists: WishlistCache::new(
                catalog.clone(),
                store.clone(),
                enricher,
                ttl(EntityFamily::Wishlist),
            ),
            media,
            catalog,
            store,
        })
    }

    pub fn categories(&self) -> &CategoryCache<S, K> {
        &self.categories
    }

    pub fn subcategories(&self) -> &SubcategoryCache<S, K> {
        &self.subcategories
    }

    pub fn product_types(&self) -> &ProductTypeCache<S, K> {
        &self.product_types
    }

    pub fn media(&self) -> &MediaCache<S, K> {
        &self.media
    }

    pub fn users(&self) -> &UserCache<S, K> {
        &self.users
    }

    pub fn carts(&self) -> &CartCache<S, K> {
        &self.carts
    }

    pub fn wishlists(&self) -> &WishlistCache<S, K> {
        &self.wishlists
    }

    /// Addresses are never cached; reads and writes go straight through.
    pub fn addresses(&self) -> &S {
        &self.catalog
    }

    pub fn catalog(&self) -> &Arc<S> {
        &self.catalog
    }

    pub fn store(&self) -> &Arc<K> {
        &self.store
    }
}
