//! Production wiring of the [`Storefront`] over PostgreSQL and Redis.

use shopfront_core::{EntityFamily, ShopResult};
use shopfront_storage::{KeyValueStore, RedisStore, Storefront};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::config::ShopfrontConfig;
use crate::db::DbClient;

/// Entities served per family by one warm-up pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarmReport {
    pub entities: BTreeMap<EntityFamily, usize>,
}

impl WarmReport {
    pub fn total(&self) -> usize {
        self.entities.values().sum()
    }

    fn record(&mut self, family: EntityFamily, count: usize) {
        *self.entities.entry(family).or_default() += count;
    }
}

/// The storefront with its connections. Owns the lifecycle: [`connect`]
/// opens both stores and brings the schema up to date, [`close`] releases
/// them.
///
/// [`connect`]: StorefrontServices::connect
/// [`close`]: StorefrontServices::close
pub struct StorefrontServices {
    storefront: Storefront<DbClient, RedisStore>,
    db: Arc<DbClient>,
    cache: Arc<RedisStore>,
}

impl StorefrontServices {
    pub async fn connect(config: &ShopfrontConfig) -> ShopResult<Self> {
        config.validate()?;
        let db = Arc::new(DbClient::connect(&config.db).await?);
        db.migrate().await?;
        let cache = Arc::new(RedisStore::connect(&config.redis).await?);
        let storefront = Storefront::new(db.clone(), cache.clone(), &config.cache)?;
        info!("Storefront services ready");
        Ok(Self {
            storefront,
            db,
            cache,
        })
    }

    pub fn storefront(&self) -> &Storefront<DbClient, RedisStore> {
        &self.storefront
    }

    pub fn db(&self) -> &DbClient {
        &self.db
    }

    pub fn cache(&self) -> &RedisStore {
        &self.cache
    }

    pub fn close(&self) {
        self.cache.close();
        self.db.close();
    }
}

/// Bring every family's cache in line with the database.
///
/// Global families are scanned once each. Carts and wishlists are scanned
/// for every user that has a line in either, profile row or not.
pub async fn warm<K: KeyValueStore>(
    storefront: &Storefront<DbClient, K>,
) -> ShopResult<WarmReport> {
    let mut report = WarmReport::default();
    let categories = storefront.categories().scan_all().await?;
    report.record(EntityFamily::Category, categories.len());
    let subcategories = storefront.subcategories().scan_all().await?;
    report.record(EntityFamily::Subcategory, subcategories.len());
    let product_types = storefront.product_types().scan_all().await?;
    report.record(EntityFamily::ProductType, product_types.len());
    report.record(EntityFamily::MediaItem, storefront.media().scan_all().await?.len());
    report.record(EntityFamily::User, storefront.users().scan_all().await?.len());

    let users = storefront.catalog().scoped_users().await?;
    for user in &users {
        report.record(EntityFamily::Cart, storefront.carts().scan(user).await?.len());
        report.record(EntityFamily::Wishlist, storefront.wishlists().scan(user).await?.len());
    }

    info!(total = report.total(), users = users.len(), "Cache warm-up complete");
    Ok(report)
}
