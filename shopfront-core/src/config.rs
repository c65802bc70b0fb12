//! Configuration types

use crate::{ConfigError, EntityFamily, ShopError, ShopResult};
use std::time::Duration;

/// Per-family cache expirations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub category_ttl: Duration,
    pub subcategory_ttl: Duration,
    pub product_type_ttl: Duration,
    pub media_ttl: Duration,
    pub user_ttl: Duration,
    pub cart_ttl: Duration,
    pub wishlist_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            category_ttl: EntityFamily::Category.default_ttl(),
            subcategory_ttl: EntityFamily::Subcategory.default_ttl(),
            product_type_ttl: EntityFamily::ProductType.default_ttl(),
            media_ttl: EntityFamily::MediaItem.default_ttl(),
            user_ttl: EntityFamily::User.default_ttl(),
            cart_ttl: EntityFamily::Cart.default_ttl(),
            wishlist_ttl: EntityFamily::Wishlist.default_ttl(),
        }
    }
}

fn env_secs(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

impl CacheConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables (seconds):
    /// - `SHOPFRONT_CACHE_TTL_CATEGORY_SECS` (default: 1 day)
    /// - `SHOPFRONT_CACHE_TTL_SUBCATEGORY_SECS` (default: 1 day)
    /// - `SHOPFRONT_CACHE_TTL_PRODUCT_TYPE_SECS` (default: 1 day)
    /// - `SHOPFRONT_CACHE_TTL_MEDIA_SECS` (default: 1 day)
    /// - `SHOPFRONT_CACHE_TTL_USER_SECS` (default: 1 day)
    /// - `SHOPFRONT_CACHE_TTL_CART_SECS` (default: 1 week)
    /// - `SHOPFRONT_CACHE_TTL_WISHLIST_SECS` (default: 1 week)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            category_ttl: env_secs("SHOPFRONT_CACHE_TTL_CATEGORY_SECS", defaults.category_ttl),
            subcategory_ttl: env_secs(
                "SHOPFRONT_CACHE_TTL_SUBCATEGORY_SECS",
                defaults.subcategory_ttl,
            ),
            product_type_ttl: env_secs(
                "SHOPFRONT_CACHE_TTL_PRODUCT_TYPE_SECS",
                defaults.product_type_ttl,
            ),
            media_ttl: env_secs("SHOPFRONT_CACHE_TTL_MEDIA_SECS", defaults.media_ttl),
            user_ttl: env_secs("SHOPFRONT_CACHE_TTL_USER_SECS", defaults.user_ttl),
            cart_ttl: env_secs("SHOPFRONT_CACHE_TTL_CART_SECS", defaults.cart_ttl),
            wishlist_ttl: env_secs("SHOPFRONT_CACHE_TTL_WISHLIST_SECS", defaults.wishlist_ttl),
        }
    }

    pub fn ttl_for(&self, family: EntityFamily) -> Duration {
        match family {
            EntityFamily::Category => self.category_ttl,
            EntityFamily::Subcategory => self.subcategory_ttl,
            EntityFamily::ProductType => self.product_type_ttl,
            EntityFamily::MediaItem => self.media_ttl,
            EntityFamily::User => self.user_ttl,
            EntityFamily::Cart => self.cart_ttl,
            EntityFamily::Wishlist => self.wishlist_ttl,
        }
    }

    /// Validate the configuration.
    ///
    /// Every expiration must be at least one second; Redis `EX` rejects zero.
    pub fn validate(&self) -> ShopResult<()> {
        for family in EntityFamily::ALL {
            let ttl = self.ttl_for(family);
            if ttl.as_secs() == 0 {
                return Err(ShopError::Config(ConfigError::InvalidValue {
                    field: format!("{}_ttl", family.prefix().replace('-', "_")),
                    value: format!("{:?}", ttl),
                    reason: "ttl must be at least one second".to_string(),
                }));
            }
        }
        Ok(())
    }
}
