//! The seven cached entity families.

use async_trait::async_trait;
use shopfront_core::{
    CachedCart, CachedWishlist, CartRow, Category, CategoryId, EntityFamily, MediaId, MediaItem,
    ProductId, ProductType, ProductTypeId, ShopResult, Subcategory, SubcategoryId, UserId,
    UserProfile, VariantId, WishlistRow,
};

use super::codec::{Codec, JsonCodec};
use super::coordinator::CacheCoordinator;
use super::enrichment::MediaResolver;
use super::key::KeyPart;
use super::traits::{CacheFamily, Invalidation, KeyValueStore};
use crate::relational::RowSource;

/// Global family keyed by a single id, whose row is the cached shape.
macro_rules! simple_family {
    ($(#[$meta:meta])* $family:ident, $variant:ident, $entity:ty, $id:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $family;

        impl CacheFamily for $family {
            const FAMILY: EntityFamily = EntityFamily::$variant;
            const INVALIDATION: Invalidation = Invalidation::Targeted;

            type Row = $entity;
            type Entity = $entity;
            type Identity = $id;
            type Scope = ();

            fn identity_parts(identity: &$id) -> Vec<KeyPart> {
                vec![KeyPart::value(identity)]
            }

            fn scope_parts(_scope: &()) -> Vec<KeyPart> {
                Vec::new()
            }

            fn identity_of(entity: &$entity) -> $id {
                entity.id.clone()
            }

            fn row_identity(row: &$entity) -> $id {
                row.id.clone()
            }

            fn scope_of(_identity: &$id) {}
        }
    };
}

simple_family!(
    /// `category::<id>`
    CategoryFamily,
    Category,
    Category,
    CategoryId
);
simple_family!(
    /// `subcategory::<id>`
    SubcategoryFamily,
    Subcategory,
    Subcategory,
    SubcategoryId
);
simple_family!(
    /// `product-type::<id>`
    ProductTypeFamily,
    ProductType,
    ProductType,
    ProductTypeId
);
simple_family!(
    /// `media::<id>`
    MediaFamily,
    MediaItem,
    MediaItem,
    MediaId
);
simple_family!(
    /// `user::<id>`
    UserFamily,
    User,
    UserProfile,
    UserId
);

/// Identity of one cart line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CartLineKey {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
}

/// `cart::<user>::<product>::<variant|!>`, scoped by user.
#[derive(Debug, Clone, Copy, Default)]
pub struct CartFamily;

impl CacheFamily for CartFamily {
    const FAMILY: EntityFamily = EntityFamily::Cart;
    const INVALIDATION: Invalidation = Invalidation::ScopeWide;

    type Row = CartRow;
    type Entity = CachedCart;
    type Identity = CartLineKey;
    type Scope = UserId;

    fn identity_parts(identity: &CartLineKey) -> Vec<KeyPart> {
        vec![
            KeyPart::value(&identity.user_id),
            KeyPart::value(identity.product_id),
            KeyPart::optional(identity.variant_id),
        ]
    }

    fn scope_parts(user: &UserId) -> Vec<KeyPart> {
        vec![KeyPart::value(user)]
    }

    fn identity_of(entity: &CachedCart) -> CartLineKey {
        CartLineKey {
            user_id: entity.user_id.clone(),
            product_id: entity.product_id,
            variant_id: entity.variant_id,
        }
    }

    fn row_identity(row: &CartRow) -> CartLineKey {
        CartLineKey {
            user_id: row.user_id.clone(),
            product_id: row.product_id,
            variant_id: row.variant_id,
        }
    }

    fn scope_of(identity: &CartLineKey) -> UserId {
        identity.user_id.clone()
    }
}

/// Identity of one wishlist entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WishlistKey {
    pub user_id: UserId,
    pub product_id: ProductId,
}

/// `wishlist::<user>::<product>`, scoped by user.
#[derive(Debug, Clone, Copy, Default)]
pub struct WishlistFamily;

impl CacheFamily for WishlistFamily {
    const FAMILY: EntityFamily = EntityFamily::Wishlist;
    const INVALIDATION: Invalidation = Invalidation::ScopeWide;

    type Row = WishlistRow;
    type Entity = CachedWishlist;
    type Identity = WishlistKey;
    type Scope = UserId;

    fn identity_parts(identity: &WishlistKey) -> Vec<KeyPart> {
        vec![
            KeyPart::value(&identity.user_id),
            KeyPart::value(identity.product_id),
        ]
    }

    fn scope_parts(user: &UserId) -> Vec<KeyPart> {
        vec![KeyPart::value(user)]
    }

    fn identity_of(entity: &CachedWishlist) -> WishlistKey {
        WishlistKey {
            user_id: entity.user_id.clone(),
            product_id: entity.product_id,
        }
    }

    fn row_identity(row: &WishlistRow) -> WishlistKey {
        WishlistKey {
            user_id: row.user_id.clone(),
            product_id: row.product_id,
        }
    }

    fn scope_of(identity: &WishlistKey) -> UserId {
        identity.user_id.clone()
    }
}

pub type CategoryCache<S, K, C = JsonCodec> = CacheCoordinator<CategoryFamily, S, K, C>;
pub type SubcategoryCache<S, K, C = JsonCodec> = CacheCoordinator<SubcategoryFamily, S, K, C>;
pub type ProductTypeCache<S, K, C = JsonCodec> = CacheCoordinator<ProductTypeFamily, S, K, C>;
pub type MediaCache<S, K, C = JsonCodec> = CacheCoordinator<MediaFamily, S, K, C>;
pub type UserCache<S, K, C = JsonCodec> = CacheCoordinator<UserFamily, S, K, C>;
pub type CartCache<S, K, C = JsonCodec> = CacheCoordinator<CartFamily, S, K, C>;
pub type WishlistCache<S, K, C = JsonCodec> = CacheCoordinator<WishlistFamily, S, K, C>;

/// The media cache is the resolver used by enrichment: one multi-get for the
/// whole id set, one relational batch for the misses.
#[async_trait]
impl<S, K, C> MediaResolver for CacheCoordinator<MediaFamily, S, K, C>
where
    S: RowSource<MediaFamily>,
    K: KeyValueStore,
    C: Codec,
{
    async fn resolve(&self, ids: &[MediaId]) -> ShopResult<Vec<MediaItem>> {
        self.get_many(ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_keys() {
        let line = CartLineKey {
            user_id: UserId::new("u1"),
            product_id: ProductId(uuid::Uuid::nil()),
            variant_id: None,
        };
        assert_eq!(
            CartFamily::key(&line).as_str(),
            "cart::u1::00000000-0000-0000-0000-000000000000::!"
        );
        assert_eq!(
            CartFamily::pattern(&UserId::new("u1")).as_str(),
            "cart::u1::*::*"
        );
        assert!(CartFamily::key(&line).matches(&CartFamily::pattern(&CartFamily::scope_of(&line))));
    }

    #[test]
    fn test_wishlist_keys() {
        let entry = WishlistKey {
            user_id: UserId::new("u@x"),
            product_id: ProductId(uuid::Uuid::nil()),
        };
        assert_eq!(
            WishlistFamily::key(&entry).as_str(),
            "wishlist::u%40x::00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            WishlistFamily::pattern(&UserId::new("u@x")).as_str(),
            "wishlist::u%40x::*"
        );
    }

    #[test]
    fn test_global_family_pattern() {
        assert_eq!(CategoryFamily::pattern(&()).as_str(), "category::*");
        assert_eq!(ProductTypeFamily::pattern(&()).as_str(), "product-type::*");
        assert_eq!(
            MediaFamily::key(&MediaId::new("uploads/a b.png")).as_str(),
            "media::uploads%2Fa%20b.png"
        );
    }
}
