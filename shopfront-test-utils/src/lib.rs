//! Shopfront Test Utilities
//!
//! Shared test infrastructure for the shopfront workspace:
//! - Proptest generators for entity shapes and key components
//! - Fixtures for common inputs
//! - A seeded in-memory storefront with a cold cache
//! - Assertions for shopfront error and invariant checks

pub use shopfront_storage::{InMemoryStore, MemoryCatalog, SourceOp, Storefront};

pub use shopfront_core::{
    Address, CacheConfig, CachedCart, CachedProduct, CachedVariant, CachedWishlist, Category,
    CategoryId, EntityFamily, MediaId, MediaItem, NewAddress, NewCartLine, NewCategory,
    NewMediaItem, NewProduct, NewUserProfile, NewVariant, NewWishlistEntry, ProductId, ProductRow,
    ShopError, ShopResult, StorageError, Timestamp, UserId, UserProfile, ValidationError,
    VariantId,
};

use chrono::Utc;
use std::collections::BTreeMap;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for shopfront types.

    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    /// Generate a random UUID.
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    /// Generate a Timestamp within 2020-2030.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    /// Generate a valid kebab-case slug.
    pub fn arb_slug() -> impl Strategy<Value = String> {
        "[a-z0-9]{1,8}(-[a-z0-9]{1,8}){0,3}"
    }

    /// Key component text, biased towards the characters the key scheme
    /// reserves.
    pub fn arb_key_component() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z0-9]{1,12}",
            "[a-z:*!%/ ]{1,12}",
            any::<String>().prop_filter("non-empty", |s| !s.is_empty()),
        ]
    }

    pub fn arb_user_id() -> impl Strategy<Value = UserId> {
        arb_key_component()
            .prop_filter("non-blank", |s| !s.trim().is_empty())
            .prop_map(UserId::new)
    }

    pub fn arb_media_id() -> impl Strategy<Value = MediaId> {
        "[a-z0-9]{1,8}(/[a-z0-9]{1,8}){0,2}\\.(png|jpg|webp)".prop_map(MediaId::new)
    }

    pub fn arb_category() -> impl Strategy<Value = Category> {
        (
            arb_uuid(),
            "[A-Za-z][A-Za-z ]{0,23}",
            arb_slug(),
            proptest::option::of("[A-Za-z ,.]{0,64}"),
            arb_timestamp(),
        )
            .prop_map(|(id, name, slug, description, at)| Category {
                id: CategoryId(id),
                name,
                slug,
                description,
                created_at: at,
                updated_at: at,
            })
    }

    pub fn arb_media_item() -> impl Strategy<Value = MediaItem> {
        (
            arb_media_id(),
            proptest::option::of("[A-Za-z ]{1,32}"),
            prop_oneof![Just("image/png"), Just("image/jpeg"), Just("image/webp")],
            arb_timestamp(),
        )
            .prop_map(|(id, alt, mime, at)| MediaItem {
                url: format!("https://cdn.example.com/{}", id),
                id,
                alt,
                mime_type: mime.to_string(),
                created_at: at,
            })
    }

    pub fn arb_user_profile() -> impl Strategy<Value = UserProfile> {
        (
            "[a-z0-9]{4,16}",
            "[a-z]{1,10}@[a-z]{1,10}\\.(com|org|dev)",
            proptest::option::of("[A-Z][a-z]{1,12}"),
            arb_timestamp(),
        )
            .prop_map(|(id, email, name, at)| UserProfile {
                id: UserId::new(id),
                email,
                name,
                image: None,
                created_at: at,
                updated_at: at,
            })
    }

    /// A schema-valid product snapshot whose media entries are each either
    /// resolved or missing.
    pub fn arb_cached_product() -> impl Strategy<Value = CachedProduct> {
        (
            arb_uuid(),
            arb_slug(),
            0i64..1_000_000,
            prop::collection::vec((arb_media_item(), any::<bool>()), 0..4),
            prop::collection::vec(("[A-Z0-9]{4,10}", 0i32..500), 0..3),
            arb_timestamp(),
        )
            .prop_map(|(id, slug, price, media, variants, at)| {
                let product_id = ProductId(id);
                CachedProduct {
                    id: product_id,
                    product_type_id: None,
                    title: slug.replace('-', " "),
                    slug,
                    description: None,
                    price_cents: price,
                    currency: "USD".to_string(),
                    media_ids: media.iter().map(|(item, _)| item.id.clone()).collect(),
                    media: media
                        .into_iter()
                        .map(|(item, resolved)| resolved.then_some(item))
                        .collect(),
                    is_published: true,
                    variants: variants
                        .into_iter()
                        .map(|(sku, stock)| CachedVariant {
                            id: VariantId::generate(),
                            product_id,
                            sku,
                            options: BTreeMap::new(),
                            price_cents: None,
                            stock,
                            image_id: None,
                            image: None,
                        })
                        .collect(),
                    created_at: at,
                    updated_at: at,
                }
            })
    }

    pub fn arb_cached_cart() -> impl Strategy<Value = CachedCart> {
        (arb_user_id(), arb_cached_product(), 1i32..20, arb_timestamp()).prop_map(
            |(user_id, product, quantity, at)| CachedCart {
                user_id,
                product_id: product.id,
                variant_id: product.variants.first().map(|v| v.id),
                quantity,
                created_at: at,
                product,
            },
        )
    }

    pub fn arb_new_address(user: UserId) -> impl Strategy<Value = NewAddress> {
        (
            "[A-Z][a-z]{1,10} [A-Z][a-z]{1,10}",
            "[0-9]{1,4} [A-Z][a-z]{2,10} St",
            "[A-Z][a-z]{2,12}",
            "[0-9]{5}",
            prop_oneof![Just("US"), Just("DE"), Just("FR"), Just("JP")],
            any::<bool>(),
        )
            .prop_map(move |(full_name, line1, city, postal_code, country, is_primary)| {
                NewAddress {
                    user_id: user.clone(),
                    full_name,
                    line1,
                    line2: None,
                    city,
                    region: None,
                    postal_code,
                    country: country.to_string(),
                    phone: None,
                    is_primary,
                }
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built inputs for common scenarios.

    use super::*;

    pub fn new_category(slug: &str) -> NewCategory {
        NewCategory {
            name: slug.replace('-', " "),
            slug: slug.to_string(),
            description: None,
        }
    }

    pub fn new_media(id: &str) -> NewMediaItem {
        NewMediaItem {
            id: MediaId::new(id),
            url: format!("https://cdn.example.com/{}", id),
            alt: Some(format!("picture of {}", id)),
            mime_type: "image/png".to_string(),
        }
    }

    pub fn new_user(id: &str) -> NewUserProfile {
        NewUserProfile {
            id: UserId::new(id),
            email: format!("{}@example.com", id),
            name: None,
            image: None,
        }
    }

    /// A published product referencing `media`, with one variant per entry of
    /// `variant_images`.
    pub fn new_product(slug: &str, media: &[&str], variant_images: &[Option<&str>]) -> NewProduct {
        NewProduct {
            product_type_id: None,
            title: slug.replace('-', " "),
            slug: slug.to_string(),
            description: None,
            price_cents: 2500,
            currency: "USD".to_string(),
            media_ids: media.iter().map(|id| MediaId::new(*id)).collect(),
            is_published: true,
            variants: variant_images
                .iter()
                .enumerate()
                .map(|(i, image)| NewVariant {
                    sku: format!("{}-{}", slug, i).to_uppercase(),
                    options: BTreeMap::from([("size".to_string(), format!("{}", i))]),
                    price_cents: None,
                    stock: 10,
                    image_id: image.map(MediaId::new),
                })
                .collect(),
        }
    }

    pub fn new_address(user: &UserId, city: &str, is_primary: bool) -> NewAddress {
        NewAddress {
            user_id: user.clone(),
            full_name: "Ada Lovelace".to_string(),
            line1: "12 Analytical Row".to_string(),
            line2: None,
            city: city.to_string(),
            region: None,
            postal_code: "10115".to_string(),
            country: "DE".to_string(),
            phone: None,
            is_primary,
        }
    }
}

// ============================================================================
// SEEDED STOREFRONT
// ============================================================================

pub mod seed {
    //! A storefront over [`MemoryCatalog`] and [`InMemoryStore`], seeded
    //! relationally with an empty cache.

    use super::*;
    use shopfront_storage::{
        CartFamily, CategoryFamily, MediaFamily, RowWriter, UserFamily, WishlistFamily,
    };
    use std::sync::Arc;

    /// Media id referenced by the seeded product but never created.
    pub const MISSING_MEDIA: &str = "deleted/gone.png";

    pub struct SeededStorefront {
        pub storefront: Storefront<MemoryCatalog, InMemoryStore>,
        pub catalog: Arc<MemoryCatalog>,
        pub store: Arc<InMemoryStore>,
        pub user: UserId,
        pub categories: Vec<Category>,
        pub media: Vec<MediaItem>,
        pub product: ProductRow,
    }

    /// Seed three categories, two media items, one product referencing both
    /// plus [`MISSING_MEDIA`], and a user with two cart lines and one
    /// wishlist entry. Call counters are reset afterwards.
    pub async fn seeded_storefront() -> ShopResult<SeededStorefront> {
        let catalog = Arc::new(MemoryCatalog::new());
        let store = Arc::new(InMemoryStore::new());

        let mut categories = Vec::new();
        for slug in ["shoes", "hats", "bags"] {
            categories.push(
                RowWriter::<CategoryFamily>::create(&*catalog, fixtures::new_category(slug))
                    .await?,
            );
        }

        let mut media = Vec::new();
        for id in ["products/front.png", "products/back.png"] {
            media.push(RowWriter::<MediaFamily>::create(&*catalog, fixtures::new_media(id)).await?);
        }

        let product = catalog.insert_product(fixtures::new_product(
            "trail-runner",
            &["products/front.png", "products/back.png", MISSING_MEDIA],
            &[Some("products/front.png"), None],
        ))?;

        let user = UserId::new("user-1");
        RowWriter::<UserFamily>::create(&*catalog, fixtures::new_user(user.as_str())).await?;
        RowWriter::<CartFamily>::create(
            &*catalog,
            NewCartLine {
                user_id: user.clone(),
                product_id: product.id,
                variant_id: None,
                quantity: 1,
            },
        )
        .await?;
        RowWriter::<CartFamily>::create(
            &*catalog,
            NewCartLine {
                user_id: user.clone(),
                product_id: product.id,
                variant_id: product.variants.first().map(|v| v.id),
                quantity: 2,
            },
        )
        .await?;
        RowWriter::<WishlistFamily>::create(
            &*catalog,
            NewWishlistEntry {
                user_id: user.clone(),
                product_id: product.id,
            },
        )
        .await?;

        catalog.reset_calls();
        let storefront = Storefront::new(catalog.clone(), store.clone(), &CacheConfig::default())?;

        Ok(SeededStorefront {
            storefront,
            catalog,
            store,
            user,
            categories,
            media,
            product,
        })
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for shopfront errors and invariants.

    use super::*;

    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &ShopResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    #[track_caller]
    pub fn assert_err<T: std::fmt::Debug>(result: &ShopResult<T>) {
        assert!(result.is_err(), "Expected Err, got Ok: {:?}", result);
    }

    /// Assert that a ShopResult failed schema validation.
    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &ShopResult<T>) {
        match result {
            Err(ShopError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    /// Assert that a ShopResult is a NotFound storage error for `entity`.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &ShopResult<T>, entity: &str) {
        match result {
            Err(ShopError::Storage(StorageError::NotFound { entity: e, .. })) => {
                assert_eq!(e, entity, "Wrong entity in NotFound error");
            }
            other => panic!("Expected NotFound error for {}, got: {:?}", entity, other),
        }
    }

    /// Assert that at most one address is primary, and exactly one when any
    /// exist.
    #[track_caller]
    pub fn assert_single_primary(addresses: &[Address]) {
        let primaries = addresses.iter().filter(|a| a.is_primary).count();
        if addresses.is_empty() {
            assert_eq!(primaries, 0);
        } else {
            assert_eq!(primaries, 1, "Expected exactly one primary in {:?}", addresses);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
