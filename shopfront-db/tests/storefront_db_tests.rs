//! Storefront Tests Against PostgreSQL
//!
//! **Property: Cache Consistency Over the Relational Store**
//!
//! The coordinators behave the same over the PostgreSQL provider as over
//! the in-memory catalog: a cold scope is rebuilt from joined rows, writes
//! through the storefront are visible on the next scan, and deleting a
//! product empties the carts that held it.

#![cfg(feature = "db-tests")]

use shopfront_core::{CategoryUpdate, MediaId, NewCartLine, NewWishlistEntry, ShopResult, UserId};
use shopfront_db::{warm, DbClient};
use shopfront_storage::{
    CacheFamily, CartFamily, CartLineKey, InMemoryStore, KeyValueStore, RowWriter, Storefront,
    UserFamily,
};
use shopfront_test_utils::fixtures;
use std::sync::Arc;

#[path = "support/db.rs"]
mod test_db_support;
use test_db_support::{test_db_client, unique};

struct Fixture {
    db: Arc<DbClient>,
    store: Arc<InMemoryStore>,
    storefront: Storefront<DbClient, InMemoryStore>,
}

async fn fixture() -> ShopResult<Fixture> {
    let db = test_db_client().await;
    let store = Arc::new(InMemoryStore::new());
    let storefront = Storefront::new(db.clone(), store.clone(), &Default::default())?;
    Ok(Fixture {
        db,
        store,
        storefront,
    })
}

#[tokio::test]
async fn test_cart_scope_rebuild_with_media() -> ShopResult<()> {
    let fx = fixture().await?;
    let front = unique("media/front");
    let missing = unique("media/missing");
    RowWriter::<shopfront_storage::MediaFamily>::create(&*fx.db, fixtures::new_media(&front))
        .await?;

    let product = fx
        .db
        .insert_product(fixtures::new_product(
            &unique("runner"),
            &[front.as_str(), missing.as_str()],
            &[Some(front.as_str()), None],
        ))
        .await?;
    let user = UserId::new(unique("cart-user"));
    fx.storefront
        .carts()
        .create(NewCartLine {
            user_id: user.clone(),
            product_id: product.id,
            variant_id: None,
            quantity: 1,
        })
        .await?;
    fx.storefront
        .carts()
        .create(NewCartLine {
            user_id: user.clone(),
            product_id: product.id,
            variant_id: Some(product.variants[0].id),
            quantity: 2,
        })
        .await?;

    let lines = fx.storefront.carts().scan(&user).await?;
    assert_eq!(lines.len(), 2);
    for line in &lines {
        assert_eq!(line.product.media.len(), 2);
        assert_eq!(
            line.product.media[0].as_ref().map(|m| m.id.clone()),
            Some(MediaId::new(front.clone()))
        );
        assert!(line.product.media[1].is_none());
        assert_eq!(line.product.variants.len(), 2);
        assert!(line.product.variants[0].image.is_some());
    }
    let keys = fx.store.keys(&CartFamily::pattern(&user)).await?;
    assert_eq!(keys.len(), 2);

    // Adding the same line again sums the quantity
    let row = fx
        .storefront
        .carts()
        .create(NewCartLine {
            user_id: user.clone(),
            product_id: product.id,
            variant_id: None,
            quantity: 3,
        })
        .await?;
    assert_eq!(row.quantity, 4);
    let line = fx
        .storefront
        .carts()
        .get(&CartLineKey {
            user_id: user.clone(),
            product_id: product.id,
            variant_id: None,
        })
        .await?;
    assert_eq!(line.map(|l| l.quantity), Some(4));

    // Cart lines go with the product; the count mismatch forces a rebuild
    assert!(fx.db.delete_product(product.id).await?);
    assert!(fx.storefront.carts().scan(&user).await?.is_empty());
    assert!(fx.store.keys(&CartFamily::pattern(&user)).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_wishlist_add_is_idempotent() -> ShopResult<()> {
    let fx = fixture().await?;
    let product = fx
        .db
        .insert_product(fixtures::new_product(&unique("hat"), &[], &[]))
        .await?;
    let user = UserId::new(unique("wish-user"));
    let entry = NewWishlistEntry {
        user_id: user.clone(),
        product_id: product.id,
    };

    let first = fx.storefront.wishlists().create(entry.clone()).await?;
    let second = fx.storefront.wishlists().create(entry).await?;
    assert_eq!(first.created_at, second.created_at);
    assert_eq!(fx.storefront.wishlists().scan(&user).await?.len(), 1);

    fx.db.delete_product(product.id).await?;
    Ok(())
}

#[tokio::test]
async fn test_category_writes_visible_on_next_scan() -> ShopResult<()> {
    let fx = fixture().await?;
    let categories = fx.storefront.categories();

    let created = categories
        .create(fixtures::new_category(&unique("shoes")))
        .await?;
    let scanned = categories.scan_all().await?;
    assert!(scanned.iter().any(|c| c.id == created.id));

    let patch = CategoryUpdate {
        name: Some("Footwear".to_string()),
        ..CategoryUpdate::default()
    };
    categories.update(&created.id, patch).await?;
    let cached = categories.get(&created.id).await?;
    assert_eq!(cached.map(|c| c.name), Some("Footwear".to_string()));

    assert!(categories.delete(&created.id).await?);
    let scanned = categories.scan_all().await?;
    assert!(scanned.iter().all(|c| c.id != created.id));
    Ok(())
}

#[tokio::test]
async fn test_duplicate_category_slug_rejected() -> ShopResult<()> {
    let fx = fixture().await?;
    let slug = unique("bags");
    let created = fx
        .storefront
        .categories()
        .create(fixtures::new_category(&slug))
        .await?;

    let duplicate = fx
        .storefront
        .categories()
        .create(fixtures::new_category(&slug))
        .await;
    assert!(duplicate.is_err());

    fx.storefront.categories().delete(&created.id).await?;
    Ok(())
}

#[tokio::test]
async fn test_warm_fills_user_scope() -> ShopResult<()> {
    let fx = fixture().await?;
    let user_id = unique("warm-user");
    fx.storefront.users().create(fixtures::new_user(&user_id)).await?;

    let report = warm(&fx.storefront).await?;
    assert!(report.total() >= 1);
    let key = UserFamily::key(&UserId::new(user_id.clone()));
    assert!(fx.store.get(&key).await?.is_some());

    RowWriter::<UserFamily>::delete(&*fx.db, &UserId::new(user_id)).await?;
    Ok(())
}

#[tokio::test]
async fn test_warm_covers_users_without_profile() -> ShopResult<()> {
    let fx = fixture().await?;
    let product = fx
        .db
        .insert_product(fixtures::new_product(&unique("guest-item"), &[], &[]))
        .await?;
    let guest = UserId::new(unique("guest"));
    RowWriter::<CartFamily>::create(
        &*fx.db,
        NewCartLine {
            user_id: guest.clone(),
            product_id: product.id,
            variant_id: None,
            quantity: 1,
        },
    )
    .await?;
    let watcher = UserId::new(unique("watcher"));
    RowWriter::<shopfront_storage::WishlistFamily>::create(
        &*fx.db,
        NewWishlistEntry {
            user_id: watcher.clone(),
            product_id: product.id,
        },
    )
    .await?;

    assert!(fx.db.scoped_users().await?.contains(&guest));
    warm(&fx.storefront).await?;

    assert_eq!(fx.store.keys(&CartFamily::pattern(&guest)).await?.len(), 1);
    let wishlist_keys = fx
        .store
        .keys(&shopfront_storage::WishlistFamily::pattern(&watcher))
        .await?;
    assert_eq!(wishlist_keys.len(), 1);
    assert!(fx.storefront.users().get(&guest).await?.is_none());

    fx.db.delete_product(product.id).await?;
    Ok(())
}
