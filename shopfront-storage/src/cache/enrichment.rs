//! Media enrichment for product-bearing rows.
//!
//! Rows hold media as bare identifiers. Before a batch of rows is validated
//! and cached, every referenced id is collected, deduplicated and resolved in a
//! single lookup, then each reference is replaced by the resolved item or
//! `None` when the item no longer exists or fails its own schema.

use async_trait::async_trait;
use shopfront_core::{
    CachedCart, CachedProduct, CachedVariant, CachedWishlist, CartRow, MediaId, MediaItem,
    ProductRow, Schema, ShopResult, VariantRow, WishlistRow,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

use super::coordinator::Materializer;
use super::traits::CacheFamily;

/// Resolved media by id.
pub type MediaLookup = HashMap<MediaId, MediaItem>;

/// Batched media resolution.
#[async_trait]
pub trait MediaResolver: Send + Sync + 'static {
    /// Resolve a set of ids in one lookup. Unknown ids are omitted.
    async fn resolve(&self, ids: &[MediaId]) -> ShopResult<Vec<MediaItem>>;
}

#[async_trait]
impl<R: MediaResolver + ?Sized> MediaResolver for Arc<R> {
    async fn resolve(&self, ids: &[MediaId]) -> ShopResult<Vec<MediaItem>> {
        (**self).resolve(ids).await
    }
}

/// A row that references media by id.
pub trait MediaBearing: Send + Sync + 'static {
    type Resolved: Send + 'static;

    /// Every referenced id, including nested ones.
    fn media_ids(&self) -> Vec<MediaId>;

    /// Replace references with entries from `lookup`.
    fn attach(self, lookup: &MediaLookup) -> Self::Resolved;
}

/// Resolve all media referenced by `rows` with exactly one call to
/// `resolver`, however many rows or duplicate ids there are.
pub async fn enrich<R, T>(resolver: &R, rows: Vec<T>) -> ShopResult<Vec<T::Resolved>>
where
    R: MediaResolver + ?Sized,
    T: MediaBearing,
{
    let ids: BTreeSet<MediaId> = rows.iter().flat_map(|row| row.media_ids()).collect();
    let ids: Vec<MediaId> = ids.into_iter().collect();
    debug!(rows = rows.len(), media = ids.len(), "Enriching rows");

    let lookup: MediaLookup = resolver
        .resolve(&ids)
        .await?
        .into_iter()
        .filter(|item| match item.check() {
            Ok(()) => true,
            Err(e) => {
                warn!(media = %item.id, error = %e, "Treating invalid media as unresolved");
                false
            }
        })
        .map(|item| (item.id.clone(), item))
        .collect();

    Ok(rows.into_iter().map(|row| row.attach(&lookup)).collect())
}

/// Materializer that enriches rows through a media resolver.
pub struct MediaEnricher<R: MediaResolver> {
    resolver: Arc<R>,
}

impl<R: MediaResolver> MediaEnricher<R> {
    pub fn new(resolver: Arc<R>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl<F, R> Materializer<F> for MediaEnricher<R>
where
    F: CacheFamily,
    F::Row: MediaBearing<Resolved = F::Entity>,
    R: MediaResolver,
{
    async fn materialize(&self, rows: Vec<F::Row>) -> ShopResult<Vec<F::Entity>> {
        enrich(&*self.resolver, rows).await
    }
}

// ============================================================================
// ROW IMPLEMENTATIONS
// ============================================================================

impl MediaBearing for VariantRow {
    type Resolved = CachedVariant;

    fn media_ids(&self) -> Vec<MediaId> {
        self.image_id.iter().cloned().collect()
    }

    fn attach(self, lookup: &MediaLookup) -> CachedVariant {
        let image = self.image_id.as_ref().and_then(|id| lookup.get(id).cloned());
        CachedVariant {
            id: self.id,
            product_id: self.product_id,
            sku: self.sku,
            options: self.options,
            price_cents: self.price_cents,
            stock: self.stock,
            image_id: self.image_id,
            image,
        }
    }
}

impl MediaBearing for ProductRow {
    type Resolved = CachedProduct;

    fn media_ids(&self) -> Vec<MediaId> {
        self.media_ids
            .iter()
            .cloned()
            .chain(self.variants.iter().flat_map(|v| v.media_ids()))
            .collect()
    }

    fn attach(self, lookup: &MediaLookup) -> CachedProduct {
        let media = self
            .media_ids
            .iter()
            .map(|id| lookup.get(id).cloned())
            .collect();
        CachedProduct {
            id: self.id,
            product_type_id: self.product_type_id,
            title: self.title,
            slug: self.slug,
            description: self.description,
            price_cents: self.price_cents,
            currency: self.currency,
            media_ids: self.media_ids,
            media,
            is_published: self.is_published,
            variants: self
                .variants
                .into_iter()
                .map(|v| v.attach(lookup))
                .collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl MediaBearing for CartRow {
    type Resolved = CachedCart;

    fn media_ids(&self) -> Vec<MediaId> {
        self.product.media_ids()
    }

    fn attach(self, lookup: &MediaLookup) -> CachedCart {
        CachedCart {
            user_id: self.user_id,
            product_id: self.product_id,
            variant_id: self.variant_id,
            quantity: self.quantity,
            created_at: self.created_at,
            product: self.product.attach(lookup),
        }
    }
}

impl MediaBearing for WishlistRow {
    type Resolved = CachedWishlist;

    fn media_ids(&self) -> Vec<MediaId> {
        self.product.media_ids()
    }

    fn attach(self, lookup: &MediaLookup) -> CachedWishlist {
        CachedWishlist {
            user_id: self.user_id,
            product_id: self.product_id,
            created_at: self.created_at,
            product: self.product.attach(lookup),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use shopfront_core::{ProductId, UserId, VariantId};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Records every call and serves a fixed media set.
    #[derive(Default)]
    struct RecordingResolver {
        known: Vec<MediaItem>,
        calls: Mutex<Vec<Vec<MediaId>>>,
    }

    #[async_trait]
    impl MediaResolver for RecordingResolver {
        async fn resolve(&self, ids: &[MediaId]) -> ShopResult<Vec<MediaItem>> {
            self.calls.lock().unwrap().push(ids.to_vec());
            Ok(self
                .known
                .iter()
                .filter(|m| ids.contains(&m.id))
                .cloned()
                .collect())
        }
    }

    fn ts() -> shopfront_core::Timestamp {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn media(id: &str) -> MediaItem {
        MediaItem {
            id: MediaId::new(id),
            url: format!("https://cdn.example.com/{}", id),
            alt: None,
            mime_type: "image/png".to_string(),
            created_at: ts(),
        }
    }

    fn product(media: &[&str], variant_image: Option<&str>) -> ProductRow {
        let id = ProductId::generate();
        ProductRow {
            id,
            product_type_id: None,
            title: "Mug".to_string(),
            slug: "mug".to_string(),
            description: None,
            price_cents: 1200,
            currency: "USD".to_string(),
            media_ids: media.iter().map(|m| MediaId::new(*m)).collect(),
            is_published: true,
            variants: vec![VariantRow {
                id: VariantId::generate(),
                product_id: id,
                sku: "MUG-1".to_string(),
                options: BTreeMap::new(),
                price_cents: None,
                stock: 1,
                image_id: variant_image.map(|m| MediaId::new(m)),
            }],
            created_at: ts(),
            updated_at: ts(),
        }
    }

    fn cart(product: ProductRow) -> CartRow {
        CartRow {
            user_id: UserId::new("u1"),
            product_id: product.id,
            variant_id: None,
            quantity: 1,
            created_at: ts(),
            product,
        }
    }

    #[tokio::test]
    async fn test_single_lookup_with_duplicates() {
        let resolver = RecordingResolver {
            known: vec![media("a"), media("b")],
            ..Default::default()
        };
        let rows = vec![
            cart(product(&["a", "b"], Some("a"))),
            cart(product(&["b", "a"], None)),
            cart(product(&["a"], Some("b"))),
        ];

        let enriched = enrich(&resolver, rows).await.unwrap();
        assert_eq!(enriched.len(), 3);

        let calls = resolver.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], vec![MediaId::new("a"), MediaId::new("b")]);
    }

    #[tokio::test]
    async fn test_deleted_media_resolves_to_none() {
        let resolver = RecordingResolver {
            known: vec![media("kept")],
            ..Default::default()
        };
        let rows = vec![cart(product(&["kept", "deleted"], Some("deleted")))];

        let enriched = enrich(&resolver, rows).await.unwrap();
        let product = &enriched[0].product;
        assert_eq!(product.media_ids.len(), 2);
        assert_eq!(product.media[0], Some(media("kept")));
        assert_eq!(product.media[1], None);
        assert_eq!(product.variants[0].image_id, Some(MediaId::new("deleted")));
        assert_eq!(product.variants[0].image, None);
    }

    #[tokio::test]
    async fn test_invalid_media_resolves_to_none() {
        let mut broken = media("broken");
        broken.url = "s3://bucket/broken".to_string();
        let resolver = RecordingResolver {
            known: vec![media("kept"), broken],
            ..Default::default()
        };
        let rows = vec![cart(product(&["kept", "broken"], Some("broken")))];

        let enriched = enrich(&resolver, rows).await.unwrap();
        let product = &enriched[0].product;
        assert_eq!(product.media, vec![Some(media("kept")), None]);
        assert_eq!(product.variants[0].image, None);
        assert!(enriched[0].check().is_ok());
    }

    #[tokio::test]
    async fn test_enrichment_is_deterministic() {
        let resolver = RecordingResolver {
            known: vec![media("a")],
            ..Default::default()
        };
        let rows = vec![cart(product(&["a", "x"], Some("a")))];

        let first = enrich(&resolver, rows.clone()).await.unwrap();
        let second = enrich(&resolver, rows).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_rows_without_media_still_make_one_lookup() {
        let resolver = RecordingResolver::default();
        let enriched = enrich(&resolver, vec![cart(product(&[], None))]).await.unwrap();
        assert!(enriched[0].product.media.is_empty());
        assert_eq!(resolver.calls.lock().unwrap().len(), 1);
    }
}
