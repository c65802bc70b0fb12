//! Core entity structures
//!
//! Relational rows carry media as bare [`MediaId`] references. Cached shapes
//! carry the same references next to their resolved [`MediaItem`]s, where a
//! reference that no longer resolves is kept as `None`.

use crate::{
    AddressId, CategoryId, MediaId, ProductId, ProductTypeId, SubcategoryId, Timestamp, UserId,
    VariantId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// CATALOG TAXONOMY
// ============================================================================

/// Top-level catalog category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Second-level grouping under a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subcategory {
    pub id: SubcategoryId,
    pub category_id: CategoryId,
    pub name: String,
    pub slug: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Leaf of the taxonomy that products are attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductType {
    pub id: ProductTypeId,
    pub subcategory_id: SubcategoryId,
    pub name: String,
    pub slug: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub slug: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubcategory {
    pub category_id: CategoryId,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubcategoryUpdate {
    pub category_id: Option<CategoryId>,
    pub name: Option<String>,
    pub slug: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProductType {
    pub subcategory_id: SubcategoryId,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductTypeUpdate {
    pub subcategory_id: Option<SubcategoryId>,
    pub name: Option<String>,
    pub slug: Option<String>,
}

// ============================================================================
// MEDIA AND USERS
// ============================================================================

/// An uploaded media object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: MediaId,
    pub url: String,
    pub alt: Option<String>,
    pub mime_type: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMediaItem {
    pub id: MediaId,
    pub url: String,
    pub alt: Option<String>,
    pub mime_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaItemUpdate {
    pub url: Option<String>,
    pub alt: Option<Option<String>>,
}

/// Storefront profile of an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUserProfile {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfileUpdate {
    pub email: Option<String>,
    pub name: Option<Option<String>>,
    pub image: Option<Option<String>>,
}

// ============================================================================
// PRODUCTS
// ============================================================================

/// Product as stored relationally, with its variants preloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRow {
    pub id: ProductId,
    pub product_type_id: Option<ProductTypeId>,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub media_ids: Vec<MediaId>,
    pub is_published: bool,
    pub variants: Vec<VariantRow>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// One point in a product's option space (e.g. size M, colour red).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantRow {
    pub id: VariantId,
    pub product_id: ProductId,
    pub sku: String,
    pub options: BTreeMap<String, String>,
    pub price_cents: Option<i64>,
    pub stock: i32,
    pub image_id: Option<MediaId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub product_type_id: Option<ProductTypeId>,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub media_ids: Vec<MediaId>,
    pub is_published: bool,
    pub variants: Vec<NewVariant>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVariant {
    pub sku: String,
    pub options: BTreeMap<String, String>,
    pub price_cents: Option<i64>,
    pub stock: i32,
    pub image_id: Option<MediaId>,
}

/// Product snapshot embedded in cart and wishlist entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedProduct {
    pub id: ProductId,
    pub product_type_id: Option<ProductTypeId>,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub media_ids: Vec<MediaId>,
    /// Positionally aligned with `media_ids`.
    pub media: Vec<Option<MediaItem>>,
    pub is_published: bool,
    pub variants: Vec<CachedVariant>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedVariant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub sku: String,
    pub options: BTreeMap<String, String>,
    pub price_cents: Option<i64>,
    pub stock: i32,
    pub image_id: Option<MediaId>,
    pub image: Option<MediaItem>,
}

// ============================================================================
// CART AND WISHLIST
// ============================================================================

/// Cart line joined with its product and the product's variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartRow {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: i32,
    pub created_at: Timestamp,
    pub product: ProductRow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedCart {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: i32,
    pub created_at: Timestamp,
    pub product: CachedProduct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCartLine {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLineUpdate {
    pub quantity: i32,
}

/// Wishlist entry joined with its product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WishlistRow {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub created_at: Timestamp,
    pub product: ProductRow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedWishlist {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub created_at: Timestamp,
    pub product: CachedProduct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWishlistEntry {
    pub user_id: UserId,
    pub product_id: ProductId,
}

// ============================================================================
// ADDRESS BOOK
// ============================================================================

/// Shipping address. At most one address per user has `is_primary` set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub full_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2.
    pub country: String,
    pub phone: Option<String>,
    pub is_primary: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAddress {
    pub user_id: UserId,
    pub full_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
    pub is_primary: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressUpdate {
    pub full_name: Option<String>,
    pub line1: Option<String>,
    pub line2: Option<Option<String>>,
    pub city: Option<String>,
    pub region: Option<Option<String>>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<Option<String>>,
    /// `Some(true)` makes this the user's primary address. `Some(false)` is
    /// ignored; a primary is only replaced, never cleared.
    pub is_primary: Option<bool>,
}

impl Address {
    /// Apply a partial update in place. The primary flag is handled by the
    /// address book transaction, not here.
    pub fn apply(&mut self, patch: &AddressUpdate, now: Timestamp) {
        if let Some(full_name) = &patch.full_name {
            self.full_name = full_name.clone();
        }
        if let Some(line1) = &patch.line1 {
            self.line1 = line1.clone();
        }
        if let Some(line2) = &patch.line2 {
            self.line2 = line2.clone();
        }
        if let Some(city) = &patch.city {
            self.city = city.clone();
        }
        if let Some(region) = &patch.region {
            self.region = region.clone();
        }
        if let Some(postal_code) = &patch.postal_code {
            self.postal_code = postal_code.clone();
        }
        if let Some(country) = &patch.country {
            self.country = country.clone();
        }
        if let Some(phone) = &patch.phone {
            self.phone = phone.clone();
        }
        self.updated_at = now;
    }
}
