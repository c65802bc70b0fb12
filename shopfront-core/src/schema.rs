//! Runtime schema rules for cached values.
//!
//! Every value that enters or leaves the cache goes through [`Schema`]. Strict
//! parsing (`parse_*`) is used on write paths and surfaces the failure;
//! tolerant parsing (`safe_parse_*`) is used on read paths where a malformed
//! value is treated as absent.

use crate::{
    Address, AddressUpdate, CachedCart, CachedProduct, CachedVariant, CachedWishlist,
    CartLineUpdate, Category, CategoryUpdate, MediaItem, MediaItemUpdate, NewAddress, NewCartLine,
    NewCategory, NewMediaItem, NewProduct, NewProductType, NewSubcategory, NewUserProfile,
    NewVariant, NewWishlistEntry, ProductType, ProductTypeUpdate, Subcategory, SubcategoryUpdate,
    UserProfile, UserProfileUpdate, ValidationError,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("Invalid slug regex"));
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Invalid email regex"));
static CURRENCY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{3}$").expect("Invalid currency regex"));
static COUNTRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{2}$").expect("Invalid country regex"));
static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:https?://|/)\S+$").expect("Invalid url regex"));

/// Shape and value rules for a cached entity.
pub trait Schema: Serialize + DeserializeOwned {
    /// Name used in validation errors.
    const NAME: &'static str;

    /// Check value-level rules on an already typed value.
    fn check(&self) -> Result<(), ValidationError>;

    /// Decode from a JSON value and check. Fails on any mismatch.
    fn parse_value(raw: serde_json::Value) -> Result<Self, ValidationError> {
        let value: Self = serde_json::from_value(raw).map_err(|e| ValidationError::Malformed {
            schema: Self::NAME.to_string(),
            reason: e.to_string(),
        })?;
        value.check()?;
        Ok(value)
    }

    /// Decode from JSON text and check. Fails on any mismatch.
    fn parse_str(raw: &str) -> Result<Self, ValidationError> {
        let value: Self = serde_json::from_str(raw).map_err(|e| ValidationError::Malformed {
            schema: Self::NAME.to_string(),
            reason: e.to_string(),
        })?;
        value.check()?;
        Ok(value)
    }

    fn safe_parse_value(raw: serde_json::Value) -> Option<Self> {
        Self::parse_value(raw).ok()
    }

    fn safe_parse_str(raw: &str) -> Option<Self> {
        Self::parse_str(raw).ok()
    }
}

// ============================================================================
// FIELD RULES
// ============================================================================

fn required(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn matches(field: &str, value: &str, re: &Regex, expected: &str) -> Result<(), ValidationError> {
    if !re.is_match(value) {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: format!("{:?} is not a valid {}", value, expected),
        });
    }
    Ok(())
}

fn non_negative(field: &str, value: i64) -> Result<(), ValidationError> {
    if value < 0 {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: format!("{} must be non-negative", value),
        });
    }
    Ok(())
}

fn same<T: PartialEq + std::fmt::Display>(
    field: &str,
    expected: &T,
    got: &T,
) -> Result<(), ValidationError> {
    if expected != got {
        return Err(ValidationError::RelationMismatch {
            field: field.to_string(),
            expected: expected.to_string(),
            got: got.to_string(),
        });
    }
    Ok(())
}

pub fn validate_slug(field: &str, value: &str) -> Result<(), ValidationError> {
    required(field, value)?;
    matches(field, value, &SLUG_RE, "slug")
}

pub fn validate_email(field: &str, value: &str) -> Result<(), ValidationError> {
    required(field, value)?;
    matches(field, value, &EMAIL_RE, "email address")
}

pub fn validate_url(field: &str, value: &str) -> Result<(), ValidationError> {
    required(field, value)?;
    matches(field, value, &URL_RE, "url")
}

pub fn validate_country(field: &str, value: &str) -> Result<(), ValidationError> {
    matches(field, value, &COUNTRY_RE, "ISO country code")
}

pub fn validate_mime(field: &str, value: &str) -> Result<(), ValidationError> {
    if !value.contains('/') {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: format!("{:?} is not a mime type", value),
        });
    }
    Ok(())
}

fn quantity(field: &str, value: i32) -> Result<(), ValidationError> {
    if value < 1 {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: format!("{} must be at least 1", value),
        });
    }
    Ok(())
}

// ============================================================================
// ENTITY SCHEMAS
// ============================================================================

impl Schema for Category {
    const NAME: &'static str = "Category";

    fn check(&self) -> Result<(), ValidationError> {
        required("name", &self.name)?;
        validate_slug("slug", &self.slug)
    }
}

impl Schema for Subcategory {
    const NAME: &'static str = "Subcategory";

    fn check(&self) -> Result<(), ValidationError> {
        required("name", &self.name)?;
        validate_slug("slug", &self.slug)
    }
}

impl Schema for ProductType {
    const NAME: &'static str = "ProductType";

    fn check(&self) -> Result<(), ValidationError> {
        required("name", &self.name)?;
        validate_slug("slug", &self.slug)
    }
}

impl Schema for MediaItem {
    const NAME: &'static str = "MediaItem";

    fn check(&self) -> Result<(), ValidationError> {
        required("id", self.id.as_str())?;
        validate_url("url", &self.url)?;
        validate_mime("mimeType", &self.mime_type)
    }
}

impl Schema for UserProfile {
    const NAME: &'static str = "UserProfile";

    fn check(&self) -> Result<(), ValidationError> {
        required("id", self.id.as_str())?;
        validate_email("email", &self.email)?;
        if let Some(image) = &self.image {
            validate_url("image", image)?;
        }
        Ok(())
    }
}

impl Schema for CachedVariant {
    const NAME: &'static str = "CachedVariant";

    fn check(&self) -> Result<(), ValidationError> {
        required("sku", &self.sku)?;
        if let Some(price) = self.price_cents {
            non_negative("priceCents", price)?;
        }
        non_negative("stock", i64::from(self.stock))?;
        match (&self.image_id, &self.image) {
            (Some(id), Some(image)) => {
                same("image.id", id, &image.id)?;
                image.check()
            }
            (None, Some(image)) => Err(ValidationError::RelationMismatch {
                field: "image.id".to_string(),
                expected: "none".to_string(),
                got: image.id.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

impl Schema for CachedProduct {
    const NAME: &'static str = "CachedProduct";

    fn check(&self) -> Result<(), ValidationError> {
        required("title", &self.title)?;
        validate_slug("slug", &self.slug)?;
        non_negative("priceCents", self.price_cents)?;
        matches("currency", &self.currency, &CURRENCY_RE, "currency code")?;

        if self.media.len() != self.media_ids.len() {
            return Err(ValidationError::ConstraintViolation {
                constraint: "media".to_string(),
                reason: format!(
                    "{} resolved entries for {} references",
                    self.media.len(),
                    self.media_ids.len()
                ),
            });
        }
        for (id, item) in self.media_ids.iter().zip(&self.media) {
            if let Some(item) = item {
                same("media.id", id, &item.id)?;
                item.check()?;
            }
        }

        for variant in &self.variants {
            same("variants.productId", &self.id, &variant.product_id)?;
            variant.check()?;
        }
        Ok(())
    }
}

impl Schema for CachedCart {
    const NAME: &'static str = "CachedCart";

    fn check(&self) -> Result<(), ValidationError> {
        required("userId", self.user_id.as_str())?;
        quantity("quantity", self.quantity)?;
        same("product.id", &self.product_id, &self.product.id)?;
        if let Some(variant_id) = self.variant_id {
            if !self.product.variants.iter().any(|v| v.id == variant_id) {
                return Err(ValidationError::ConstraintViolation {
                    constraint: "variantId".to_string(),
                    reason: format!(
                        "variant {} is not part of product {}",
                        variant_id, self.product_id
                    ),
                });
            }
        }
        self.product.check()
    }
}

impl Schema for CachedWishlist {
    const NAME: &'static str = "CachedWishlist";

    fn check(&self) -> Result<(), ValidationError> {
        required("userId", self.user_id.as_str())?;
        same("product.id", &self.product_id, &self.product.id)?;
        self.product.check()
    }
}

impl Schema for Address {
    const NAME: &'static str = "Address";

    fn check(&self) -> Result<(), ValidationError> {
        required("userId", self.user_id.as_str())?;
        required("fullName", &self.full_name)?;
        required("line1", &self.line1)?;
        required("city", &self.city)?;
        required("postalCode", &self.postal_code)?;
        validate_country("country", &self.country)
    }
}

// ============================================================================
// WRITE INPUTS
// ============================================================================

/// Field rules for write inputs.
///
/// Every create and patch is checked before it reaches the relational store,
/// with the same field rules as the cached shape it produces. A row the cache
/// would reject therefore never exists relationally.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

fn optional(
    value: &Option<String>,
    rule: impl Fn(&str) -> Result<(), ValidationError>,
) -> Result<(), ValidationError> {
    value.as_deref().map_or(Ok(()), rule)
}

fn taxonomy(name: Option<&str>, slug: Option<&str>) -> Result<(), ValidationError> {
    if let Some(name) = name {
        required("name", name)?;
    }
    if let Some(slug) = slug {
        validate_slug("slug", slug)?;
    }
    Ok(())
}

impl Validate for NewCategory {
    fn validate(&self) -> Result<(), ValidationError> {
        taxonomy(Some(&self.name), Some(&self.slug))
    }
}

impl Validate for CategoryUpdate {
    fn validate(&self) -> Result<(), ValidationError> {
        taxonomy(self.name.as_deref(), self.slug.as_deref())
    }
}

impl Validate for NewSubcategory {
    fn validate(&self) -> Result<(), ValidationError> {
        taxonomy(Some(&self.name), Some(&self.slug))
    }
}

impl Validate for SubcategoryUpdate {
    fn validate(&self) -> Result<(), ValidationError> {
        taxonomy(self.name.as_deref(), self.slug.as_deref())
    }
}

impl Validate for NewProductType {
    fn validate(&self) -> Result<(), ValidationError> {
        taxonomy(Some(&self.name), Some(&self.slug))
    }
}

impl Validate for ProductTypeUpdate {
    fn validate(&self) -> Result<(), ValidationError> {
        taxonomy(self.name.as_deref(), self.slug.as_deref())
    }
}

impl Validate for NewMediaItem {
    fn validate(&self) -> Result<(), ValidationError> {
        required("id", self.id.as_str())?;
        validate_url("url", &self.url)?;
        validate_mime("mimeType", &self.mime_type)
    }
}

impl Validate for MediaItemUpdate {
    fn validate(&self) -> Result<(), ValidationError> {
        optional(&self.url, |url| validate_url("url", url))
    }
}

impl Validate for NewUserProfile {
    fn validate(&self) -> Result<(), ValidationError> {
        required("id", self.id.as_str())?;
        validate_email("email", &self.email)?;
        optional(&self.image, |image| validate_url("image", image))
    }
}

impl Validate for UserProfileUpdate {
    fn validate(&self) -> Result<(), ValidationError> {
        optional(&self.email, |email| validate_email("email", email))?;
        if let Some(image) = &self.image {
            optional(image, |image| validate_url("image", image))?;
        }
        Ok(())
    }
}

impl Validate for NewVariant {
    fn validate(&self) -> Result<(), ValidationError> {
        required("sku", &self.sku)?;
        if let Some(price) = self.price_cents {
            non_negative("priceCents", price)?;
        }
        non_negative("stock", i64::from(self.stock))
    }
}

impl Validate for NewProduct {
    fn validate(&self) -> Result<(), ValidationError> {
        required("title", &self.title)?;
        validate_slug("slug", &self.slug)?;
        non_negative("priceCents", self.price_cents)?;
        matches("currency", &self.currency, &CURRENCY_RE, "currency code")?;
        for id in &self.media_ids {
            required("mediaIds", id.as_str())?;
        }
        self.variants.iter().try_for_each(Validate::validate)
    }
}

impl Validate for NewCartLine {
    fn validate(&self) -> Result<(), ValidationError> {
        required("userId", self.user_id.as_str())?;
        quantity("quantity", self.quantity)
    }
}

impl Validate for CartLineUpdate {
    fn validate(&self) -> Result<(), ValidationError> {
        quantity("quantity", self.quantity)
    }
}

impl Validate for NewWishlistEntry {
    fn validate(&self) -> Result<(), ValidationError> {
        required("userId", self.user_id.as_str())
    }
}

impl Validate for NewAddress {
    fn validate(&self) -> Result<(), ValidationError> {
        required("userId", self.user_id.as_str())?;
        required("fullName", &self.full_name)?;
        required("line1", &self.line1)?;
        required("city", &self.city)?;
        required("postalCode", &self.postal_code)?;
        validate_country("country", &self.country)
    }
}

impl Validate for AddressUpdate {
    fn validate(&self) -> Result<(), ValidationError> {
        optional(&self.full_name, |v| required("fullName", v))?;
        optional(&self.line1, |v| required("line1", v))?;
        optional(&self.city, |v| required("city", v))?;
        optional(&self.postal_code, |v| required("postalCode", v))?;
        optional(&self.country, |v| validate_country("country", v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CategoryId, MediaId, ProductId, UserId, VariantId};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn ts() -> crate::Timestamp {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn media(id: &str) -> MediaItem {
        MediaItem {
            id: MediaId::new(id),
            url: format!("https://cdn.example.com/{}.jpg", id),
            alt: None,
            mime_type: "image/jpeg".to_string(),
            created_at: ts(),
        }
    }

    fn product() -> CachedProduct {
        let id = ProductId::generate();
        CachedProduct {
            id,
            product_type_id: None,
            title: "Linen shirt".to_string(),
            slug: "linen-shirt".to_string(),
            description: None,
            price_cents: 4900,
            currency: "EUR".to_string(),
            media_ids: vec![MediaId::new("m1"), MediaId::new("gone")],
            media: vec![Some(media("m1")), None],
            is_published: true,
            variants: vec![CachedVariant {
                id: VariantId::generate(),
                product_id: id,
                sku: "LS-M".to_string(),
                options: BTreeMap::from([("size".to_string(), "M".to_string())]),
                price_cents: None,
                stock: 3,
                image_id: Some(MediaId::new("gone")),
                image: None,
            }],
            created_at: ts(),
            updated_at: ts(),
        }
    }

    #[test]
    fn test_category_parse_round_trip() {
        let category = Category {
            id: CategoryId::generate(),
            name: "Shoes".to_string(),
            slug: "shoes".to_string(),
            description: Some("All shoes".to_string()),
            created_at: ts(),
            updated_at: ts(),
        };
        let raw = serde_json::to_value(&category).unwrap();
        assert_eq!(Category::parse_value(raw).unwrap(), category);
    }

    #[test]
    fn test_bad_slug_is_rejected() {
        let category = Category {
            id: CategoryId::generate(),
            name: "Shoes".to_string(),
            slug: "Shoes & Boots".to_string(),
            description: None,
            created_at: ts(),
            updated_at: ts(),
        };
        assert!(matches!(
            category.check(),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_malformed_json_is_absent_when_tolerant() {
        assert!(Category::safe_parse_str("{not json").is_none());
        assert!(Category::safe_parse_str(r#"{"id": 7}"#).is_none());
        assert!(matches!(
            Category::parse_str("[]"),
            Err(ValidationError::Malformed { .. })
        ));
    }

    #[test]
    fn test_product_with_unresolved_media_is_valid() {
        assert!(product().check().is_ok());
    }

    #[test]
    fn test_product_media_must_align_with_references() {
        let mut p = product();
        p.media.pop();
        assert!(matches!(
            p.check(),
            Err(ValidationError::ConstraintViolation { .. })
        ));

        let mut p = product();
        p.media[0] = Some(media("other"));
        assert!(matches!(
            p.check(),
            Err(ValidationError::RelationMismatch { .. })
        ));
    }

    #[test]
    fn test_cart_rules() {
        let product = product();
        let variant_id = product.variants[0].id;
        let mut cart = CachedCart {
            user_id: UserId::new("u1"),
            product_id: product.id,
            variant_id: Some(variant_id),
            quantity: 2,
            created_at: ts(),
            product,
        };
        assert!(cart.check().is_ok());

        cart.quantity = 0;
        assert!(cart.check().is_err());

        cart.quantity = 1;
        cart.variant_id = Some(VariantId::generate());
        assert!(matches!(
            cart.check(),
            Err(ValidationError::ConstraintViolation { .. })
        ));
    }

    #[test]
    fn test_user_email_rule() {
        let user = UserProfile {
            id: UserId::new("u1"),
            email: "not-an-email".to_string(),
            name: None,
            image: None,
            created_at: ts(),
            updated_at: ts(),
        };
        assert!(user.check().is_err());
    }

    #[test]
    fn test_inputs_follow_cached_shape_rules() {
        let category = NewCategory {
            name: "Summer".to_string(),
            slug: "Summer Sale".to_string(),
            description: None,
        };
        assert!(matches!(
            category.validate(),
            Err(ValidationError::InvalidValue { ref field, .. }) if field == "slug"
        ));

        let patch = CategoryUpdate {
            slug: Some("HATS".to_string()),
            ..CategoryUpdate::default()
        };
        assert!(patch.validate().is_err());
        assert!(CategoryUpdate::default().validate().is_ok());

        let media = NewMediaItem {
            id: MediaId::new("gone.png"),
            url: "s3://bucket/gone.png".to_string(),
            alt: None,
            mime_type: "image/png".to_string(),
        };
        assert!(media.validate().is_err());
    }

    #[test]
    fn test_optional_patch_fields() {
        let clear_image = UserProfileUpdate {
            image: Some(None),
            ..UserProfileUpdate::default()
        };
        assert!(clear_image.validate().is_ok());

        let bad_image = UserProfileUpdate {
            image: Some(Some("not a url".to_string())),
            ..UserProfileUpdate::default()
        };
        assert!(bad_image.validate().is_err());

        let address = AddressUpdate {
            country: Some("usa".to_string()),
            ..AddressUpdate::default()
        };
        assert!(address.validate().is_err());
        assert!(CartLineUpdate { quantity: 0 }.validate().is_err());
    }
}
