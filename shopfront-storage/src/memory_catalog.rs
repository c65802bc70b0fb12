//! In-memory relational catalog.
//!
//! Implements every [`RowSource`], [`RowWriter`] and [`RowUpdater`] the cache
//! families need, plus the [`AddressBook`], over a single lock. One write lock
//! stands in for a relational transaction, so multi-row invariants such as the
//! single primary address hold for every observer. Calls are counted per
//! family and operation for assertions in tests.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use shopfront_core::{
    Address, AddressId, AddressUpdate, CartLineUpdate, CartRow, Category, CategoryId,
    CategoryUpdate, EntityFamily, MediaId, MediaItem, MediaItemUpdate, NewAddress, NewCartLine,
    NewCategory, NewMediaItem, NewProduct, NewProductType, NewSubcategory, NewUserProfile,
    NewWishlistEntry, ProductId, ProductRow, ProductType, ProductTypeId, ProductTypeUpdate,
    Schema, ShopResult, StorageError, Subcategory, SubcategoryId, SubcategoryUpdate, Timestamp,
    UserId, UserProfile, UserProfileUpdate, Validate, VariantId, VariantRow, WishlistRow,
};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::cache::{
    CartFamily, CartLineKey, CategoryFamily, MediaFamily, ProductTypeFamily, SubcategoryFamily,
    UserFamily, WishlistFamily, WishlistKey,
};
use crate::relational::{AddressBook, RowSource, RowUpdater, RowWriter};

/// Relational operation, for call accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceOp {
    Count,
    Scan,
    Get,
    GetMany,
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone)]
struct CartLine {
    quantity: i32,
    created_at: Timestamp,
}

type CartTuple = (UserId, ProductId, Option<VariantId>);

#[derive(Debug, Default)]
struct CatalogData {
    categories: BTreeMap<CategoryId, Category>,
    subcategories: BTreeMap<SubcategoryId, Subcategory>,
    product_types: BTreeMap<ProductTypeId, ProductType>,
    media: BTreeMap<MediaId, MediaItem>,
    users: BTreeMap<UserId, UserProfile>,
    products: BTreeMap<ProductId, ProductRow>,
    cart: BTreeMap<CartTuple, CartLine>,
    wishlist: BTreeMap<(UserId, ProductId), Timestamp>,
    addresses: BTreeMap<AddressId, Address>,
}

impl CatalogData {
    fn cart_row(&self, (user, product, variant): &CartTuple, line: &CartLine) -> Option<CartRow> {
        Some(CartRow {
            user_id: user.clone(),
            product_id: *product,
            variant_id: *variant,
            quantity: line.quantity,
            created_at: line.created_at,
            product: self.products.get(product)?.clone(),
        })
    }

    fn wishlist_row(
        &self,
        user: &UserId,
        product: &ProductId,
        at: Timestamp,
    ) -> Option<WishlistRow> {
        Some(WishlistRow {
            user_id: user.clone(),
            product_id: *product,
            created_at: at,
            product: self.products.get(product)?.clone(),
        })
    }

    fn user_cart(&self, user: &UserId) -> impl Iterator<Item = (&CartTuple, &CartLine)> {
        let user = user.clone();
        self.cart.iter().filter(move |((u, _, _), _)| *u == user)
    }

    fn user_addresses<'a>(&'a self, user: &'a UserId) -> impl Iterator<Item = &'a Address> {
        self.addresses.values().filter(move |a| &a.user_id == user)
    }

    /// Clear the primary flag on every address of `user` except `keep`.
    fn clear_primary(&mut self, user: &UserId, keep: Option<AddressId>, now: Timestamp) {
        for address in self.addresses.values_mut() {
            if &address.user_id == user && address.is_primary && Some(address.id) != keep {
                address.is_primary = false;
                address.updated_at = now;
            }
        }
    }
}

/// In-memory relational catalog.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    data: RwLock<CatalogData>,
    calls: DashMap<(EntityFamily, SourceOp), u64>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `op` calls made for `family`.
    pub fn calls(&self, family: EntityFamily, op: SourceOp) -> u64 {
        self.calls.get(&(family, op)).map(|c| *c).unwrap_or(0)
    }

    /// Forget all recorded calls.
    pub fn reset_calls(&self) {
        self.calls.clear();
    }

    fn record(&self, family: EntityFamily, op: SourceOp) {
        *self.calls.entry((family, op)).or_insert(0) += 1;
    }

    fn read(&self) -> ShopResult<RwLockReadGuard<'_, CatalogData>> {
        Ok(self.data.read().map_err(|_| StorageError::LockPoisoned)?)
    }

    fn write(&self) -> ShopResult<RwLockWriteGuard<'_, CatalogData>> {
        Ok(self.data.write().map_err(|_| StorageError::LockPoisoned)?)
    }

    /// Insert a product with its variants. Products are not a cached family;
    /// they reach the cache only through cart and wishlist joins.
    pub fn insert_product(&self, input: NewProduct) -> ShopResult<ProductRow> {
        input.validate()?;
        let now = Utc::now();
        let id = ProductId::generate();
        let product = ProductRow {
            id,
            product_type_id: input.product_type_id,
            title: input.title,
            slug: input.slug,
            description: input.description,
            price_cents: input.price_cents,
            currency: input.currency,
            media_ids: input.media_ids,
            is_published: input.is_published,
            variants: input
                .variants
                .into_iter()
                .map(|v| VariantRow {
                    id: VariantId::generate(),
                    product_id: id,
                    sku: v.sku,
                    options: v.options,
                    price_cents: v.price_cents,
                    stock: v.stock,
                    image_id: v.image_id,
                })
                .collect(),
            created_at: now,
            updated_at: now,
        };
        self.write()?.products.insert(id, product.clone());
        Ok(product)
    }

    /// Delete a product, cascading to cart and wishlist lines.
    pub fn delete_product(&self, id: ProductId) -> ShopResult<bool> {
        let mut data = self.write()?;
        data.cart.retain(|(_, product, _), _| *product != id);
        data.wishlist.retain(|(_, product), _| *product != id);
        Ok(data.products.remove(&id).is_some())
    }
}

fn not_found(entity: &str, id: impl ToString) -> StorageError {
    StorageError::NotFound {
        entity: entity.to_string(),
        id: id.to_string(),
    }
}

fn insert_failed(entity: &str, reason: impl Into<String>) -> StorageError {
    StorageError::InsertFailed {
        entity: entity.to_string(),
        reason: reason.into(),
    }
}

// ============================================================================
// CATEGORIES, SUBCATEGORIES, PRODUCT TYPES
// ============================================================================

#[async_trait]
impl RowSource<CategoryFamily> for MemoryCatalog {
    async fn count(&self, _scope: &()) -> ShopResult<u64> {
        self.record(EntityFamily::Category, SourceOp::Count);
        Ok(self.read()?.categories.len() as u64)
    }

    async fn scan(&self, _scope: &()) -> ShopResult<Vec<Category>> {
        self.record(EntityFamily::Category, SourceOp::Scan);
        Ok(self.read()?.categories.values().cloned().collect())
    }

    async fn get(&self, id: &CategoryId) -> ShopResult<Option<Category>> {
        self.record(EntityFamily::Category, SourceOp::Get);
        Ok(self.read()?.categories.get(id).cloned())
    }
}

#[async_trait]
impl RowWriter<CategoryFamily> for MemoryCatalog {
    type Create = NewCategory;

    async fn create(&self, input: NewCategory) -> ShopResult<Category> {
        self.record(EntityFamily::Category, SourceOp::Create);
        input.validate()?;
        let mut data = self.write()?;
        if data.categories.values().any(|c| c.slug == input.slug) {
            let reason = format!("slug {} already exists", input.slug);
            return Err(insert_failed("category", reason).into());
        }
        let now = Utc::now();
        let category = Category {
            id: CategoryId::generate(),
            name: input.name,
            slug: input.slug,
            description: input.description,
            created_at: now,
            updated_at: now,
        };
        data.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn delete(&self, id: &CategoryId) -> ShopResult<bool> {
        self.record(EntityFamily::Category, SourceOp::Delete);
        let mut data = self.write()?;
        if data.subcategories.values().any(|s| s.category_id == *id) {
            return Err(StorageError::DeleteFailed {
                entity: "category".to_string(),
                id: id.to_string(),
                reason: "category still has subcategories".to_string(),
            }
            .into());
        }
        Ok(data.categories.remove(id).is_some())
    }
}

#[async_trait]
impl RowUpdater<CategoryFamily> for MemoryCatalog {
    type Update = CategoryUpdate;

    async fn update(&self, id: &CategoryId, patch: CategoryUpdate) -> ShopResult<Option<Category>> {
        self.record(EntityFamily::Category, SourceOp::Update);
        patch.validate()?;
        let mut data = self.write()?;
        let Some(category) = data.categories.get_mut(id) else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            category.name = name;
        }
        if let Some(slug) = patch.slug {
            category.slug = slug;
        }
        if let Some(description) = patch.description {
            category.description = description;
        }
        category.updated_at = Utc::now();
        Ok(Some(category.clone()))
    }
}

#[async_trait]
impl RowSource<SubcategoryFamily> for MemoryCatalog {
    async fn count(&self, _scope: &()) -> ShopResult<u64> {
        self.record(EntityFamily::Subcategory, SourceOp::Count);
        Ok(self.read()?.subcategories.len() as u64)
    }

    async fn scan(&self, _scope: &()) -> ShopResult<Vec<Subcategory>> {
        self.record(EntityFamily::Subcategory, SourceOp::Scan);
        Ok(self.read()?.subcategories.values().cloned().collect())
    }

    async fn get(&self, id: &SubcategoryId) -> ShopResult<Option<Subcategory>> {
        self.record(EntityFamily::Subcategory, SourceOp::Get);
        Ok(self.read()?.subcategories.get(id).cloned())
    }
}

#[async_trait]
impl RowWriter<SubcategoryFamily> for MemoryCatalog {
    type Create = NewSubcategory;

    async fn create(&self, input: NewSubcategory) -> ShopResult<Subcategory> {
        self.record(EntityFamily::Subcategory, SourceOp::Create);
        input.validate()?;
        let mut data = self.write()?;
        if !data.categories.contains_key(&input.category_id) {
            return Err(not_found("category", input.category_id).into());
        }
        let now = Utc::now();
        let subcategory = Subcategory {
            id: SubcategoryId::generate(),
            category_id: input.category_id,
            name: input.name,
            slug: input.slug,
            created_at: now,
            updated_at: now,
        };
        data.subcategories.insert(subcategory.id, subcategory.clone());
        Ok(subcategory)
    }

    async fn delete(&self, id: &SubcategoryId) -> ShopResult<bool> {
        self.record(EntityFamily::Subcategory, SourceOp::Delete);
        let mut data = self.write()?;
        if data.product_types.values().any(|p| p.subcategory_id == *id) {
            return Err(StorageError::DeleteFailed {
                entity: "subcategory".to_string(),
                id: id.to_string(),
                reason: "subcategory still has product types".to_string(),
            }
            .into());
        }
        Ok(data.subcategories.remove(id).is_some())
    }
}

#[async_trait]
impl RowUpdater<SubcategoryFamily> for MemoryCatalog {
    type Update = SubcategoryUpdate;

    async fn update(
        &self,
        id: &SubcategoryId,
        patch: SubcategoryUpdate,
    ) -> ShopResult<Option<Subcategory>> {
        self.record(EntityFamily::Subcategory, SourceOp::Update);
        patch.validate()?;
        let mut data = self.write()?;
        if let Some(category_id) = patch.category_id {
            if !data.categories.contains_key(&category_id) {
                return Err(not_found("category", category_id).into());
            }
        }
        let Some(subcategory) = data.subcategories.get_mut(id) else {
            return Ok(None);
        };
        if let Some(category_id) = patch.category_id {
            subcategory.category_id = category_id;
        }
        if let Some(name) = patch.name {
            subcategory.name = name;
        }
        if let Some(slug) = patch.slug {
            subcategory.slug = slug;
        }
        subcategory.updated_at = Utc::now();
        Ok(Some(subcategory.clone()))
    }
}

#[async_trait]
impl RowSource<ProductTypeFamily> for MemoryCatalog {
    async fn count(&self, _scope: &()) -> ShopResult<u64> {
        self.record(EntityFamily::ProductType, SourceOp::Count);
        Ok(self.read()?.product_types.len() as u64)
    }

    async fn scan(&self, _scope: &()) -> ShopResult<Vec<ProductType>> {
        self.record(EntityFamily::ProductType, SourceOp::Scan);
        Ok(self.read()?.product_types.values().cloned().collect())
    }

    async fn get(&self, id: &ProductTypeId) -> ShopResult<Option<ProductType>> {
        self.record(EntityFamily::ProductType, SourceOp::Get);
        Ok(self.read()?.product_types.get(id).cloned())
    }
}

#[async_trait]
impl RowWriter<ProductTypeFamily> for MemoryCatalog {
    type Create = NewProductType;

    async fn create(&self, input: NewProductType) -> ShopResult<ProductType> {
        self.record(EntityFamily::ProductType, SourceOp::Create);
        input.validate()?;
        let mut data = self.write()?;
        if !data.subcategories.contains_key(&input.subcategory_id) {
            return Err(not_found("subcategory", input.subcategory_id).into());
        }
        let now = Utc::now();
        let product_type = ProductType {
            id: ProductTypeId::generate(),
            subcategory_id: input.subcategory_id,
            name: input.name,
            slug: input.slug,
            created_at: now,
            updated_at: now,
        };
        data.product_types.insert(product_type.id, product_type.clone());
        Ok(product_type)
    }

    async fn delete(&self, id: &ProductTypeId) -> ShopResult<bool> {
        self.record(EntityFamily::ProductType, SourceOp::Delete);
        let mut data = self.write()?;
        for product in data.products.values_mut() {
            if product.product_type_id == Some(*id) {
                product.product_type_id = None;
            }
        }
        Ok(data.product_types.remove(id).is_some())
    }
}

#[async_trait]
impl RowUpdater<ProductTypeFamily> for MemoryCatalog {
    type Update = ProductTypeUpdate;

    async fn update(
        &self,
        id: &ProductTypeId,
        patch: ProductTypeUpdate,
    ) -> ShopResult<Option<ProductType>> {
        self.record(EntityFamily::ProductType, SourceOp::Update);
        patch.validate()?;
        let mut data = self.write()?;
        if let Some(subcategory_id) = patch.subcategory_id {
            if !data.subcategories.contains_key(&subcategory_id) {
                return Err(not_found("subcategory", subcategory_id).into());
            }
        }
        let Some(product_type) = data.product_types.get_mut(id) else {
            return Ok(None);
        };
        if let Some(subcategory_id) = patch.subcategory_id {
            product_type.subcategory_id = subcategory_id;
        }
        if let Some(name) = patch.name {
            product_type.name = name;
        }
        if let Some(slug) = patch.slug {
            product_type.slug = slug;
        }
        product_type.updated_at = Utc::now();
        Ok(Some(product_type.clone()))
    }
}

// ============================================================================
// MEDIA AND USERS
// ============================================================================

#[async_trait]
impl RowSource<MediaFamily> for MemoryCatalog {
    async fn count(&self, _scope: &()) -> ShopResult<u64> {
        self.record(EntityFamily::MediaItem, SourceOp::Count);
        Ok(self.read()?.media.len() as u64)
    }

    async fn scan(&self, _scope: &()) -> ShopResult<Vec<MediaItem>> {
        self.record(EntityFamily::MediaItem, SourceOp::Scan);
        Ok(self.read()?.media.values().cloned().collect())
    }

    async fn get(&self, id: &MediaId) -> ShopResult<Option<MediaItem>> {
        self.record(EntityFamily::MediaItem, SourceOp::Get);
        Ok(self.read()?.media.get(id).cloned())
    }

    async fn get_many(&self, ids: &[MediaId]) -> ShopResult<Vec<MediaItem>> {
        self.record(EntityFamily::MediaItem, SourceOp::GetMany);
        let data = self.read()?;
        Ok(ids.iter().filter_map(|id| data.media.get(id).cloned()).collect())
    }
}

#[async_trait]
impl RowWriter<MediaFamily> for MemoryCatalog {
    type Create = NewMediaItem;

    async fn create(&self, input: NewMediaItem) -> ShopResult<MediaItem> {
        self.record(EntityFamily::MediaItem, SourceOp::Create);
        input.validate()?;
        let mut data = self.write()?;
        if data.media.contains_key(&input.id) {
            return Err(insert_failed("media", format!("media {} already exists", input.id)).into());
        }
        let item = MediaItem {
            id: input.id,
            url: input.url,
            alt: input.alt,
            mime_type: input.mime_type,
            created_at: Utc::now(),
        };
        data.media.insert(item.id.clone(), item.clone());
        Ok(item)
    }

    /// Products keep their references; they resolve to nothing from now on.
    async fn delete(&self, id: &MediaId) -> ShopResult<bool> {
        self.record(EntityFamily::MediaItem, SourceOp::Delete);
        Ok(self.write()?.media.remove(id).is_some())
    }
}

#[async_trait]
impl RowUpdater<MediaFamily> for MemoryCatalog {
    type Update = MediaItemUpdate;

    async fn update(&self, id: &MediaId, patch: MediaItemUpdate) -> ShopResult<Option<MediaItem>> {
        self.record(EntityFamily::MediaItem, SourceOp::Update);
        patch.validate()?;
        let mut data = self.write()?;
        let Some(item) = data.media.get_mut(id) else {
            return Ok(None);
        };
        if let Some(url) = patch.url {
            item.url = url;
        }
        if let Some(alt) = patch.alt {
            item.alt = alt;
        }
        Ok(Some(item.clone()))
    }
}

#[async_trait]
impl RowSource<UserFamily> for MemoryCatalog {
    async fn count(&self, _scope: &()) -> ShopResult<u64> {
        self.record(EntityFamily::User, SourceOp::Count);
        Ok(self.read()?.users.len() as u64)
    }

    async fn scan(&self, _scope: &()) -> ShopResult<Vec<UserProfile>> {
        self.record(EntityFamily::User, SourceOp::Scan);
        Ok(self.read()?.users.values().cloned().collect())
    }

    async fn get(&self, id: &UserId) -> ShopResult<Option<UserProfile>> {
        self.record(EntityFamily::User, SourceOp::Get);
        Ok(self.read()?.users.get(id).cloned())
    }
}

#[async_trait]
impl RowWriter<UserFamily> for MemoryCatalog {
    type Create = NewUserProfile;

    async fn create(&self, input: NewUserProfile) -> ShopResult<UserProfile> {
        self.record(EntityFamily::User, SourceOp::Create);
        input.validate()?;
        let mut data = self.write()?;
        if data.users.contains_key(&input.id) {
            return Err(insert_failed("user", format!("user {} already exists", input.id)).into());
        }
        let now = Utc::now();
        let user = UserProfile {
            id: input.id,
            email: input.email,
            name: input.name,
            image: input.image,
            created_at: now,
            updated_at: now,
        };
        data.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    /// Cascades to the user's cart, wishlist and addresses.
    async fn delete(&self, id: &UserId) -> ShopResult<bool> {
        self.record(EntityFamily::User, SourceOp::Delete);
        let mut data = self.write()?;
        data.cart.retain(|(user, _, _), _| user != id);
        data.wishlist.retain(|(user, _), _| user != id);
        data.addresses.retain(|_, a| &a.user_id != id);
        Ok(data.users.remove(id).is_some())
    }
}

#[async_trait]
impl RowUpdater<UserFamily> for MemoryCatalog {
    type Update = UserProfileUpdate;

    async fn update(
        &self,
        id: &UserId,
        patch: UserProfileUpdate,
    ) -> ShopResult<Option<UserProfile>> {
        self.record(EntityFamily::User, SourceOp::Update);
        patch.validate()?;
        let mut data = self.write()?;
        let Some(user) = data.users.get_mut(id) else {
            return Ok(None);
        };
        if let Some(email) = patch.email {
            user.email = email;
        }
        if let Some(name) = patch.name {
            user.name = name;
        }
        if let Some(image) = patch.image {
            user.image = image;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }
}

// ============================================================================
// CART AND WISHLIST
// ============================================================================

#[async_trait]
impl RowSource<CartFamily> for MemoryCatalog {
    async fn count(&self, user: &UserId) -> ShopResult<u64> {
        self.record(EntityFamily::Cart, SourceOp::Count);
        Ok(self.read()?.user_cart(user).count() as u64)
    }

    async fn scan(&self, user: &UserId) -> ShopResult<Vec<CartRow>> {
        self.record(EntityFamily::Cart, SourceOp::Scan);
        let data = self.read()?;
        Ok(data
            .user_cart(user)
            .filter_map(|(key, line)| data.cart_row(key, line))
            .collect())
    }

    async fn get(&self, line: &CartLineKey) -> ShopResult<Option<CartRow>> {
        self.record(EntityFamily::Cart, SourceOp::Get);
        let data = self.read()?;
        let key = (line.user_id.clone(), line.product_id, line.variant_id);
        Ok(data
            .cart
            .get(&key)
            .and_then(|cart_line| data.cart_row(&key, cart_line)))
    }
}

#[async_trait]
impl RowWriter<CartFamily> for MemoryCatalog {
    type Create = NewCartLine;

    /// Adding a line that already exists increases its quantity.
    async fn create(&self, input: NewCartLine) -> ShopResult<CartRow> {
        self.record(EntityFamily::Cart, SourceOp::Create);
        input.validate()?;
        let mut data = self.write()?;
        let Some(product) = data.products.get(&input.product_id) else {
            return Err(not_found("product", input.product_id).into());
        };
        if let Some(variant_id) = input.variant_id {
            if !product.variants.iter().any(|v| v.id == variant_id) {
                return Err(not_found("variant", variant_id).into());
            }
        }

        let key = (input.user_id, input.product_id, input.variant_id);
        let line = data
            .cart
            .entry(key.clone())
            .and_modify(|line| line.quantity += input.quantity)
            .or_insert_with(|| CartLine {
                quantity: input.quantity,
                created_at: Utc::now(),
            })
            .clone();
        data.cart_row(&key, &line)
            .ok_or_else(|| not_found("product", key.1).into())
    }

    async fn delete(&self, line: &CartLineKey) -> ShopResult<bool> {
        self.record(EntityFamily::Cart, SourceOp::Delete);
        let key = (line.user_id.clone(), line.product_id, line.variant_id);
        Ok(self.write()?.cart.remove(&key).is_some())
    }
}

#[async_trait]
impl RowUpdater<CartFamily> for MemoryCatalog {
    type Update = CartLineUpdate;

    async fn update(
        &self,
        line: &CartLineKey,
        patch: CartLineUpdate,
    ) -> ShopResult<Option<CartRow>> {
        self.record(EntityFamily::Cart, SourceOp::Update);
        patch.validate()?;
        let mut data = self.write()?;
        let key = (line.user_id.clone(), line.product_id, line.variant_id);
        let Some(cart_line) = data.cart.get_mut(&key) else {
            return Ok(None);
        };
        cart_line.quantity = patch.quantity;
        let cart_line = cart_line.clone();
        Ok(data.cart_row(&key, &cart_line))
    }
}

#[async_trait]
impl RowSource<WishlistFamily> for MemoryCatalog {
    async fn count(&self, user: &UserId) -> ShopResult<u64> {
        self.record(EntityFamily::Wishlist, SourceOp::Count);
        Ok(self
            .read()?
            .wishlist
            .keys()
            .filter(|(u, _)| u == user)
            .count() as u64)
    }

    async fn scan(&self, user: &UserId) -> ShopResult<Vec<WishlistRow>> {
        self.record(EntityFamily::Wishlist, SourceOp::Scan);
        let data = self.read()?;
        Ok(data
            .wishlist
            .iter()
            .filter(|((u, _), _)| u == user)
            .filter_map(|((u, p), at)| data.wishlist_row(u, p, *at))
            .collect())
    }

    async fn get(&self, entry: &WishlistKey) -> ShopResult<Option<WishlistRow>> {
        self.record(EntityFamily::Wishlist, SourceOp::Get);
        let data = self.read()?;
        Ok(data
            .wishlist
            .get(&(entry.user_id.clone(), entry.product_id))
            .and_then(|at| data.wishlist_row(&entry.user_id, &entry.product_id, *at)))
    }
}

#[async_trait]
impl RowWriter<WishlistFamily> for MemoryCatalog {
    type Create = NewWishlistEntry;

    /// Adding an entry that already exists returns it unchanged.
    async fn create(&self, input: NewWishlistEntry) -> ShopResult<WishlistRow> {
        self.record(EntityFamily::Wishlist, SourceOp::Create);
        input.validate()?;
        let mut data = self.write()?;
        if !data.products.contains_key(&input.product_id) {
            return Err(not_found("product", input.product_id).into());
        }
        let at = *data
            .wishlist
            .entry((input.user_id.clone(), input.product_id))
            .or_insert_with(Utc::now);
        data.wishlist_row(&input.user_id, &input.product_id, at)
            .ok_or_else(|| not_found("product", input.product_id).into())
    }

    async fn delete(&self, entry: &WishlistKey) -> ShopResult<bool> {
        self.record(EntityFamily::Wishlist, SourceOp::Delete);
        Ok(self
            .write()?
            .wishlist
            .remove(&(entry.user_id.clone(), entry.product_id))
            .is_some())
    }
}

// ============================================================================
// ADDRESS BOOK
// ============================================================================

fn address_order(a: &Address, b: &Address) -> std::cmp::Ordering {
    b.is_primary
        .cmp(&a.is_primary)
        .then(b.created_at.cmp(&a.created_at))
        .then(b.id.cmp(&a.id))
}

#[async_trait]
impl AddressBook for MemoryCatalog {
    async fn list_addresses(&self, user: &UserId) -> ShopResult<Vec<Address>> {
        let data = self.read()?;
        let mut addresses: Vec<Address> = data.user_addresses(user).cloned().collect();
        addresses.sort_by(address_order);
        Ok(addresses)
    }

    async fn get_address(&self, id: AddressId) -> ShopResult<Option<Address>> {
        Ok(self.read()?.addresses.get(&id).cloned())
    }

    async fn create_address(&self, input: NewAddress) -> ShopResult<Address> {
        let mut data = self.write()?;
        let now = Utc::now();
        let first = data.user_addresses(&input.user_id).next().is_none();
        let address = Address {
            id: AddressId::generate(),
            user_id: input.user_id,
            full_name: input.full_name,
            line1: input.line1,
            line2: input.line2,
            city: input.city,
            region: input.region,
            postal_code: input.postal_code,
            country: input.country,
            phone: input.phone,
            is_primary: input.is_primary || first,
            created_at: now,
            updated_at: now,
        };
        address.check()?;
        if address.is_primary {
            data.clear_primary(&address.user_id, None, now);
        }
        data.addresses.insert(address.id, address.clone());
        Ok(address)
    }

    async fn update_address(
        &self,
        id: AddressId,
        patch: AddressUpdate,
    ) -> ShopResult<Option<Address>> {
        let mut data = self.write()?;
        let now = Utc::now();
        let Some(mut address) = data.addresses.get(&id).cloned() else {
            return Ok(None);
        };
        address.apply(&patch, now);
        address.check()?;

        if patch.is_primary == Some(true) {
            data.clear_primary(&address.user_id, Some(id), now);
            address.is_primary = true;
        }
        data.addresses.insert(id, address.clone());
        Ok(Some(address))
    }

    async fn set_primary_address(&self, id: AddressId) -> ShopResult<Option<Address>> {
        self.update_address(
            id,
            AddressUpdate {
                is_primary: Some(true),
                ..AddressUpdate::default()
            },
        )
        .await
    }

    async fn delete_address(&self, id: AddressId) -> ShopResult<bool> {
        let mut data = self.write()?;
        let Some(removed) = data.addresses.remove(&id) else {
            return Ok(false);
        };
        if removed.is_primary {
            let successor = data
                .user_addresses(&removed.user_id)
                .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
                .map(|a| a.id);
            if let Some(successor) = successor.and_then(|id| data.addresses.get_mut(&id)) {
                successor.is_primary = true;
                successor.updated_at = Utc::now();
            }
        }
        Ok(true)
    }
}
