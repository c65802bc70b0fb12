//! Taxonomy, media and user providers.

use async_trait::async_trait;
use chrono::Utc;
use shopfront_core::{
    Category, CategoryId, CategoryUpdate, MediaId, MediaItem, MediaItemUpdate, NewCategory,
    NewMediaItem, NewProductType, NewSubcategory, NewUserProfile, ProductType, ProductTypeId,
    ProductTypeUpdate, ShopResult, Subcategory, SubcategoryId, SubcategoryUpdate, UserId,
    UserProfile, UserProfileUpdate, Validate,
};
use shopfront_storage::{
    CategoryFamily, MediaFamily, ProductTypeFamily, RowSource, RowUpdater, RowWriter,
    SubcategoryFamily, UserFamily,
};

use crate::db::{
    category_from_row, media_from_row, product_type_from_row, subcategory_from_row, user_from_row,
    DbClient,
};
use crate::error::DbError;

// ============================================================================
// CATEGORIES
// ============================================================================

#[async_trait]
impl RowSource<CategoryFamily> for DbClient {
    async fn count(&self, _scope: &()) -> ShopResult<u64> {
        Ok(self.count_where("SELECT count(*) FROM categories", &[]).await?)
    }

    async fn scan(&self, _scope: &()) -> ShopResult<Vec<Category>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(concat!("SELECT ", category_columns!(), " FROM categories"), &[])
            .await
            .map_err(DbError::from)?;
        Ok(rows.iter().map(category_from_row).collect())
    }

    async fn get(&self, id: &CategoryId) -> ShopResult<Option<Category>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                concat!("SELECT ", category_columns!(), " FROM categories WHERE id = $1"),
                &[&id.0],
            )
            .await
            .map_err(DbError::from)?;
        Ok(row.as_ref().map(category_from_row))
    }
}

#[async_trait]
impl RowWriter<CategoryFamily> for DbClient {
    type Create = NewCategory;

    async fn create(&self, input: NewCategory) -> ShopResult<Category> {
        input.validate()?;
        let conn = self.get_conn().await?;
        let now = Utc::now();
        let row = conn
            .query_one(
                concat!(
                    "INSERT INTO categories (id, name, slug, description, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $5) RETURNING ",
                    category_columns!()
                ),
                &[&CategoryId::generate().0, &input.name, &input.slug, &input.description, &now],
            )
            .await
            .map_err(DbError::from)?;
        Ok(category_from_row(&row))
    }

    async fn delete(&self, id: &CategoryId) -> ShopResult<bool> {
        let conn = self.get_conn().await?;
        let deleted = conn
            .execute("DELETE FROM categories WHERE id = $1", &[&id.0])
            .await
            .map_err(DbError::from)?;
        Ok(deleted > 0)
    }
}

#[async_trait]
impl RowUpdater<CategoryFamily> for DbClient {
    type Update = CategoryUpdate;

    async fn update(&self, id: &CategoryId, patch: CategoryUpdate) -> ShopResult<Option<Category>> {
        patch.validate()?;
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                concat!(
                    "UPDATE categories SET \
                       name = COALESCE($2, name), \
                       slug = COALESCE($3, slug), \
                       description = CASE WHEN $4 THEN $5 ELSE description END, \
                       updated_at = $6 \
                     WHERE id = $1 RETURNING ",
                    category_columns!()
                ),
                &[
                    &id.0,
                    &patch.name,
                    &patch.slug,
                    &patch.description.is_some(),
                    &patch.description.flatten(),
                    &Utc::now(),
                ],
            )
            .await
            .map_err(DbError::from)?;
        Ok(row.as_ref().map(category_from_row))
    }
}

// ============================================================================
// SUBCATEGORIES
// ============================================================================

#[async_trait]
impl RowSource<SubcategoryFamily> for DbClient {
    async fn count(&self, _scope: &()) -> ShopResult<u64> {
        Ok(self.count_where("SELECT count(*) FROM subcategories", &[]).await?)
    }

    async fn scan(&self, _scope: &()) -> ShopResult<Vec<Subcategory>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(concat!("SELECT ", subcategory_columns!(), " FROM subcategories"), &[])
            .await
            .map_err(DbError::from)?;
        Ok(rows.iter().map(subcategory_from_row).collect())
    }

    async fn get(&self, id: &SubcategoryId) -> ShopResult<Option<Subcategory>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                concat!("SELECT ", subcategory_columns!(), " FROM subcategories WHERE id = $1"),
                &[&id.0],
            )
            .await
            .map_err(DbError::from)?;
        Ok(row.as_ref().map(subcategory_from_row))
    }
}

#[async_trait]
impl RowWriter<SubcategoryFamily> for DbClient {
    type Create = NewSubcategory;

    async fn create(&self, input: NewSubcategory) -> ShopResult<Subcategory> {
        input.validate()?;
        let conn = self.get_conn().await?;
        let now = Utc::now();
        let row = conn
            .query_one(
                concat!(
                    "INSERT INTO subcategories \
                       (id, category_id, name, slug, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $5) RETURNING ",
                    subcategory_columns!()
                ),
                &[
                    &SubcategoryId::generate().0,
                    &input.category_id.0,
                    &input.name,
                    &input.slug,
                    &now,
                ],
            )
            .await
            .map_err(DbError::from)?;
        Ok(subcategory_from_row(&row))
    }

    async fn delete(&self, id: &SubcategoryId) -> ShopResult<bool> {
        let conn = self.get_conn().await?;
        let deleted = conn
            .execute("DELETE FROM subcategories WHERE id = $1", &[&id.0])
            .await
            .map_err(DbError::from)?;
        Ok(deleted > 0)
    }
}

#[async_trait]
impl RowUpdater<SubcategoryFamily> for DbClient {
    type Update = SubcategoryUpdate;

    async fn update(
        &self,
        id: &SubcategoryId,
        patch: SubcategoryUpdate,
    ) -> ShopResult<Option<Subcategory>> {
        patch.validate()?;
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                concat!(
                    "UPDATE subcategories SET \
                       category_id = COALESCE($2, category_id), \
                       name = COALESCE($3, name), \
                       slug = COALESCE($4, slug), \
                       updated_at = $5 \
                     WHERE id = $1 RETURNING ",
                    subcategory_columns!()
                ),
                &[
                    &id.0,
                    &patch.category_id.map(|c| c.0),
                    &patch.name,
                    &patch.slug,
                    &Utc::now(),
                ],
            )
            .await
            .map_err(DbError::from)?;
        Ok(row.as_ref().map(subcategory_from_row))
    }
}

// ============================================================================
// PRODUCT TYPES
// ============================================================================

#[async_trait]
impl RowSource<ProductTypeFamily> for DbClient {
    async fn count(&self, _scope: &()) -> ShopResult<u64> {
        Ok(self.count_where("SELECT count(*) FROM product_types", &[]).await?)
    }

    async fn scan(&self, _scope: &()) -> ShopResult<Vec<ProductType>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(concat!("SELECT ", product_type_columns!(), " FROM product_types"), &[])
            .await
            .map_err(DbError::from)?;
        Ok(rows.iter().map(product_type_from_row).collect())
    }

    async fn get(&self, id: &ProductTypeId) -> ShopResult<Option<ProductType>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                concat!("SELECT ", product_type_columns!(), " FROM product_types WHERE id = $1"),
                &[&id.0],
            )
            .await
            .map_err(DbError::from)?;
        Ok(row.as_ref().map(product_type_from_row))
    }
}

#[async_trait]
impl RowWriter<ProductTypeFamily> for DbClient {
    type Create = NewProductType;

    async fn create(&self, input: NewProductType) -> ShopResult<ProductType> {
        input.validate()?;
        let conn = self.get_conn().await?;
        let now = Utc::now();
        let row = conn
            .query_one(
                concat!(
                    "INSERT INTO product_types \
                       (id, subcategory_id, name, slug, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $5) RETURNING ",
                    product_type_columns!()
                ),
                &[
                    &ProductTypeId::generate().0,
                    &input.subcategory_id.0,
                    &input.name,
                    &input.slug,
                    &now,
                ],
            )
            .await
            .map_err(DbError::from)?;
        Ok(product_type_from_row(&row))
    }

    /// Products of this type keep existing with no type.
    async fn delete(&self, id: &ProductTypeId) -> ShopResult<bool> {
        let conn = self.get_conn().await?;
        let deleted = conn
            .execute("DELETE FROM product_types WHERE id = $1", &[&id.0])
            .await
            .map_err(DbError::from)?;
        Ok(deleted > 0)
    }
}

#[async_trait]
impl RowUpdater<ProductTypeFamily> for DbClient {
    type Update = ProductTypeUpdate;

    async fn update(
        &self,
        id: &ProductTypeId,
        patch: ProductTypeUpdate,
    ) -> ShopResult<Option<ProductType>> {
        patch.validate()?;
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                concat!(
                    "UPDATE product_types SET \
                       subcategory_id = COALESCE($2, subcategory_id), \
                       name = COALESCE($3, name), \
                       slug = COALESCE($4, slug), \
                       updated_at = $5 \
                     WHERE id = $1 RETURNING ",
                    product_type_columns!()
                ),
                &[
                    &id.0,
                    &patch.subcategory_id.map(|s| s.0),
                    &patch.name,
                    &patch.slug,
                    &Utc::now(),
                ],
            )
            .await
            .map_err(DbError::from)?;
        Ok(row.as_ref().map(product_type_from_row))
    }
}

// ============================================================================
// MEDIA
// ============================================================================

#[async_trait]
impl RowSource<MediaFamily> for DbClient {
    async fn count(&self, _scope: &()) -> ShopResult<u64> {
        Ok(self.count_where("SELECT count(*) FROM media", &[]).await?)
    }

    async fn scan(&self, _scope: &()) -> ShopResult<Vec<MediaItem>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(concat!("SELECT ", media_columns!(), " FROM media"), &[])
            .await
            .map_err(DbError::from)?;
        Ok(rows.iter().map(media_from_row).collect())
    }

    async fn get(&self, id: &MediaId) -> ShopResult<Option<MediaItem>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                concat!("SELECT ", media_columns!(), " FROM media WHERE id = $1"),
                &[&id.as_str()],
            )
            .await
            .map_err(DbError::from)?;
        Ok(row.as_ref().map(media_from_row))
    }

    async fn get_many(&self, ids: &[MediaId]) -> ShopResult<Vec<MediaItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<&str> = ids.iter().map(MediaId::as_str).collect();
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                concat!("SELECT ", media_columns!(), " FROM media WHERE id = ANY($1)"),
                &[&ids],
            )
            .await
            .map_err(DbError::from)?;
        Ok(rows.iter().map(media_from_row).collect())
    }
}

#[async_trait]
impl RowWriter<MediaFamily> for DbClient {
    type Create = NewMediaItem;

    async fn create(&self, input: NewMediaItem) -> ShopResult<MediaItem> {
        input.validate()?;
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                concat!(
                    "INSERT INTO media (id, url, alt, mime_type, created_at) \
                     VALUES ($1, $2, $3, $4, $5) RETURNING ",
                    media_columns!()
                ),
                &[
                    &input.id.as_str(),
                    &input.url,
                    &input.alt,
                    &input.mime_type,
                    &Utc::now(),
                ],
            )
            .await
            .map_err(DbError::from)?;
        Ok(media_from_row(&row))
    }

    /// Product references are left in place and resolve to nothing.
    async fn delete(&self, id: &MediaId) -> ShopResult<bool> {
        let conn = self.get_conn().await?;
        let deleted = conn
            .execute("DELETE FROM media WHERE id = $1", &[&id.as_str()])
            .await
            .map_err(DbError::from)?;
        Ok(deleted > 0)
    }
}

#[async_trait]
impl RowUpdater<MediaFamily> for DbClient {
    type Update = MediaItemUpdate;

    async fn update(&self, id: &MediaId, patch: MediaItemUpdate) -> ShopResult<Option<MediaItem>> {
        patch.validate()?;
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                concat!(
                    "UPDATE media SET \
                       url = COALESCE($2, url), \
                       alt = CASE WHEN $3 THEN $4 ELSE alt END \
                     WHERE id = $1 RETURNING ",
                    media_columns!()
                ),
                &[&id.as_str(), &patch.url, &patch.alt.is_some(), &patch.alt.flatten()],
            )
            .await
            .map_err(DbError::from)?;
        Ok(row.as_ref().map(media_from_row))
    }
}

// ============================================================================
// USERS
// ============================================================================

#[async_trait]
impl RowSource<UserFamily> for DbClient {
    async fn count(&self, _scope: &()) -> ShopResult<u64> {
        Ok(self.count_where("SELECT count(*) FROM users", &[]).await?)
    }

    async fn scan(&self, _scope: &()) -> ShopResult<Vec<UserProfile>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(concat!("SELECT ", user_columns!(), " FROM users"), &[])
            .await
            .map_err(DbError::from)?;
        Ok(rows.iter().map(user_from_row).collect())
    }

    async fn get(&self, id: &UserId) -> ShopResult<Option<UserProfile>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                concat!("SELECT ", user_columns!(), " FROM users WHERE id = $1"),
                &[&id.as_str()],
            )
            .await
            .map_err(DbError::from)?;
        Ok(row.as_ref().map(user_from_row))
    }
}

#[async_trait]
impl RowWriter<UserFamily> for DbClient {
    type Create = NewUserProfile;

    async fn create(&self, input: NewUserProfile) -> ShopResult<UserProfile> {
        input.validate()?;
        let conn = self.get_conn().await?;
        let now = Utc::now();
        let row = conn
            .query_one(
                concat!(
                    "INSERT INTO users (id, email, name, image, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $5) RETURNING ",
                    user_columns!()
                ),
                &[&input.id.as_str(), &input.email, &input.name, &input.image, &now],
            )
            .await
            .map_err(DbError::from)?;
        Ok(user_from_row(&row))
    }

    /// Removes the user's cart, wishlist and addresses with the profile.
    async fn delete(&self, id: &UserId) -> ShopResult<bool> {
        let mut conn = self.get_conn().await?;
        let client: &mut tokio_postgres::Client = &mut conn;
        let tx = client.transaction().await.map_err(DbError::from)?;
        for sql in [
            "DELETE FROM cart_items WHERE user_id = $1",
            "DELETE FROM wishlist_items WHERE user_id = $1",
            "DELETE FROM addresses WHERE user_id = $1",
        ] {
            tx.execute(sql, &[&id.as_str()]).await.map_err(DbError::from)?;
        }
        let deleted = tx
            .execute("DELETE FROM users WHERE id = $1", &[&id.as_str()])
            .await
            .map_err(DbError::from)?;
        tx.commit().await.map_err(DbError::from)?;
        Ok(deleted > 0)
    }
}

#[async_trait]
impl RowUpdater<UserFamily> for DbClient {
    type Update = UserProfileUpdate;

    async fn update(
        &self,
        id: &UserId,
        patch: UserProfileUpdate,
    ) -> ShopResult<Option<UserProfile>> {
        patch.validate()?;
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                concat!(
                    "UPDATE users SET \
                       email = COALESCE($2, email), \
                       name = CASE WHEN $3 THEN $4 ELSE name END, \
                       image = CASE WHEN $5 THEN $6 ELSE image END, \
                       updated_at = $7 \
                     WHERE id = $1 RETURNING ",
                    user_columns!()
                ),
                &[
                    &id.as_str(),
                    &patch.email,
                    &patch.name.is_some(),
                    &patch.name.clone().flatten(),
                    &patch.image.is_some(),
                    &patch.image.clone().flatten(),
                    &Utc::now(),
                ],
            )
            .await
            .map_err(DbError::from)?;
        Ok(row.as_ref().map(user_from_row))
    }
}
