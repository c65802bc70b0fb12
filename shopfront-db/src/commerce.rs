//! Products, carts and wishlists.
//!
//! Cart and wishlist rows are joined with their products in Rust: one query
//! for the lines, then [`load_products`] for the products and variants they
//! reference. Lines whose product vanished between the two reads are
//! skipped.

use async_trait::async_trait;
use chrono::Utc;
use shopfront_core::{
    CartLineUpdate, CartRow, NewCartLine, NewProduct, NewWishlistEntry, ProductId, ProductRow,
    ShopResult, StorageError, Timestamp, UserId, Validate, VariantId, VariantRow, WishlistRow,
};
use shopfront_storage::{
    CartFamily, CartLineKey, RowSource, RowUpdater, RowWriter, WishlistFamily, WishlistKey,
};
use std::collections::HashMap;
use tokio_postgres::Row;
use tracing::debug;
use uuid::Uuid;

use crate::db::{load_products, variant_id_param, DbClient};
use crate::error::{DbError, DbResult};

macro_rules! cart_line_columns {
    () => {
        "user_id, product_id, variant_id, quantity, created_at"
    };
}

macro_rules! wishlist_columns {
    () => {
        "user_id, product_id, created_at"
    };
}

struct CartLine {
    user_id: UserId,
    product_id: ProductId,
    variant_id: Option<VariantId>,
    quantity: i32,
    created_at: Timestamp,
}

impl CartLine {
    fn from_row(row: &Row) -> Self {
        Self {
            user_id: UserId::new(row.get::<_, String>("user_id")),
            product_id: row.get::<_, Uuid>("product_id").into(),
            variant_id: row.get::<_, Option<Uuid>>("variant_id").map(VariantId::from),
            quantity: row.get("quantity"),
            created_at: row.get("created_at"),
        }
    }

    fn join(self, products: &HashMap<ProductId, ProductRow>) -> Option<CartRow> {
        let product = products.get(&self.product_id)?.clone();
        Some(CartRow {
            user_id: self.user_id,
            product_id: self.product_id,
            variant_id: self.variant_id,
            quantity: self.quantity,
            created_at: self.created_at,
            product,
        })
    }
}

struct WishlistLine {
    user_id: UserId,
    product_id: ProductId,
    created_at: Timestamp,
}

impl WishlistLine {
    fn from_row(row: &Row) -> Self {
        Self {
            user_id: UserId::new(row.get::<_, String>("user_id")),
            product_id: row.get::<_, Uuid>("product_id").into(),
            created_at: row.get("created_at"),
        }
    }

    fn join(self, products: &HashMap<ProductId, ProductRow>) -> Option<WishlistRow> {
        let product = products.get(&self.product_id)?.clone();
        Some(WishlistRow {
            user_id: self.user_id,
            product_id: self.product_id,
            created_at: self.created_at,
            product,
        })
    }
}

fn product_not_found(id: ProductId) -> StorageError {
    StorageError::NotFound {
        entity: "product".to_string(),
        id: id.to_string(),
    }
}

// ============================================================================
// PRODUCTS
// ============================================================================

impl DbClient {
    /// Insert a product and its variants in one transaction.
    ///
    /// Variant order is kept through the `position` column.
    /// Every user holding a cart line or wishlist entry, whether or not a
    /// profile row exists for them.
    pub async fn scoped_users(&self) -> ShopResult<Vec<UserId>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                "SELECT user_id FROM cart_items UNION SELECT user_id FROM wishlist_items \
                 ORDER BY user_id",
                &[],
            )
            .await
            .map_err(DbError::from)?;
        Ok(rows
            .iter()
            .map(|row| UserId::new(row.get::<_, String>("user_id")))
            .collect())
    }

    pub async fn insert_product(&self, input: NewProduct) -> ShopResult<ProductRow> {
        input.validate()?;
        Ok(self.insert_product_tx(input).await?)
    }

    async fn insert_product_tx(&self, input: NewProduct) -> DbResult<ProductRow> {
        let mut conn = self.get_conn().await?;
        let client: &mut tokio_postgres::Client = &mut conn;
        let tx = client.transaction().await?;

        let now = Utc::now();
        let id = ProductId::generate();
        let media_ids: Vec<&str> = input.media_ids.iter().map(|m| m.as_str()).collect();
        tx.execute(
            "INSERT INTO products (id, product_type_id, title, slug, description, price_cents, \
               currency, media_ids, is_published, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)",
            &[
                &id.0,
                &input.product_type_id.map(|t| t.0),
                &input.title,
                &input.slug,
                &input.description,
                &input.price_cents,
                &input.currency,
                &media_ids,
                &input.is_published,
                &now,
            ],
        )
        .await?;

        let mut variants = Vec::with_capacity(input.variants.len());
        for (position, variant) in input.variants.into_iter().enumerate() {
            let variant_id = VariantId::generate();
            let options = serde_json::to_value(&variant.options)?;
            let image_id = variant.image_id.as_ref().map(|m| m.as_str());
            tx.execute(
                "INSERT INTO variants (id, product_id, position, sku, options, price_cents, \
                   stock, image_id) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                &[
                    &variant_id.0,
                    &id.0,
                    &(position as i32),
                    &variant.sku,
                    &options,
                    &variant.price_cents,
                    &variant.stock,
                    &image_id,
                ],
            )
            .await?;
            variants.push(VariantRow {
                id: variant_id,
                product_id: id,
                sku: variant.sku,
                options: variant.options,
                price_cents: variant.price_cents,
                stock: variant.stock,
                image_id: variant.image_id,
            });
        }
        tx.commit().await?;
        debug!(product_id = %id, variants = variants.len(), "Inserted product");

        Ok(ProductRow {
            id,
            product_type_id: input.product_type_id,
            title: input.title,
            slug: input.slug,
            description: input.description,
            price_cents: input.price_cents,
            currency: input.currency,
            media_ids: input.media_ids,
            is_published: input.is_published,
            variants,
            created_at: now,
            updated_at: now,
        })
    }

    /// Delete a product. Its variants, cart lines and wishlist entries go
    /// with it.
    pub async fn delete_product(&self, id: ProductId) -> ShopResult<bool> {
        let conn = self.get_conn().await?;
        let deleted = conn
            .execute("DELETE FROM products WHERE id = $1", &[&id.0])
            .await
            .map_err(DbError::from)?;
        Ok(deleted > 0)
    }

    pub async fn get_product(&self, id: ProductId) -> ShopResult<Option<ProductRow>> {
        let conn = self.get_conn().await?;
        let mut products = load_products(&conn, &[id]).await?;
        Ok(products.remove(&id))
    }

    async fn require_product(
        conn: &tokio_postgres::Client,
        product_id: ProductId,
        variant_id: Option<VariantId>,
    ) -> ShopResult<()> {
        let product = conn
            .query_opt("SELECT 1 FROM products WHERE id = $1", &[&product_id.0])
            .await
            .map_err(DbError::from)?;
        if product.is_none() {
            return Err(product_not_found(product_id).into());
        }
        if let Some(variant_id) = variant_id {
            let variant = conn
                .query_opt(
                    "SELECT 1 FROM variants WHERE id = $1 AND product_id = $2",
                    &[&variant_id.0, &product_id.0],
                )
                .await
                .map_err(DbError::from)?;
            if variant.is_none() {
                return Err(StorageError::NotFound {
                    entity: "variant".to_string(),
                    id: variant_id.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

// ============================================================================
// CART
// ============================================================================

#[async_trait]
impl RowSource<CartFamily> for DbClient {
    async fn count(&self, user: &UserId) -> ShopResult<u64> {
        Ok(self
            .count_where(
                "SELECT count(*) FROM cart_items WHERE user_id = $1",
                &[&user.as_str()],
            )
            .await?)
    }

    async fn scan(&self, user: &UserId) -> ShopResult<Vec<CartRow>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                concat!("SELECT ", cart_line_columns!(), " FROM cart_items WHERE user_id = $1"),
                &[&user.as_str()],
            )
            .await
            .map_err(DbError::from)?;
        let lines: Vec<CartLine> = rows.iter().map(CartLine::from_row).collect();
        let product_ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        let products = load_products(&conn, &product_ids).await?;
        Ok(lines.into_iter().filter_map(|l| l.join(&products)).collect())
    }

    async fn get(&self, line: &CartLineKey) -> ShopResult<Option<CartRow>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                concat!(
                    "SELECT ",
                    cart_line_columns!(),
                    " FROM cart_items \
                     WHERE user_id = $1 AND product_id = $2 AND variant_id IS NOT DISTINCT FROM $3"
                ),
                &[&line.user_id.as_str(), &line.product_id.0, &variant_id_param(line.variant_id)],
            )
            .await
            .map_err(DbError::from)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let line = CartLine::from_row(&row);
        let products = load_products(&conn, &[line.product_id]).await?;
        Ok(line.join(&products))
    }
}

#[async_trait]
impl RowWriter<CartFamily> for DbClient {
    type Create = NewCartLine;

    /// Adding a line that already exists increases its quantity.
    async fn create(&self, input: NewCartLine) -> ShopResult<CartRow> {
        input.validate()?;
        let mut conn = self.get_conn().await?;
        Self::require_product(&conn, input.product_id, input.variant_id).await?;

        let client: &mut tokio_postgres::Client = &mut conn;
        let tx = client.transaction().await.map_err(DbError::from)?;
        let variant_id = variant_id_param(input.variant_id);
        let updated = tx
            .query_opt(
                concat!(
                    "UPDATE cart_items SET quantity = quantity + $4 \
                     WHERE user_id = $1 AND product_id = $2 AND variant_id IS NOT DISTINCT FROM $3 \
                     RETURNING ",
                    cart_line_columns!()
                ),
                &[&input.user_id.as_str(), &input.product_id.0, &variant_id, &input.quantity],
            )
            .await
            .map_err(DbError::from)?;
        let row = match updated {
            Some(row) => row,
            None => tx
                .query_one(
                    concat!(
                        "INSERT INTO cart_items \
                           (user_id, product_id, variant_id, quantity, created_at) \
                         VALUES ($1, $2, $3, $4, $5) RETURNING ",
                        cart_line_columns!()
                    ),
                    &[
                        &input.user_id.as_str(),
                        &input.product_id.0,
                        &variant_id,
                        &input.quantity,
                        &Utc::now(),
                    ],
                )
                .await
                .map_err(DbError::from)?,
        };
        tx.commit().await.map_err(DbError::from)?;

        let line = CartLine::from_row(&row);
        let products = load_products(client, &[line.product_id]).await?;
        line.join(&products)
            .ok_or_else(|| product_not_found(input.product_id).into())
    }

    async fn delete(&self, line: &CartLineKey) -> ShopResult<bool> {
        let conn = self.get_conn().await?;
        let deleted = conn
            .execute(
                "DELETE FROM cart_items \
                 WHERE user_id = $1 AND product_id = $2 AND variant_id IS NOT DISTINCT FROM $3",
                &[&line.user_id.as_str(), &line.product_id.0, &variant_id_param(line.variant_id)],
            )
            .await
            .map_err(DbError::from)?;
        Ok(deleted > 0)
    }
}

#[async_trait]
impl RowUpdater<CartFamily> for DbClient {
    type Update = CartLineUpdate;

    async fn update(
        &self,
        line: &CartLineKey,
        patch: CartLineUpdate,
    ) -> ShopResult<Option<CartRow>> {
        patch.validate()?;
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                concat!(
                    "UPDATE cart_items SET quantity = $4 \
                     WHERE user_id = $1 AND product_id = $2 AND variant_id IS NOT DISTINCT FROM $3 \
                     RETURNING ",
                    cart_line_columns!()
                ),
                &[
                    &line.user_id.as_str(),
                    &line.product_id.0,
                    &variant_id_param(line.variant_id),
                    &patch.quantity,
                ],
            )
            .await
            .map_err(DbError::from)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let line = CartLine::from_row(&row);
        let products = load_products(&conn, &[line.product_id]).await?;
        Ok(line.join(&products))
    }
}

// ============================================================================
// WISHLIST
// ============================================================================

#[async_trait]
impl RowSource<WishlistFamily> for DbClient {
    async fn count(&self, user: &UserId) -> ShopResult<u64> {
        Ok(self
            .count_where(
                "SELECT count(*) FROM wishlist_items WHERE user_id = $1",
                &[&user.as_str()],
            )
            .await?)
    }

    async fn scan(&self, user: &UserId) -> ShopResult<Vec<WishlistRow>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                concat!("SELECT ", wishlist_columns!(), " FROM wishlist_items WHERE user_id = $1"),
                &[&user.as_str()],
            )
            .await
            .map_err(DbError::from)?;
        let lines: Vec<WishlistLine> = rows.iter().map(WishlistLine::from_row).collect();
        let product_ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        let products = load_products(&conn, &product_ids).await?;
        Ok(lines.into_iter().filter_map(|l| l.join(&products)).collect())
    }

    async fn get(&self, entry: &WishlistKey) -> ShopResult<Option<WishlistRow>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                concat!(
                    "SELECT ",
                    wishlist_columns!(),
                    " FROM wishlist_items WHERE user_id = $1 AND product_id = $2"
                ),
                &[&entry.user_id.as_str(), &entry.product_id.0],
            )
            .await
            .map_err(DbError::from)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let line = WishlistLine::from_row(&row);
        let products = load_products(&conn, &[line.product_id]).await?;
        Ok(line.join(&products))
    }
}

#[async_trait]
impl RowWriter<WishlistFamily> for DbClient {
    type Create = NewWishlistEntry;

    /// Adding an entry that already exists returns it unchanged.
    async fn create(&self, input: NewWishlistEntry) -> ShopResult<WishlistRow> {
        input.validate()?;
        let conn = self.get_conn().await?;
        Self::require_product(&conn, input.product_id, None).await?;
        conn.execute(
            "INSERT INTO wishlist_items (user_id, product_id, created_at) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, product_id) DO NOTHING",
            &[&input.user_id.as_str(), &input.product_id.0, &Utc::now()],
        )
        .await
        .map_err(DbError::from)?;
        let key = WishlistKey {
            user_id: input.user_id,
            product_id: input.product_id,
        };
        RowSource::<WishlistFamily>::get(self, &key)
            .await?
            .ok_or_else(|| product_not_found(key.product_id).into())
    }

    async fn delete(&self, entry: &WishlistKey) -> ShopResult<bool> {
        let conn = self.get_conn().await?;
        let deleted = conn
            .execute(
                "DELETE FROM wishlist_items WHERE user_id = $1 AND product_id = $2",
                &[&entry.user_id.as_str(), &entry.product_id.0],
            )
            .await
            .map_err(DbError::from)?;
        Ok(deleted > 0)
    }
}
