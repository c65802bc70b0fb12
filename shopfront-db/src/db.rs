//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling with deadpool-postgres, schema bootstrap,
//! and the row decoders shared by the per-family providers.

use deadpool_postgres::{Object, Pool};
use shopfront_core::{
    Address, Category, MediaId, MediaItem, ProductId, ProductRow, ProductType, ProductTypeId,
    ShopResult, Subcategory, UserId, UserProfile, VariantId, VariantRow,
};
use std::collections::{BTreeMap, HashMap};
use tokio_postgres::Row;
use tracing::info;
use uuid::Uuid;

use crate::config::DbConfig;
use crate::error::{DbError, DbResult};

const SCHEMA: &str = include_str!("schema.sql");

// ============================================================================
// DATABASE CLIENT WRAPPER
// ============================================================================

/// Relational provider over a PostgreSQL connection pool.
///
/// Implements every `RowSource`, `RowWriter` and `RowUpdater` the cache
/// families need, plus `AddressBook`.
#[derive(Clone)]
pub struct DbClient {
    pool: Pool,
}

impl DbClient {
    /// Create a new database client with the given pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a new database client from configuration without connecting.
    pub fn from_config(config: &DbConfig) -> ShopResult<Self> {
        config.validate()?;
        let pool = config.create_pool()?;
        Ok(Self::new(pool))
    }

    /// Create a client and verify the database answers.
    pub async fn connect(config: &DbConfig) -> ShopResult<Self> {
        let client = Self::from_config(config)?;
        let conn = client.get_conn().await?;
        conn.simple_query("SELECT 1").await.map_err(DbError::from)?;
        info!(host = %config.host, dbname = %config.dbname, "Connected to PostgreSQL");
        Ok(client)
    }

    /// Close the pool. Checked-out connections are dropped on return.
    pub fn close(&self) {
        self.pool.close();
        info!("PostgreSQL pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    /// Get a connection from the pool.
    pub(crate) async fn get_conn(&self) -> DbResult<Object> {
        Ok(self.pool.get().await?)
    }

    /// Create every table and index that does not exist yet.
    pub async fn migrate(&self) -> ShopResult<()> {
        let conn = self.get_conn().await?;
        conn.batch_execute(SCHEMA).await.map_err(DbError::from)?;
        info!("Schema is up to date");
        Ok(())
    }

    pub(crate) async fn count_where(
        &self,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> DbResult<u64> {
        let conn = self.get_conn().await?;
        let row = conn.query_one(sql, params).await?;
        let count: i64 = row.get(0);
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

// ============================================================================
// ROW DECODERS
// ============================================================================

// Column lists, spliced into queries with `concat!`.
macro_rules! category_columns {
    () => {
        "id, name, slug, description, created_at, updated_at"
    };
}
macro_rules! subcategory_columns {
    () => {
        "id, category_id, name, slug, created_at, updated_at"
    };
}
macro_rules! product_type_columns {
    () => {
        "id, subcategory_id, name, slug, created_at, updated_at"
    };
}
macro_rules! media_columns {
    () => {
        "id, url, alt, mime_type, created_at"
    };
}
macro_rules! user_columns {
    () => {
        "id, email, name, image, created_at, updated_at"
    };
}
macro_rules! address_columns {
    () => {
        "id, user_id, full_name, line1, line2, city, region, postal_code, country, phone, \
         is_primary, created_at, updated_at"
    };
}
macro_rules! product_columns {
    () => {
        "id, product_type_id, title, slug, description, price_cents, currency, media_ids, \
         is_published, created_at, updated_at"
    };
}
macro_rules! variant_columns {
    () => {
        "id, product_id, sku, options, price_cents, stock, image_id"
    };
}

pub(crate) fn category_from_row(row: &Row) -> Category {
    Category {
        id: row.get::<_, Uuid>("id").into(),
        name: row.get("name"),
        slug: row.get("slug"),
        description: row.get("description"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub(crate) fn subcategory_from_row(row: &Row) -> Subcategory {
    Subcategory {
        id: row.get::<_, Uuid>("id").into(),
        category_id: row.get::<_, Uuid>("category_id").into(),
        name: row.get("name"),
        slug: row.get("slug"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub(crate) fn product_type_from_row(row: &Row) -> ProductType {
    ProductType {
        id: row.get::<_, Uuid>("id").into(),
        subcategory_id: row.get::<_, Uuid>("subcategory_id").into(),
        name: row.get("name"),
        slug: row.get("slug"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub(crate) fn media_from_row(row: &Row) -> MediaItem {
    MediaItem {
        id: MediaId::new(row.get::<_, String>("id")),
        url: row.get("url"),
        alt: row.get("alt"),
        mime_type: row.get("mime_type"),
        created_at: row.get("created_at"),
    }
}

pub(crate) fn user_from_row(row: &Row) -> UserProfile {
    UserProfile {
        id: UserId::new(row.get::<_, String>("id")),
        email: row.get("email"),
        name: row.get("name"),
        image: row.get("image"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub(crate) fn address_from_row(row: &Row) -> Address {
    Address {
        id: row.get::<_, Uuid>("id").into(),
        user_id: UserId::new(row.get::<_, String>("user_id")),
        full_name: row.get("full_name"),
        line1: row.get("line1"),
        line2: row.get("line2"),
        city: row.get("city"),
        region: row.get("region"),
        postal_code: row.get("postal_code"),
        country: row.get("country"),
        phone: row.get("phone"),
        is_primary: row.get("is_primary"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn product_from_row(row: &Row) -> ProductRow {
    ProductRow {
        id: row.get::<_, Uuid>("id").into(),
        product_type_id: row
            .get::<_, Option<Uuid>>("product_type_id")
            .map(ProductTypeId::from),
        title: row.get("title"),
        slug: row.get("slug"),
        description: row.get("description"),
        price_cents: row.get("price_cents"),
        currency: row.get("currency"),
        media_ids: row
            .get::<_, Vec<String>>("media_ids")
            .into_iter()
            .map(MediaId::from)
            .collect(),
        is_published: row.get("is_published"),
        variants: Vec::new(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn variant_from_row(row: &Row) -> DbResult<VariantRow> {
    let options: BTreeMap<String, String> =
        serde_json::from_value(row.get::<_, serde_json::Value>("options"))?;
    Ok(VariantRow {
        id: row.get::<_, Uuid>("id").into(),
        product_id: row.get::<_, Uuid>("product_id").into(),
        sku: row.get("sku"),
        options,
        price_cents: row.get("price_cents"),
        stock: row.get("stock"),
        image_id: row.get::<_, Option<String>>("image_id").map(MediaId::from),
    })
}

// ============================================================================
// PRODUCT JOINS
// ============================================================================

/// Load products with their variants in two queries.
pub(crate) async fn load_products(
    conn: &tokio_postgres::Client,
    ids: &[ProductId],
) -> DbResult<HashMap<ProductId, ProductRow>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let uuids: Vec<Uuid> = ids.iter().map(|id| id.0).collect();

    let rows = conn
        .query(
            concat!("SELECT ", product_columns!(), " FROM products WHERE id = ANY($1)"),
            &[&uuids],
        )
        .await?;
    let mut products: HashMap<ProductId, ProductRow> = rows
        .iter()
        .map(product_from_row)
        .map(|p| (p.id, p))
        .collect();

    let variants = conn
        .query(
            concat!(
                "SELECT ",
                variant_columns!(),
                " FROM variants WHERE product_id = ANY($1) ORDER BY product_id, position"
            ),
            &[&uuids],
        )
        .await?;
    for row in &variants {
        let variant = variant_from_row(row)?;
        if let Some(product) = products.get_mut(&variant.product_id) {
            product.variants.push(variant);
        }
    }
    Ok(products)
}

pub(crate) fn variant_id_param(id: Option<VariantId>) -> Option<Uuid> {
    id.map(|v| v.0)
}
