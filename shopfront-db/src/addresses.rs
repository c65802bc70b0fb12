//! Address book over PostgreSQL.
//!
//! Every write that can touch the primary flag runs in a transaction holding
//! a per-user advisory lock, so two concurrent requests for the same user
//! are applied one after the other. The partial unique index on
//! `addresses (user_id) WHERE is_primary` rejects anything that slips past.

use async_trait::async_trait;
use chrono::Utc;
use shopfront_core::{
    Address, AddressId, AddressUpdate, NewAddress, Schema, ShopResult, UserId, Validate,
};
use shopfront_storage::AddressBook;
use tokio_postgres::Transaction;
use tracing::debug;

use crate::db::{address_from_row, DbClient};
use crate::error::DbResult;

async fn lock_user(tx: &Transaction<'_>, user: &str) -> DbResult<()> {
    tx.execute("SELECT pg_advisory_xact_lock(hashtext($1))", &[&user])
        .await?;
    Ok(())
}

async fn owner_of(tx: &Transaction<'_>, id: AddressId) -> DbResult<Option<String>> {
    let row = tx
        .query_opt("SELECT user_id FROM addresses WHERE id = $1", &[&id.0])
        .await?;
    Ok(row.map(|r| r.get("user_id")))
}

async fn clear_primary(tx: &Transaction<'_>, user: &str) -> DbResult<()> {
    tx.execute(
        "UPDATE addresses SET is_primary = false, updated_at = $2 \
         WHERE user_id = $1 AND is_primary",
        &[&user, &Utc::now()],
    )
    .await?;
    Ok(())
}

impl DbClient {
    async fn create_address_tx(&self, input: NewAddress) -> DbResult<Address> {
        input.validate()?;
        let mut conn = self.get_conn().await?;
        let client: &mut tokio_postgres::Client = &mut conn;
        let tx = client.transaction().await?;
        let user = input.user_id.as_str();
        lock_user(&tx, user).await?;

        let existing: i64 = tx
            .query_one("SELECT count(*) FROM addresses WHERE user_id = $1", &[&user])
            .await?
            .get(0);
        let is_primary = input.is_primary || existing == 0;
        if is_primary {
            clear_primary(&tx, user).await?;
        }

        let now = Utc::now();
        let row = tx
            .query_one(
                concat!(
                    "INSERT INTO addresses (id, user_id, full_name, line1, line2, city, region, \
                       postal_code, country, phone, is_primary, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12) RETURNING ",
                    address_columns!()
                ),
                &[
                    &AddressId::generate().0,
                    &user,
                    &input.full_name,
                    &input.line1,
                    &input.line2,
                    &input.city,
                    &input.region,
                    &input.postal_code,
                    &input.country,
                    &input.phone,
                    &is_primary,
                    &now,
                ],
            )
            .await?;
        tx.commit().await?;
        let address = address_from_row(&row);
        debug!(user_id = %address.user_id, address_id = %address.id, is_primary, "Created address");
        Ok(address)
    }

    async fn update_address_tx(
        &self,
        id: AddressId,
        patch: AddressUpdate,
    ) -> DbResult<Option<Address>> {
        let mut conn = self.get_conn().await?;
        let client: &mut tokio_postgres::Client = &mut conn;
        let tx = client.transaction().await?;
        let Some(user) = owner_of(&tx, id).await? else {
            return Ok(None);
        };
        lock_user(&tx, &user).await?;

        // The row may have gone while we waited for the lock.
        let Some(row) = tx
            .query_opt(
                concat!("SELECT ", address_columns!(), " FROM addresses WHERE id = $1 FOR UPDATE"),
                &[&id.0],
            )
            .await?
        else {
            return Ok(None);
        };
        let mut address = address_from_row(&row);
        address.apply(&patch, Utc::now());
        address.check()?;
        if patch.is_primary == Some(true) && !address.is_primary {
            clear_primary(&tx, &user).await?;
            address.is_primary = true;
        }

        let row = tx
            .query_one(
                concat!(
                    "UPDATE addresses SET full_name = $2, line1 = $3, line2 = $4, city = $5, \
                       region = $6, postal_code = $7, country = $8, phone = $9, \
                       is_primary = $10, updated_at = $11 \
                     WHERE id = $1 RETURNING ",
                    address_columns!()
                ),
                &[
                    &id.0,
                    &address.full_name,
                    &address.line1,
                    &address.line2,
                    &address.city,
                    &address.region,
                    &address.postal_code,
                    &address.country,
                    &address.phone,
                    &address.is_primary,
                    &address.updated_at,
                ],
            )
            .await?;
        tx.commit().await?;
        Ok(Some(address_from_row(&row)))
    }

    async fn delete_address_tx(&self, id: AddressId) -> DbResult<bool> {
        let mut conn = self.get_conn().await?;
        let client: &mut tokio_postgres::Client = &mut conn;
        let tx = client.transaction().await?;
        let Some(user) = owner_of(&tx, id).await? else {
            return Ok(false);
        };
        lock_user(&tx, &user).await?;

        let Some(deleted) = tx
            .query_opt("DELETE FROM addresses WHERE id = $1 RETURNING is_primary", &[&id.0])
            .await?
        else {
            return Ok(false);
        };
        if deleted.get::<_, bool>("is_primary") {
            tx.execute(
                "UPDATE addresses SET is_primary = true, updated_at = $2 \
                 WHERE id = (SELECT id FROM addresses WHERE user_id = $1 \
                             ORDER BY created_at DESC, id DESC LIMIT 1)",
                &[&user, &Utc::now()],
            )
            .await?;
        }
        tx.commit().await?;
        Ok(true)
    }
}

#[async_trait]
impl AddressBook for DbClient {
    async fn list_addresses(&self, user: &UserId) -> ShopResult<Vec<Address>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                concat!(
                    "SELECT ",
                    address_columns!(),
                    " FROM addresses WHERE user_id = $1 \
                     ORDER BY is_primary DESC, created_at DESC, id DESC"
                ),
                &[&user.as_str()],
            )
            .await
            .map_err(crate::error::DbError::from)?;
        Ok(rows.iter().map(address_from_row).collect())
    }

    async fn get_address(&self, id: AddressId) -> ShopResult<Option<Address>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                concat!("SELECT ", address_columns!(), " FROM addresses WHERE id = $1"),
                &[&id.0],
            )
            .await
            .map_err(crate::error::DbError::from)?;
        Ok(row.as_ref().map(address_from_row))
    }

    async fn create_address(&self, input: NewAddress) -> ShopResult<Address> {
        Ok(self.create_address_tx(input).await?)
    }

    async fn update_address(
        &self,
        id: AddressId,
        patch: AddressUpdate,
    ) -> ShopResult<Option<Address>> {
        Ok(self.update_address_tx(id, patch).await?)
    }

    async fn set_primary_address(&self, id: AddressId) -> ShopResult<Option<Address>> {
        let patch = AddressUpdate {
            is_primary: Some(true),
            ..AddressUpdate::default()
        };
        self.update_address(id, patch).await
    }

    async fn delete_address(&self, id: AddressId) -> ShopResult<bool> {
        Ok(self.delete_address_tx(id).await?)
    }
}
