//! Relational provider traits.
//!
//! The relational store is authoritative. The cache layer only ever reads
//! counts, scans and point lookups from it; writes go through [`RowWriter`]
//! and [`RowUpdater`] and are followed by cache invalidation.

use async_trait::async_trait;
use shopfront_core::{Address, AddressId, AddressUpdate, NewAddress, ShopResult, UserId, Validate};

use crate::cache::CacheFamily;

/// Read side of the relational provider for one family.
#[async_trait]
pub trait RowSource<F: CacheFamily>: Send + Sync + 'static {
    /// Number of rows in `scope`. Used only as a staleness signal.
    async fn count(&self, scope: &F::Scope) -> ShopResult<u64>;

    /// Every row in `scope`, with joins preloaded.
    async fn scan(&self, scope: &F::Scope) -> ShopResult<Vec<F::Row>>;

    /// One row by identity.
    async fn get(&self, identity: &F::Identity) -> ShopResult<Option<F::Row>>;

    /// Rows for a set of identities. Missing identities are skipped.
    async fn get_many(&self, identities: &[F::Identity]) -> ShopResult<Vec<F::Row>> {
        let mut rows = Vec::with_capacity(identities.len());
        for identity in identities {
            if let Some(row) = self.get(identity).await? {
                rows.push(row);
            }
        }
        Ok(rows)
    }
}

/// Create and delete for one family.
///
/// Implementations reject a `Create` that fails [`Validate`] before writing.
#[async_trait]
pub trait RowWriter<F: CacheFamily>: RowSource<F> {
    type Create: Validate + Send + Sync + 'static;

    async fn create(&self, input: Self::Create) -> ShopResult<F::Row>;

    /// Returns whether a row was deleted.
    async fn delete(&self, identity: &F::Identity) -> ShopResult<bool>;
}

/// In-place update for one family.
#[async_trait]
pub trait RowUpdater<F: CacheFamily>: RowSource<F> {
    type Update: Validate + Send + Sync + 'static;

    /// Returns `None` if no row matched.
    async fn update(&self, identity: &F::Identity, patch: Self::Update)
        -> ShopResult<Option<F::Row>>;
}

/// Per-user address book.
///
/// Every implementation keeps at most one primary address per user, and
/// changes to the flag are applied atomically with the row they concern:
///
/// - creating or updating with `is_primary` clears the flag on every other
///   address of the user in the same transaction
/// - a user's first address is primary regardless of the request
/// - deleting the primary promotes the most recently created remaining one
///
/// Writes that would leave an address failing its schema are rejected.
#[async_trait]
pub trait AddressBook: Send + Sync + 'static {
    /// Addresses of `user`, primary first, then newest first.
    async fn list_addresses(&self, user: &UserId) -> ShopResult<Vec<Address>>;

    async fn get_address(&self, id: AddressId) -> ShopResult<Option<Address>>;

    async fn create_address(&self, input: NewAddress) -> ShopResult<Address>;

    async fn update_address(
        &self,
        id: AddressId,
        patch: AddressUpdate,
    ) -> ShopResult<Option<Address>>;

    /// Make `id` the primary address of its owner.
    async fn set_primary_address(&self, id: AddressId) -> ShopResult<Option<Address>>;

    async fn delete_address(&self, id: AddressId) -> ShopResult<bool>;
}
