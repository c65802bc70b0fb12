//! Address Book Primary-Flag Tests
//!
//! At most one address per user is primary, and never zero while the user
//! has any address. Flag changes are applied together with the row they
//! concern.

use proptest::prelude::*;
use shopfront_core::{AddressUpdate, UserId};
use shopfront_storage::{AddressBook, MemoryCatalog};
use shopfront_test_utils::assertions::{assert_single_primary, assert_validation_error};
use shopfront_test_utils::{fixtures, generators};
use std::sync::Arc;
use tokio::runtime::Runtime;

#[tokio::test]
async fn test_first_address_becomes_primary() {
    let catalog = MemoryCatalog::new();
    let user = UserId::new("u1");

    let first = catalog
        .create_address(fixtures::new_address(&user, "Berlin", false))
        .await
        .unwrap();

    assert!(first.is_primary);
}

#[tokio::test]
async fn test_new_primary_replaces_old_primary() {
    let catalog = MemoryCatalog::new();
    let user = UserId::new("u1");
    let a = catalog
        .create_address(fixtures::new_address(&user, "Berlin", true))
        .await
        .unwrap();

    let b = catalog
        .create_address(fixtures::new_address(&user, "Hamburg", true))
        .await
        .unwrap();

    let listed = catalog.list_addresses(&user).await.unwrap();
    assert_single_primary(&listed);
    assert_eq!(listed[0].id, b.id);
    assert!(!catalog.get_address(a.id).await.unwrap().unwrap().is_primary);
}

#[tokio::test]
async fn test_non_primary_create_keeps_existing_primary() {
    let catalog = MemoryCatalog::new();
    let user = UserId::new("u1");
    let a = catalog
        .create_address(fixtures::new_address(&user, "Berlin", true))
        .await
        .unwrap();

    catalog
        .create_address(fixtures::new_address(&user, "Hamburg", false))
        .await
        .unwrap();

    let listed = catalog.list_addresses(&user).await.unwrap();
    assert_single_primary(&listed);
    assert_eq!(listed[0].id, a.id);
}

#[tokio::test]
async fn test_set_primary_and_update() {
    let catalog = MemoryCatalog::new();
    let user = UserId::new("u1");
    let a = catalog
        .create_address(fixtures::new_address(&user, "Berlin", true))
        .await
        .unwrap();
    let b = catalog
        .create_address(fixtures::new_address(&user, "Hamburg", false))
        .await
        .unwrap();

    let promoted = catalog.set_primary_address(b.id).await.unwrap().unwrap();
    assert!(promoted.is_primary);
    assert_single_primary(&catalog.list_addresses(&user).await.unwrap());

    // Clearing the flag is ignored; a primary is only ever replaced
    let updated = catalog
        .update_address(
            b.id,
            AddressUpdate {
                city: Some("Bremen".to_string()),
                is_primary: Some(false),
                ..AddressUpdate::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.city, "Bremen");
    assert!(updated.is_primary);

    catalog
        .update_address(
            a.id,
            AddressUpdate {
                is_primary: Some(true),
                ..AddressUpdate::default()
            },
        )
        .await
        .unwrap();
    let listed = catalog.list_addresses(&user).await.unwrap();
    assert_single_primary(&listed);
    assert_eq!(listed[0].id, a.id);
}

#[tokio::test]
async fn test_deleting_primary_promotes_newest() {
    let catalog = MemoryCatalog::new();
    let user = UserId::new("u1");
    let primary = catalog
        .create_address(fixtures::new_address(&user, "Berlin", true))
        .await
        .unwrap();
    catalog
        .create_address(fixtures::new_address(&user, "Hamburg", false))
        .await
        .unwrap();
    let newest = catalog
        .create_address(fixtures::new_address(&user, "Munich", false))
        .await
        .unwrap();

    assert!(catalog.delete_address(primary.id).await.unwrap());

    let listed = catalog.list_addresses(&user).await.unwrap();
    assert_single_primary(&listed);
    assert_eq!(listed[0].id, newest.id);
}

#[tokio::test]
async fn test_users_do_not_share_primaries() {
    let catalog = MemoryCatalog::new();
    let alice = UserId::new("alice");
    let bob = UserId::new("bob");

    catalog
        .create_address(fixtures::new_address(&alice, "Berlin", true))
        .await
        .unwrap();
    catalog
        .create_address(fixtures::new_address(&bob, "Paris", true))
        .await
        .unwrap();

    assert_single_primary(&catalog.list_addresses(&alice).await.unwrap());
    assert_single_primary(&catalog.list_addresses(&bob).await.unwrap());
}

#[tokio::test]
async fn test_address_with_invalid_country_is_rejected() {
    let catalog = MemoryCatalog::new();
    let user = UserId::new("u1");
    let mut input = fixtures::new_address(&user, "Boston", true);
    input.country = "usa".to_string();

    assert_validation_error(&catalog.create_address(input).await);
    assert!(catalog.list_addresses(&user).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_to_invalid_country_leaves_row_unchanged() {
    let catalog = MemoryCatalog::new();
    let user = UserId::new("u1");
    let a = catalog
        .create_address(fixtures::new_address(&user, "Berlin", true))
        .await
        .unwrap();

    let result = catalog
        .update_address(
            a.id,
            AddressUpdate {
                country: Some("usa".to_string()),
                ..AddressUpdate::default()
            },
        )
        .await;

    assert_validation_error(&result);
    assert_eq!(catalog.get_address(a.id).await.unwrap(), Some(a));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_primary_creates_leave_one_primary() {
    let catalog = Arc::new(MemoryCatalog::new());
    let user = UserId::new("u1");

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let catalog = catalog.clone();
            let user = user.clone();
            tokio::spawn(async move {
                catalog
                    .create_address(fixtures::new_address(&user, &format!("City {}", i), true))
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let listed = catalog.list_addresses(&user).await.unwrap();
    assert_eq!(listed.len(), 16);
    assert_single_primary(&listed);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_any_sequence_keeps_single_primary(
        inputs in prop::collection::vec(generators::arb_new_address(UserId::new("u1")), 1..8),
        deletions in prop::collection::vec(any::<prop::sample::Index>(), 0..4),
    ) {
        let rt = Runtime::new().map_err(|e| TestCaseError::fail(e.to_string()))?;
        rt.block_on(async {
            let catalog = MemoryCatalog::new();
            let user = UserId::new("u1");
            let mut ids = Vec::new();
            for input in inputs {
                let address = catalog.create_address(input).await
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
                ids.push(address.id);
                let listed = catalog.list_addresses(&user).await
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
                prop_assert_eq!(listed.iter().filter(|a| a.is_primary).count(), 1);
            }
            for index in deletions {
                if ids.is_empty() {
                    break;
                }
                let id = ids.remove(index.index(ids.len()));
                catalog.delete_address(id).await
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
                let listed = catalog.list_addresses(&user).await
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
                let expected = usize::from(!listed.is_empty());
                prop_assert_eq!(listed.iter().filter(|a| a.is_primary).count(), expected);
            }
            Ok(())
        })?;
    }
}
