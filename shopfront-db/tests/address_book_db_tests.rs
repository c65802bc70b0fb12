//! Address Book Tests Against PostgreSQL
//!
//! **Property: Single Primary Address**
//!
//! For any user, after any sequence of address operations, at most one
//! address is primary, and exactly one while the user has any address.
//! Concurrent requests for the same user are serialized by the per-user
//! advisory lock.

#![cfg(feature = "db-tests")]

use shopfront_core::{AddressUpdate, UserId};
use shopfront_storage::AddressBook;
use shopfront_test_utils::assertions::{assert_single_primary, assert_validation_error};
use shopfront_test_utils::fixtures;

#[path = "support/db.rs"]
mod test_db_support;
use test_db_support::{test_db_client, unique};

#[tokio::test]
async fn test_first_address_becomes_primary() {
    let db = test_db_client().await;
    let user = UserId::new(unique("addr-user"));

    let address = db
        .create_address(fixtures::new_address(&user, "Berlin", false))
        .await
        .unwrap();

    assert!(address.is_primary);
    assert_single_primary(&db.list_addresses(&user).await.unwrap());
}

#[tokio::test]
async fn test_new_primary_replaces_old() {
    let db = test_db_client().await;
    let user = UserId::new(unique("addr-user"));

    let first = db
        .create_address(fixtures::new_address(&user, "Berlin", true))
        .await
        .unwrap();
    let second = db
        .create_address(fixtures::new_address(&user, "Hamburg", true))
        .await
        .unwrap();

    let addresses = db.list_addresses(&user).await.unwrap();
    assert_single_primary(&addresses);
    assert_eq!(addresses[0].id, second.id);
    let first = db.get_address(first.id).await.unwrap().unwrap();
    assert!(!first.is_primary);
}

#[tokio::test]
async fn test_update_and_set_primary() {
    let db = test_db_client().await;
    let user = UserId::new(unique("addr-user"));

    let first = db
        .create_address(fixtures::new_address(&user, "Berlin", true))
        .await
        .unwrap();
    let second = db
        .create_address(fixtures::new_address(&user, "Hamburg", false))
        .await
        .unwrap();
    assert!(!second.is_primary);

    let promoted = db.set_primary_address(second.id).await.unwrap().unwrap();
    assert!(promoted.is_primary);
    assert_single_primary(&db.list_addresses(&user).await.unwrap());

    // Clearing the flag is ignored; only the city changes
    let patch = AddressUpdate {
        city: Some("Munich".to_string()),
        is_primary: Some(false),
        ..AddressUpdate::default()
    };
    let updated = db.update_address(second.id, patch).await.unwrap().unwrap();
    assert_eq!(updated.city, "Munich");
    assert!(updated.is_primary);

    let first = db.get_address(first.id).await.unwrap().unwrap();
    assert!(!first.is_primary);
}

#[tokio::test]
async fn test_deleting_primary_promotes_newest() {
    let db = test_db_client().await;
    let user = UserId::new(unique("addr-user"));

    let primary = db
        .create_address(fixtures::new_address(&user, "Berlin", true))
        .await
        .unwrap();
    db.create_address(fixtures::new_address(&user, "Hamburg", false))
        .await
        .unwrap();
    let newest = db
        .create_address(fixtures::new_address(&user, "Cologne", false))
        .await
        .unwrap();

    assert!(db.delete_address(primary.id).await.unwrap());
    assert!(!db.delete_address(primary.id).await.unwrap());

    let addresses = db.list_addresses(&user).await.unwrap();
    assert_eq!(addresses.len(), 2);
    assert_single_primary(&addresses);
    assert_eq!(addresses[0].id, newest.id);
}

#[tokio::test]
async fn test_unknown_address_is_none() {
    let db = test_db_client().await;
    let id = shopfront_core::AddressId::generate();

    assert!(db.get_address(id).await.unwrap().is_none());
    assert!(db.set_primary_address(id).await.unwrap().is_none());
    assert!(!db.delete_address(id).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_primary_creates_leave_one_primary() {
    let db = test_db_client().await;
    let user = UserId::new(unique("addr-user"));

    let mut handles = Vec::new();
    for i in 0..8 {
        let db = db.clone();
        let user = user.clone();
        handles.push(tokio::spawn(async move {
            db.create_address(fixtures::new_address(&user, &format!("City {}", i), true))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let addresses = db.list_addresses(&user).await.unwrap();
    assert_eq!(addresses.len(), 8);
    assert_single_primary(&addresses);
}

#[tokio::test]
async fn test_invalid_country_never_stored() {
    let db = test_db_client().await;
    let user = UserId::new(unique("addr-user"));
    let mut input = fixtures::new_address(&user, "Boston", true);
    input.country = "usa".to_string();
    assert_validation_error(&db.create_address(input).await);
    assert!(db.list_addresses(&user).await.unwrap().is_empty());

    let stored = db
        .create_address(fixtures::new_address(&user, "Berlin", true))
        .await
        .unwrap();
    let patch = AddressUpdate {
        country: Some("usa".to_string()),
        ..AddressUpdate::default()
    };
    assert_validation_error(&db.update_address(stored.id, patch).await);
    assert_eq!(db.get_address(stored.id).await.unwrap(), Some(stored));
}
