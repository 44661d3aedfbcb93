//! The guest cart and tokens persisted on disk.

use std::sync::Arc;

use miracle_core::ProductId;
use miracle_integration_tests::{ALICE_PASSWORD, FakeBackend};
use miracle_storefront::cart::{CartSource, GUEST_CART_KEY};
use miracle_storefront::storage::{FileStore, KeyValueStore};
use secrecy::SecretString;
use serde_json::json;

#[tokio::test]
async fn test_guest_cart_survives_restart() {
    let backend = FakeBackend::start().await;
    let dir = tempfile::tempdir().unwrap();

    let first = backend.storefront_with_store(Arc::new(FileStore::open(dir.path()).unwrap()));
    first.cart().add(ProductId::new(1), 2).await.unwrap();
    first.cart().add(ProductId::new(2), 1).await.unwrap();
    let saved = first.cart().snapshot();
    drop(first);

    // A new process has a new cookie jar, so only the guest store remains.
    let second = backend.storefront_with_store(Arc::new(FileStore::open(dir.path()).unwrap()));
    let loaded = second.cart().load().await;
    assert_eq!(loaded.source, CartSource::Guest);
    assert_eq!(loaded.snapshot, saved);
    assert_eq!(loaded.snapshot.total_items(), 3);
}

#[tokio::test]
async fn test_session_survives_restart() {
    let backend = FakeBackend::start().await;
    let dir = tempfile::tempdir().unwrap();

    let first = backend.storefront_with_store(Arc::new(FileStore::open(dir.path()).unwrap()));
    first
        .session()
        .login("alice", &SecretString::from(ALICE_PASSWORD.to_string()))
        .await
        .unwrap();
    drop(first);

    let second = backend.storefront_with_store(Arc::new(FileStore::open(dir.path()).unwrap()));
    assert!(second.session().init().await);
    second.cart().add(ProductId::new(2), 3).await.unwrap();
    assert_eq!(backend.user_cart("alice"), vec![(2, 3)]);
}

#[tokio::test]
async fn test_corrupt_guest_cart_reads_empty() {
    let backend = FakeBackend::start().await;
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    store
        .set(GUEST_CART_KEY, &json!({"items": "not a list"}))
        .unwrap();

    let storefront = backend.storefront_with_store(store);
    let loaded = storefront.cart().load().await;
    assert_eq!(loaded.source, CartSource::Guest);
    assert!(loaded.snapshot.is_empty());

    // A broken file on disk behaves the same.
    std::fs::write(dir.path().join(format!("{GUEST_CART_KEY}.json")), b"{not json").unwrap();
    assert!(storefront.guest_cart().read().is_empty());
}

#[tokio::test]
async fn test_malformed_entries_are_dropped() {
    let backend = FakeBackend::start().await;
    let (storefront, store) = backend.storefront();
    store
        .set(
            GUEST_CART_KEY,
            &json!([
                {"id": 1, "product": {"id": 2, "name": "Moringa Tea", "price": "8.00"}, "quantity": "3"},
                {"id": 2, "product": "junk"},
                "junk",
            ]),
        )
        .unwrap();

    let cart = storefront.guest_cart().read();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart.items()[0].quantity.get(), 3);
    assert_eq!(cart.items()[0].product.name, "Moringa Tea");
}
