//! Cart mutations in both modes.

use miracle_core::ProductId;
use miracle_integration_tests::{ALICE_PASSWORD, FakeBackend};
use miracle_storefront::cart::{CartError, CartSource};
use secrecy::SecretString;

async fn logged_in(backend: &FakeBackend) -> miracle_storefront::Storefront {
    let (storefront, _store) = backend.storefront();
    storefront
        .session()
        .login("alice", &SecretString::from(ALICE_PASSWORD.to_string()))
        .await
        .unwrap();
    storefront
}

#[tokio::test]
async fn test_anonymous_add_enriches_guest_line() {
    let backend = FakeBackend::start().await;
    let (storefront, _store) = backend.storefront();

    let cart = storefront.cart().add(ProductId::new(1), 2).await.unwrap();

    let line = &cart.items()[0];
    assert_eq!(line.product.name, "Moringa Powder");
    assert_eq!(
        line.product.image.as_deref(),
        Some(format!("{}/media/products/powder.png", backend.base_url()).as_str())
    );
    assert_eq!(line.quantity.get(), 2);
    assert_eq!(storefront.guest_cart().read(), cart);

    // The session cart received the same add.
    let loaded = storefront.cart().load().await;
    assert_eq!(loaded.source, CartSource::Session);
    assert_eq!(loaded.snapshot.total_items(), 2);
}

#[tokio::test]
async fn test_anonymous_add_survives_session_cart_failure() {
    let backend = FakeBackend::start().await;
    let (storefront, _store) = backend.storefront();
    backend.fail_adds_for(1);

    let cart = storefront.cart().add(ProductId::new(1), 2).await.unwrap();

    assert_eq!(cart.len(), 1);
    assert_eq!(cart.items()[0].quantity.get(), 2);
    assert_eq!(cart.items()[0].product.name, "Moringa Powder");
    assert_eq!(storefront.guest_cart().read(), cart);
    assert!(backend.requests().iter().any(|r| r.is("POST", "/cart/")));
}

#[tokio::test]
async fn test_anonymous_edits_survive_session_cart_failure() {
    let backend = FakeBackend::start().await;
    let (storefront, _store) = backend.storefront();
    storefront.cart().add(ProductId::new(1), 1).await.unwrap();
    let cart = storefront.cart().add(ProductId::new(2), 1).await.unwrap();
    let powder = cart.find_by_product(ProductId::new(1)).unwrap().id;
    let tea = cart.find_by_product(ProductId::new(2)).unwrap().id;
    backend.fail_cart_writes();

    let cart = storefront.cart().set_quantity(powder, 4).await.unwrap();
    assert_eq!(cart.find_by_line(powder).unwrap().quantity.get(), 4);
    assert!(backend.requests().iter().any(|r| r.is("PUT", "/cart/1/")));

    let cart = storefront.cart().remove(tea).await.unwrap();
    assert!(cart.find_by_line(tea).is_none());
    assert!(backend.requests().iter().any(|r| r.is("DELETE", "/cart/2/")));

    let guest = storefront.guest_cart().read();
    assert_eq!(guest.len(), 1);
    assert_eq!(guest.total_items(), 4);
}

#[tokio::test]
async fn test_add_rejects_non_positive_quantity() {
    let backend = FakeBackend::start().await;
    let (storefront, _store) = backend.storefront();

    let err = storefront
        .cart()
        .add(ProductId::new(1), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::InvalidQuantity(_)));
    assert!(!backend.requests().iter().any(|r| r.is("POST", "/cart/")));
}

#[tokio::test]
async fn test_session_update_addresses_product_id() {
    let backend = FakeBackend::start().await;
    let (storefront, _store) = backend.storefront();

    let cart = storefront.cart().add(ProductId::new(2), 1).await.unwrap();
    let line_id = cart.items()[0].id;
    assert_ne!(line_id.as_i64(), 2);

    let cart = storefront.cart().set_quantity(line_id, 5).await.unwrap();
    assert_eq!(cart.items()[0].quantity.get(), 5);
    assert!(backend.requests().iter().any(|r| r.is("PUT", "/cart/2/")));

    storefront.cart().remove(line_id).await.unwrap();
    assert!(backend.requests().iter().any(|r| r.is("DELETE", "/cart/2/")));
    assert!(storefront.cart().snapshot().is_empty());
}

#[tokio::test]
async fn test_authenticated_update_addresses_row_id() {
    let backend = FakeBackend::start().await;
    let storefront = logged_in(&backend).await;

    let cart = storefront.cart().add(ProductId::new(2), 1).await.unwrap();
    let row = backend.user_cart_rows("alice")[0];
    assert_eq!(cart.items()[0].id.as_i64(), row);
    assert_ne!(row, 2);

    let cart = storefront
        .cart()
        .set_quantity(cart.items()[0].id, 4)
        .await
        .unwrap();
    assert_eq!(cart.items()[0].quantity.get(), 4);
    assert_eq!(backend.user_cart("alice"), vec![(2, 4)]);

    let path = format!("/cart/{row}/");
    let put = backend
        .requests()
        .into_iter()
        .find(|r| r.is("PUT", &path))
        .unwrap();
    assert!(put.bearer);
}

#[tokio::test]
async fn test_quantity_below_one_removes_line() {
    let backend = FakeBackend::start().await;

    let (anonymous, _store) = backend.storefront();
    let cart = anonymous.cart().add(ProductId::new(1), 3).await.unwrap();
    let cart = anonymous
        .cart()
        .set_quantity(cart.items()[0].id, 0)
        .await
        .unwrap();
    assert!(cart.is_empty());
    assert!(backend.requests().iter().any(|r| r.is("DELETE", "/cart/1/")));

    let storefront = logged_in(&backend).await;
    let cart = storefront.cart().add(ProductId::new(1), 1).await.unwrap();
    let row = cart.items()[0].id;
    let cart = storefront.cart().set_quantity(row, -2).await.unwrap();
    assert!(cart.is_empty());
    assert!(backend.user_cart("alice").is_empty());
    let path = format!("/cart/{row}/");
    assert!(backend.requests().iter().any(|r| r.is("DELETE", &path)));
}

#[tokio::test]
async fn test_unknown_line_is_rejected() {
    let backend = FakeBackend::start().await;
    let (storefront, _store) = backend.storefront();

    let err = storefront
        .cart()
        .remove(miracle_core::CartItemId::new(999))
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::LineNotFound(_)));
}

#[tokio::test]
async fn test_authenticated_add_failure_surfaces() {
    let backend = FakeBackend::start().await;
    let storefront = logged_in(&backend).await;
    backend.fail_adds_for(2);

    let err = storefront
        .cart()
        .add(ProductId::new(2), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::Session(_)));
    assert!(storefront.cart().snapshot().is_empty());
}

#[tokio::test]
async fn test_load_prefers_server_cart_when_authenticated() {
    let backend = FakeBackend::start().await;
    let storefront = logged_in(&backend).await;
    backend.seed_user_cart("alice", &[(1, 1), (2, 2)]);

    let loaded = storefront.cart().load().await;
    assert_eq!(loaded.source, CartSource::Server);
    assert_eq!(loaded.snapshot.len(), 2);
    assert_eq!(storefront.cart().snapshot(), loaded.snapshot);
}

#[tokio::test]
async fn test_clear_only_touches_local_cart() {
    let backend = FakeBackend::start().await;
    let storefront = logged_in(&backend).await;
    storefront.cart().add(ProductId::new(1), 1).await.unwrap();

    storefront.cart().clear();

    assert!(storefront.cart().snapshot().is_empty());
    assert_eq!(backend.user_cart("alice"), vec![(1, 1)]);
}
