//! Logout keeps the account cart as the new guest cart.

use miracle_core::ProductId;
use miracle_integration_tests::{ALICE_PASSWORD, FakeBackend};
use miracle_storefront::session::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, SessionState};
use miracle_storefront::storage::KeyValueStore;
use secrecy::SecretString;

#[tokio::test]
async fn test_logout_snapshots_server_cart() {
    let backend = FakeBackend::start().await;
    backend.seed_user_cart("alice", &[(1, 2), (3, 1)]);
    let (storefront, store) = backend.storefront();

    storefront
        .session()
        .login("alice", &SecretString::from(ALICE_PASSWORD.to_string()))
        .await
        .unwrap();
    storefront.cart().clear();
    assert!(storefront.guest_cart().read().is_empty());

    storefront.session().logout().await;

    let guest = storefront.guest_cart().read();
    let rows = backend.user_cart_rows("alice");
    assert_eq!(guest.len(), 2);
    assert_eq!(guest.items()[0].id.as_i64(), rows[0]);
    assert_eq!(
        guest
            .find_by_product(ProductId::new(1))
            .unwrap()
            .quantity
            .get(),
        2
    );
    assert_eq!(
        guest
            .find_by_product(ProductId::new(3))
            .unwrap()
            .quantity
            .get(),
        1
    );

    assert_eq!(storefront.session().state().await, SessionState::Anonymous);
    assert!(store.get(ACCESS_TOKEN_KEY).unwrap().is_none());
    assert!(store.get(REFRESH_TOKEN_KEY).unwrap().is_none());
}

#[tokio::test]
async fn test_logout_posts_refresh_token_without_bearer() {
    let backend = FakeBackend::start().await;
    let (storefront, _store) = backend.storefront();

    storefront
        .session()
        .login("alice", &SecretString::from(ALICE_PASSWORD.to_string()))
        .await
        .unwrap();
    storefront.session().logout().await;

    let logout = backend
        .requests()
        .into_iter()
        .find(|r| r.is("POST", "/logout/"))
        .unwrap();
    assert!(!logout.bearer);
}

#[tokio::test]
async fn test_logout_with_empty_server_cart_keeps_guest_cart() {
    let backend = FakeBackend::start().await;
    let (storefront, _store) = backend.storefront();

    storefront
        .session()
        .login("alice", &SecretString::from(ALICE_PASSWORD.to_string()))
        .await
        .unwrap();

    // The mirror holds a line the server never saw.
    backend.seed_user_cart("alice", &[(2, 1)]);
    storefront.cart().load().await;
    backend.seed_user_cart("alice", &[]);

    storefront.session().logout().await;

    let guest = storefront.guest_cart().read();
    assert_eq!(guest.len(), 1);
    assert!(guest.find_by_product(ProductId::new(2)).is_some());
}

#[tokio::test]
async fn test_logout_when_anonymous_is_harmless() {
    let backend = FakeBackend::start().await;
    let (storefront, _store) = backend.storefront();

    storefront.cart().add(ProductId::new(2), 1).await.unwrap();
    storefront.session().logout().await;

    assert_eq!(storefront.guest_cart().read().len(), 1);
    assert!(!backend.requests().iter().any(|r| r.is("POST", "/logout/")));
}
