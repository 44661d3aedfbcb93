//! Guest-cart merge at login.

use miracle_core::ProductId;
use miracle_integration_tests::{ALICE_PASSWORD, FakeBackend};
use secrecy::SecretString;

fn password(raw: &str) -> SecretString {
    SecretString::from(raw.to_string())
}

#[tokio::test]
async fn test_login_merge_sums_overlapping_products() {
    let backend = FakeBackend::start().await;
    backend.seed_user_cart("alice", &[(1, 3), (2, 1)]);
    let (storefront, _store) = backend.storefront();

    storefront.cart().add(ProductId::new(1), 2).await.unwrap();

    let report = storefront
        .session()
        .login("alice", &password(ALICE_PASSWORD))
        .await
        .unwrap();

    assert!(report.is_clean());
    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(backend.user_cart("alice"), vec![(1, 5), (2, 1)]);

    let guest = storefront.guest_cart().read();
    assert_eq!(guest.len(), 2);
    assert_eq!(
        guest
            .find_by_product(ProductId::new(1))
            .unwrap()
            .quantity
            .get(),
        5
    );
    assert_eq!(report.canonical.as_ref(), Some(&guest));
    assert!(storefront.session().is_authenticated().await);
}

#[tokio::test]
async fn test_login_merge_keeps_disjoint_products() {
    let backend = FakeBackend::start().await;
    backend.seed_user_cart("alice", &[(2, 1)]);
    let (storefront, _store) = backend.storefront();

    storefront.cart().add(ProductId::new(1), 2).await.unwrap();
    storefront
        .session()
        .login("alice", &password(ALICE_PASSWORD))
        .await
        .unwrap();

    assert_eq!(backend.user_cart("alice"), vec![(2, 1), (1, 2)]);
    assert_eq!(storefront.cart().snapshot().total_items(), 3);
}

#[tokio::test]
async fn test_login_merge_tolerates_failed_writes() {
    let backend = FakeBackend::start().await;
    let (storefront, _store) = backend.storefront();

    storefront.cart().add(ProductId::new(1), 1).await.unwrap();
    storefront.cart().add(ProductId::new(2), 4).await.unwrap();
    backend.fail_adds_for(1);

    let report = storefront
        .session()
        .login("alice", &password(ALICE_PASSWORD))
        .await
        .unwrap();

    assert!(report.has_partial_failure());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].product_id(), ProductId::new(1));
    assert_eq!(report.succeeded.len(), 1);

    // Login still completes and the mirror shows what the server holds.
    assert!(storefront.session().is_authenticated().await);
    assert_eq!(backend.user_cart("alice"), vec![(2, 4)]);
    let guest = storefront.guest_cart().read();
    assert_eq!(guest.len(), 1);
    assert!(guest.find_by_product(ProductId::new(1)).is_none());
}

#[tokio::test]
async fn test_login_with_empty_guest_cart_adopts_server_cart() {
    let backend = FakeBackend::start().await;
    backend.seed_user_cart("alice", &[(3, 2)]);
    let (storefront, _store) = backend.storefront();

    let report = storefront
        .session()
        .login("alice", &password(ALICE_PASSWORD))
        .await
        .unwrap();

    assert!(report.succeeded.is_empty());
    assert!(
        !backend
            .requests()
            .iter()
            .any(|r| r.is("POST", "/cart/") || r.method == "PUT")
    );

    let guest = storefront.guest_cart().read();
    assert_eq!(guest.len(), 1);
    let line = &guest.items()[0];
    assert_eq!(line.product.name, "Moringa Capsules");
    assert_eq!(line.id.as_i64(), backend.user_cart_rows("alice")[0]);
}
