//! Catalog reads and caching.

use miracle_core::ProductId;
use miracle_integration_tests::FakeBackend;
use miracle_storefront::api::ApiError;

#[tokio::test]
async fn test_products_have_absolute_images() {
    let backend = FakeBackend::start().await;
    let (storefront, _store) = backend.storefront();

    let products = storefront.catalog().fetch_products().await.unwrap();
    assert_eq!(products.len(), 3);

    let powder = &products[0];
    assert_eq!(
        powder.image.as_deref(),
        Some(format!("{}/media/products/powder.png", backend.base_url()).as_str())
    );
    assert_eq!(powder.category.as_ref().unwrap().name, "Powders");
    assert!(powder.is_available());

    let capsules = &products[2];
    assert_eq!(
        capsules.image.as_deref(),
        Some("https://cdn.example.com/capsules.png")
    );
    assert!(!capsules.is_available());
    assert!(products[1].image.is_none());
}

#[tokio::test]
async fn test_product_list_is_cached() {
    let backend = FakeBackend::start().await;
    let (storefront, _store) = backend.storefront();

    storefront.catalog().fetch_products().await.unwrap();
    storefront.catalog().fetch_products().await.unwrap();

    let fetches = backend
        .requests()
        .iter()
        .filter(|r| r.is("GET", "/products/"))
        .count();
    assert_eq!(fetches, 1);

    storefront.catalog().invalidate();
    storefront.catalog().fetch_products().await.unwrap();
    let fetches = backend
        .requests()
        .iter()
        .filter(|r| r.is("GET", "/products/"))
        .count();
    assert_eq!(fetches, 2);
}

#[tokio::test]
async fn test_single_product_and_missing_product() {
    let backend = FakeBackend::start().await;
    let (storefront, _store) = backend.storefront();

    let tea = storefront
        .catalog()
        .fetch_product(ProductId::new(2))
        .await
        .unwrap();
    assert_eq!(tea.name, "Moringa Tea");
    assert_eq!(tea.price.to_string(), "$8.00");

    let err = storefront
        .catalog()
        .fetch_product(ProductId::new(404))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_products_by_category() {
    let backend = FakeBackend::start().await;
    let (storefront, _store) = backend.storefront();

    let powders = storefront
        .catalog()
        .products_by_category("Powders")
        .await
        .unwrap();
    let ids: Vec<i64> = powders.iter().map(|p| p.id.as_i64()).collect();
    assert_eq!(ids, vec![1, 3]);

    let none = storefront
        .catalog()
        .products_by_category("Oils")
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_content_endpoints() {
    let backend = FakeBackend::start().await;
    let (storefront, _store) = backend.storefront();
    let catalog = storefront.catalog();

    let categories = catalog.fetch_categories().await.unwrap();
    assert_eq!(categories.len(), 2);

    let recipes = catalog.fetch_recipes().await.unwrap();
    assert_eq!(recipes[0].ingredients.len(), 2);
    assert!(recipes[0].image.as_deref().unwrap().starts_with("http://"));

    // The entry without an id is dropped.
    let videos = catalog.fetch_about_videos().await.unwrap();
    assert_eq!(videos.len(), 2);
    assert_eq!(
        videos[0].youtube_embed_url().as_deref(),
        Some("https://www.youtube.com/embed/dQw4w9WgXcQ")
    );
    assert_eq!(videos[1].stream_path().as_deref(), Some("/about-videos/2/stream/"));

    // Paged envelope.
    let images = catalog.fetch_images().await.unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(
        images[0].image,
        format!("{}/media/site/hero.jpg", backend.base_url())
    );
}
