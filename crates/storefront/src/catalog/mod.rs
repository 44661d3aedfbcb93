//! Read client for products, categories and site content.
//!
//! Responses are validated entry by entry: an entry that does not match the
//! expected shape is dropped with a warning and the rest of the list is
//! kept. Media paths are made absolute against the API base URL.
//!
//! Results are cached in memory using `moka` (5-minute TTL by default).

mod cache;
pub mod types;

use std::time::Duration;

use miracle_core::{ProductId, ProductSummary};
use moka::future::Cache;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::api::{ApiClient, ApiError, Auth};

use cache::{CacheKey, CacheValue};
pub use types::{AboutVideo, Category, Product, Recipe, SiteImage};

/// List responses: a bare array, or a paginated `{ "results": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListEnvelope {
    List(Vec<Value>),
    Paged { results: Vec<Value> },
}

// =============================================================================
// CatalogClient
// =============================================================================

/// Client for the public catalog endpoints.
#[derive(Clone)]
pub struct CatalogClient {
    api: ApiClient,
    cache: Cache<CacheKey, CacheValue>,
}

impl std::fmt::Debug for CatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogClient")
            .field("api", &self.api)
            .field("cached_entries", &self.cache.entry_count())
            .finish()
    }
}

impl CatalogClient {
    /// Create a catalog client whose cache entries live for `ttl`.
    #[must_use]
    pub fn new(api: ApiClient, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(ttl)
            .build();

        Self { api, cache }
    }

    /// Drop every cached response.
    pub fn invalidate(&self) {
        self.cache.invalidate_all();
    }

    // =========================================================================
    // Products & categories
    // =========================================================================

    /// All products.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the body is not a list.
    #[instrument(skip(self))]
    pub async fn fetch_products(&self) -> Result<Vec<Product>, ApiError> {
        if let Some(CacheValue::Products(products)) = self.cache.get(&CacheKey::Products).await {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let products: Vec<Product> = self
            .fetch_list::<Product>("/products/")
            .await?
            .into_iter()
            .map(|p| self.with_absolute_image(p))
            .collect();

        self.cache
            .insert(CacheKey::Products, CacheValue::Products(products.clone()))
            .await;
        Ok(products)
    }

    /// A single product.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` for an unknown id, or any request error.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn fetch_product(&self, id: ProductId) -> Result<Product, ApiError> {
        let key = CacheKey::Product(id);
        if let Some(CacheValue::Product(product)) = self.cache.get(&key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let product: Product = self
            .api
            .get_json(&format!("/products/{id}/"), Auth::None)
            .await?;
        let product = self.with_absolute_image(product);

        self.cache
            .insert(key, CacheValue::Product(Box::new(product.clone())))
            .await;
        Ok(product)
    }

    /// Products in the category with the given name.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the body is not a list.
    #[instrument(skip(self))]
    pub async fn products_by_category(&self, name: &str) -> Result<Vec<Product>, ApiError> {
        let key = CacheKey::ProductsInCategory(name.to_string());
        if let Some(CacheValue::Products(products)) = self.cache.get(&key).await {
            debug!("Cache hit for category products");
            return Ok(products);
        }

        let path = format!("/products-by-category/{}/", urlencoding::encode(name));
        let products: Vec<Product> = self
            .fetch_list::<Product>(&path)
            .await?
            .into_iter()
            .map(|p| self.with_absolute_image(p))
            .collect();

        self.cache
            .insert(key, CacheValue::Products(products.clone()))
            .await;
        Ok(products)
    }

    /// All categories.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the body is not a list.
    #[instrument(skip(self))]
    pub async fn fetch_categories(&self) -> Result<Vec<Category>, ApiError> {
        if let Some(CacheValue::Categories(categories)) =
            self.cache.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories = self.fetch_list::<Category>("/categories/").await?;

        self.cache
            .insert(
                CacheKey::Categories,
                CacheValue::Categories(categories.clone()),
            )
            .await;
        Ok(categories)
    }

    /// The cart-line view of a product, for adding by id alone.
    ///
    /// # Errors
    ///
    /// Returns error if the product cannot be fetched.
    pub async fn product_summary(&self, id: ProductId) -> Result<ProductSummary, ApiError> {
        if let Some(CacheValue::Products(products)) = self.cache.get(&CacheKey::Products).await
            && let Some(product) = products.iter().find(|p| p.id == id)
        {
            return Ok(product.summary());
        }
        Ok(self.fetch_product(id).await?.summary())
    }

    // =========================================================================
    // Content
    // =========================================================================

    /// All recipes.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the body is not a list.
    #[instrument(skip(self))]
    pub async fn fetch_recipes(&self) -> Result<Vec<Recipe>, ApiError> {
        if let Some(CacheValue::Recipes(recipes)) = self.cache.get(&CacheKey::Recipes).await {
            return Ok(recipes);
        }

        let recipes: Vec<Recipe> = self
            .fetch_list::<Recipe>("/recipes/")
            .await?
            .into_iter()
            .map(|mut r| {
                r.image = self.api.absolute_url(r.image.as_deref());
                r
            })
            .collect();

        self.cache
            .insert(CacheKey::Recipes, CacheValue::Recipes(recipes.clone()))
            .await;
        Ok(recipes)
    }

    /// Videos for the About page.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the body is not a list.
    #[instrument(skip(self))]
    pub async fn fetch_about_videos(&self) -> Result<Vec<AboutVideo>, ApiError> {
        if let Some(CacheValue::AboutVideos(videos)) =
            self.cache.get(&CacheKey::AboutVideos).await
        {
            return Ok(videos);
        }

        let videos: Vec<AboutVideo> = self
            .fetch_list::<AboutVideo>("/about-videos/")
            .await?
            .into_iter()
            .map(|mut v| {
                v.video = self.api.absolute_url(v.video.as_deref());
                v
            })
            .collect();

        self.cache
            .insert(CacheKey::AboutVideos, CacheValue::AboutVideos(videos.clone()))
            .await;
        Ok(videos)
    }

    /// Uploaded site images.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the body is not a list.
    #[instrument(skip(self))]
    pub async fn fetch_images(&self) -> Result<Vec<SiteImage>, ApiError> {
        if let Some(CacheValue::Images(images)) = self.cache.get(&CacheKey::Images).await {
            return Ok(images);
        }

        let images: Vec<SiteImage> = self
            .fetch_list::<SiteImage>("/get-all-images/")
            .await?
            .into_iter()
            .filter_map(|mut i| {
                i.image = self.api.absolute_url(Some(&i.image))?;
                Some(i)
            })
            .collect();

        self.cache
            .insert(CacheKey::Images, CacheValue::Images(images.clone()))
            .await;
        Ok(images)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn fetch_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ApiError> {
        let envelope: ListEnvelope = self.api.get_json(path, Auth::None).await?;
        let (ListEnvelope::List(entries) | ListEnvelope::Paged { results: entries }) = envelope;
        Ok(validate_entries(entries, path))
    }

    fn with_absolute_image(&self, mut product: Product) -> Product {
        product.image = self.api.absolute_url(product.image.as_deref());
        product
    }
}

/// Keep the entries that decode as `T`, warning about the rest.
fn validate_entries<T: DeserializeOwned>(entries: Vec<Value>, path: &str) -> Vec<T> {
    let total = entries.len();
    let valid: Vec<T> = entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<T>(entry) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(path, error = %e, "Dropping malformed catalog entry");
                None
            }
        })
        .collect();

    if valid.len() < total {
        debug!(path, kept = valid.len(), total, "Catalog entries validated");
    }
    valid
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_validate_entries_drops_malformed() {
        let entries = vec![
            json!({"id": 1, "name": "Powder", "price": "12.50"}),
            json!({"id": "x", "name": "Broken", "price": "1.00"}),
            json!({"name": "No id", "price": "1.00"}),
            json!({"id": 2, "name": "Tea", "price": 4}),
            json!("junk"),
        ];

        let products: Vec<Product> = validate_entries(entries, "/products/");
        assert_eq!(products.len(), 2);
        assert_eq!(products.get(1).unwrap().name, "Tea");
    }

    #[test]
    fn test_validate_categories() {
        let entries = vec![
            json!({"id": 1, "name": "Powders"}),
            json!({"id": 2}),
        ];
        let categories: Vec<Category> = validate_entries(entries, "/categories/");
        assert_eq!(categories.len(), 1);
    }
}
