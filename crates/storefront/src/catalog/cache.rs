//! Cache types for catalog responses.

use miracle_core::ProductId;

use super::types::{AboutVideo, Category, Product, Recipe, SiteImage};

/// Cache key for catalog reads.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Products,
    Product(ProductId),
    ProductsInCategory(String),
    Categories,
    Recipes,
    AboutVideos,
    Images,
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Products(Vec<Product>),
    Product(Box<Product>),
    Categories(Vec<Category>),
    Recipes(Vec<Recipe>),
    AboutVideos(Vec<AboutVideo>),
    Images(Vec<SiteImage>),
}
