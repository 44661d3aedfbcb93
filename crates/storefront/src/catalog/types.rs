//! Catalog and content types as served by the backend.

use chrono::{DateTime, Utc};
use miracle_core::{CategoryId, ImageId, Price, ProductId, ProductSummary, RecipeId, VideoId};
use serde::{Deserialize, Serialize};

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Price,
    #[serde(default)]
    pub stock: Option<i64>,
    /// Absolute image URL once fetched through the catalog client.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub category: Option<Category>,
}

impl Product {
    /// The fields a cart line embeds.
    #[must_use]
    pub fn summary(&self) -> ProductSummary {
        ProductSummary {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
            image: self.image.clone(),
        }
    }

    /// Active and not known to be out of stock.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.is_active && self.stock.is_none_or(|s| s > 0)
    }
}

/// A moringa recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub title: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub benefits: String,
}

/// A video on the About page: an uploaded file, a YouTube id, or both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AboutVideo {
    pub id: VideoId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub video: Option<String>,
    #[serde(default)]
    pub youtube_id: Option<String>,
}

impl AboutVideo {
    /// Backend path that streams an uploaded video file.
    #[must_use]
    pub fn stream_path(&self) -> Option<String> {
        self.video
            .as_ref()
            .map(|_| format!("/about-videos/{}/stream/", self.id))
    }

    /// Embeddable player URL for a YouTube video.
    #[must_use]
    pub fn youtube_embed_url(&self) -> Option<String> {
        self.youtube_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| format!("https://www.youtube.com/embed/{id}"))
    }
}

/// An uploaded site image (hero banners, logo).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteImage {
    pub id: ImageId,
    pub image: String,
    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
}

const fn default_true() -> bool {
    true
}
