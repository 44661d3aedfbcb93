//! Back-office payloads.

use std::path::Path;

use chrono::{DateTime, Utc};
use miracle_core::{CategoryId, CouponId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// `POST /categories/` and `PUT /categories/{id}/` body.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryInput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// An image file to upload with a product or recipe.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Read an image from disk.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Self { file_name, bytes })
    }

    /// MIME type guessed from the file extension.
    #[must_use]
    pub fn mime(&self) -> &'static str {
        let ext = Path::new(&self.file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase());
        match ext.as_deref() {
            Some("png") => "image/png",
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            Some("svg") => "image/svg+xml",
            _ => "application/octet-stream",
        }
    }
}

/// Fields of a product create or update, sent as multipart form data.
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i64,
    pub category_id: Option<CategoryId>,
    pub is_active: bool,
    /// New image; `None` keeps the current one on update.
    pub image: Option<ImageUpload>,
}

/// A discount coupon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    #[serde(default)]
    pub id: Option<CouponId>,
    pub code: String,
    /// Percentage off.
    pub discount: Decimal,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_to: Option<DateTime<Utc>>,
}

/// `POST /coupons/` and `PUT /coupons/{id}/` body.
#[derive(Debug, Clone, Serialize)]
pub struct CouponInput {
    pub code: String,
    pub discount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<DateTime<Utc>>,
}

/// Fields of a recipe create or update, sent as multipart form data.
///
/// `ingredients` and `instructions` travel as JSON-encoded string lists.
#[derive(Debug, Clone)]
pub struct RecipeInput {
    pub title: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub benefits: String,
    pub image: Option<ImageUpload>,
}

/// `GET /user-count/` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct UserCount {
    pub total_users: u64,
    #[serde(default)]
    pub active_users: u64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_mime_from_extension() {
        let upload = ImageUpload {
            file_name: "Leaf.JPG".to_string(),
            bytes: vec![],
        };
        assert_eq!(upload.mime(), "image/jpeg");

        let upload = ImageUpload {
            file_name: "notes".to_string(),
            bytes: vec![],
        };
        assert_eq!(upload.mime(), "application/octet-stream");
    }

    #[test]
    fn test_coupon_deserialize() {
        let coupon: Coupon =
            serde_json::from_value(json!({"id": 2, "code": "MORINGA10", "discount": "10.00"}))
                .unwrap();
        assert_eq!(coupon.code, "MORINGA10");
        assert_eq!(coupon.discount, Decimal::new(10, 0));
        assert!(coupon.valid_to.is_none());
    }

    #[test]
    fn test_coupon_input_skips_unset_fields() {
        let input = CouponInput {
            code: "WELCOME".to_string(),
            discount: Decimal::new(15, 0),
            is_active: None,
            valid_from: None,
            valid_to: None,
        };
        let value = serde_json::to_value(&input).unwrap();
        assert_eq!(value, json!({"code": "WELCOME", "discount": "15"}));
    }
}
