//! Back-office REST client.
//!
//! Every call requires the current session to belong to an administrator
//! and runs through [`SessionController::with_auth`], so an expired access
//! token is refreshed once before the call fails. Writes invalidate the
//! storefront's catalog cache.

use miracle_core::{CategoryId, CouponId, ProductId, RecipeId, UserRecord};
use miracle_storefront::Storefront;
use miracle_storefront::api::{ApiClient, ApiError, Auth};
use miracle_storefront::catalog::{CatalogClient, Category, Product, Recipe};
use miracle_storefront::session::SessionController;
use reqwest::Method;
use reqwest::multipart::{Form, Part};
use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, instrument};

use crate::error::AdminError;
use crate::types::{
    CategoryInput, Coupon, CouponInput, ImageUpload, ProductInput, RecipeInput, UserCount,
};

/// Client for the admin endpoints.
#[derive(Debug, Clone)]
pub struct AdminClient {
    api: ApiClient,
    session: SessionController,
    catalog: CatalogClient,
}

impl AdminClient {
    /// Create an admin client sharing the storefront's HTTP client and
    /// session.
    #[must_use]
    pub fn new(storefront: &Storefront) -> Self {
        Self {
            api: storefront.api().clone(),
            session: storefront.session().clone(),
            catalog: storefront.catalog().clone(),
        }
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// # Errors
    ///
    /// Returns error if the user is not an admin or the request fails.
    pub async fn list_categories(&self) -> Result<Vec<Category>, AdminError> {
        self.get("/categories/").await
    }

    /// # Errors
    ///
    /// Returns error if the name is empty, the user is not an admin or the
    /// request fails.
    #[instrument(skip(self), fields(name = %input.name))]
    pub async fn create_category(&self, input: &CategoryInput) -> Result<Category, AdminError> {
        require_non_empty("category name", &input.name)?;
        let category = self.send(Method::POST, "/categories/", input).await?;
        info!("Category created");
        Ok(category)
    }

    /// # Errors
    ///
    /// Returns error if the name is empty, the user is not an admin or the
    /// request fails.
    #[instrument(skip(self, input), fields(category_id = %id))]
    pub async fn update_category(
        &self,
        id: CategoryId,
        input: &CategoryInput,
    ) -> Result<Category, AdminError> {
        require_non_empty("category name", &input.name)?;
        self.send(Method::PUT, &format!("/categories/{id}/"), input)
            .await
    }

    /// # Errors
    ///
    /// Returns error if the user is not an admin or the request fails.
    #[instrument(skip(self), fields(category_id = %id))]
    pub async fn delete_category(&self, id: CategoryId) -> Result<(), AdminError> {
        self.delete(&format!("/categories/{id}/")).await
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Every product, including inactive ones.
    ///
    /// # Errors
    ///
    /// Returns error if the user is not an admin or the request fails.
    pub async fn list_products(&self) -> Result<Vec<Product>, AdminError> {
        self.get("/products/").await
    }

    /// # Errors
    ///
    /// Returns error if the input is invalid, the user is not an admin or
    /// the request fails.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(&self, input: &ProductInput) -> Result<Product, AdminError> {
        validate_product(input)?;
        let product = self
            .send_form(Method::POST, "/products/", || product_form(input))
            .await?;
        info!("Product created");
        Ok(product)
    }

    /// # Errors
    ///
    /// Returns error if the input is invalid, the user is not an admin or
    /// the request fails.
    #[instrument(skip(self, input), fields(product_id = %id))]
    pub async fn update_product(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, AdminError> {
        validate_product(input)?;
        self.send_form(Method::PUT, &format!("/products/{id}/"), || {
            product_form(input)
        })
        .await
    }

    /// # Errors
    ///
    /// Returns error if the user is not an admin or the request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete_product(&self, id: ProductId) -> Result<(), AdminError> {
        self.delete(&format!("/products/{id}/")).await
    }

    // =========================================================================
    // Coupons
    // =========================================================================

    /// # Errors
    ///
    /// Returns error if the user is not an admin or the request fails.
    pub async fn list_coupons(&self) -> Result<Vec<Coupon>, AdminError> {
        self.get("/coupons/").await
    }

    /// # Errors
    ///
    /// Returns error if the input is invalid, the user is not an admin or
    /// the request fails.
    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create_coupon(&self, input: &CouponInput) -> Result<Coupon, AdminError> {
        validate_coupon(input)?;
        self.send(Method::POST, "/coupons/", input).await
    }

    /// # Errors
    ///
    /// Returns error if the input is invalid, the user is not an admin or
    /// the request fails.
    #[instrument(skip(self, input), fields(coupon_id = %id))]
    pub async fn update_coupon(
        &self,
        id: CouponId,
        input: &CouponInput,
    ) -> Result<Coupon, AdminError> {
        validate_coupon(input)?;
        self.send(Method::PUT, &format!("/coupons/{id}/"), input)
            .await
    }

    /// # Errors
    ///
    /// Returns error if the user is not an admin or the request fails.
    #[instrument(skip(self), fields(coupon_id = %id))]
    pub async fn delete_coupon(&self, id: CouponId) -> Result<(), AdminError> {
        self.delete(&format!("/coupons/{id}/")).await
    }

    // =========================================================================
    // Recipes
    // =========================================================================

    /// # Errors
    ///
    /// Returns error if the user is not an admin or the request fails.
    pub async fn list_recipes(&self) -> Result<Vec<Recipe>, AdminError> {
        self.get("/recipes/").await
    }

    /// # Errors
    ///
    /// Returns error if the title is empty, the user is not an admin or the
    /// request fails.
    #[instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create_recipe(&self, input: &RecipeInput) -> Result<Recipe, AdminError> {
        require_non_empty("recipe title", &input.title)?;
        self.send_form(Method::POST, "/recipes/", || recipe_form(input))
            .await
    }

    /// # Errors
    ///
    /// Returns error if the title is empty, the user is not an admin or the
    /// request fails.
    #[instrument(skip(self, input), fields(recipe_id = %id))]
    pub async fn update_recipe(
        &self,
        id: RecipeId,
        input: &RecipeInput,
    ) -> Result<Recipe, AdminError> {
        require_non_empty("recipe title", &input.title)?;
        self.send_form(Method::PUT, &format!("/recipes/{id}/"), || {
            recipe_form(input)
        })
        .await
    }

    /// # Errors
    ///
    /// Returns error if the user is not an admin or the request fails.
    #[instrument(skip(self), fields(recipe_id = %id))]
    pub async fn delete_recipe(&self, id: RecipeId) -> Result<(), AdminError> {
        self.delete(&format!("/recipes/{id}/")).await
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Registered and active user counts for the dashboard.
    ///
    /// # Errors
    ///
    /// Returns error if the user is not an admin or the request fails.
    pub async fn user_count(&self) -> Result<UserCount, AdminError> {
        self.get("/user-count/").await
    }

    /// # Errors
    ///
    /// Returns error if the user is not an admin or the request fails.
    pub async fn list_users(&self) -> Result<Vec<UserRecord>, AdminError> {
        self.get("/users/").await
    }

    // =========================================================================
    // Request helpers
    // =========================================================================

    async fn ensure_admin(&self) -> Result<(), AdminError> {
        if !self.session.is_authenticated().await {
            return Err(AdminError::Forbidden("login required".to_string()));
        }
        if !self.session.is_admin().await {
            return Err(AdminError::Forbidden("admin access required".to_string()));
        }
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AdminError> {
        self.ensure_admin().await?;
        let api = &self.api;
        Ok(self
            .session
            .with_auth(|token| async move { api.get_json(path, Auth::Bearer(&token)).await })
            .await?)
    }

    async fn send<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, AdminError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        self.ensure_admin().await?;
        let api = &self.api;
        let result = self
            .session
            .with_auth(|token| {
                let method = method.clone();
                async move {
                    api.send_json(method, path, body, Auth::Bearer(&token))
                        .await
                }
            })
            .await?;
        self.catalog.invalidate();
        Ok(result)
    }

    async fn send_form<T, F>(&self, method: Method, path: &str, build: F) -> Result<T, AdminError>
    where
        T: DeserializeOwned,
        F: Fn() -> Result<Form, ApiError>,
    {
        self.ensure_admin().await?;
        let api = &self.api;
        let build = &build;
        let result = self
            .session
            .with_auth(|token| {
                let method = method.clone();
                async move {
                    let form = build()?;
                    api.send_multipart(method, path, form, Auth::Bearer(&token))
                        .await
                }
            })
            .await?;
        self.catalog.invalidate();
        Ok(result)
    }

    async fn delete(&self, path: &str) -> Result<(), AdminError> {
        self.ensure_admin().await?;
        let api = &self.api;
        self.session
            .with_auth(|token| async move { api.delete(path, Auth::Bearer(&token)).await })
            .await?;
        self.catalog.invalidate();
        Ok(())
    }
}

// =============================================================================
// Validation & form building
// =============================================================================

fn require_non_empty(field: &str, value: &str) -> Result<(), AdminError> {
    if value.trim().is_empty() {
        return Err(AdminError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}

fn validate_product(input: &ProductInput) -> Result<(), AdminError> {
    require_non_empty("product name", &input.name)?;
    if input.price.is_sign_negative() {
        return Err(AdminError::BadRequest("price cannot be negative".to_string()));
    }
    if input.stock < 0 {
        return Err(AdminError::BadRequest("stock cannot be negative".to_string()));
    }
    Ok(())
}

fn validate_coupon(input: &CouponInput) -> Result<(), AdminError> {
    require_non_empty("coupon code", &input.code)?;
    if input.discount <= Decimal::ZERO || input.discount > Decimal::ONE_HUNDRED {
        return Err(AdminError::BadRequest(
            "discount must be between 0 and 100 percent".to_string(),
        ));
    }
    if let (Some(from), Some(to)) = (input.valid_from, input.valid_to)
        && to < from
    {
        return Err(AdminError::BadRequest(
            "coupon expires before it starts".to_string(),
        ));
    }
    Ok(())
}

fn image_part(image: &ImageUpload) -> Result<Part, ApiError> {
    Ok(Part::bytes(image.bytes.clone())
        .file_name(image.file_name.clone())
        .mime_str(image.mime())?)
}

fn product_form(input: &ProductInput) -> Result<Form, ApiError> {
    let mut form = Form::new()
        .text("name", input.name.trim().to_string())
        .text("description", input.description.clone())
        .text("price", input.price.to_string())
        .text("stock", input.stock.to_string())
        .text("is_active", input.is_active.to_string());

    if let Some(category_id) = input.category_id {
        form = form.text("category_id", category_id.to_string());
    }
    if let Some(image) = &input.image {
        form = form.part("image", image_part(image)?);
    }
    Ok(form)
}

fn recipe_form(input: &RecipeInput) -> Result<Form, ApiError> {
    let non_blank = |items: &[String]| -> Vec<String> {
        items
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    };

    let mut form = Form::new()
        .text("title", input.title.trim().to_string())
        .text(
            "ingredients",
            serde_json::to_string(&non_blank(&input.ingredients))?,
        )
        .text(
            "instructions",
            serde_json::to_string(&non_blank(&input.instructions))?,
        )
        .text("benefits", input.benefits.clone());

    if let Some(image) = &input.image {
        form = form.part("image", image_part(image)?);
    }
    Ok(form)
}
