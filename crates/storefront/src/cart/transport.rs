//! HTTP operations on the remote carts.
//!
//! The backend serves two carts behind the same `/cart/` endpoints:
//!
//! - the authenticated cart, reached with a bearer token, whose rows are
//!   addressed by the server-assigned row id;
//! - the anonymous session cart, reached with the session cookie, whose
//!   rows are addressed by product id.
//!
//! [`CartTransport`] hides the addressing difference behind [`LineRef`]
//! and serializes mutations that touch the same row.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use miracle_core::{CartItemId, CartLineItem, CartSnapshot, ProductId, Quantity};
use reqwest::Method;
use secrecy::SecretString;
use tracing::{debug, instrument};

use super::normalize::normalize_cart;
use crate::api::types::{AddToCartRequest, UpdateCartRequest};
use crate::api::{ApiClient, ApiError, Auth};

/// Which remote cart a request targets.
#[derive(Debug, Clone)]
pub enum CartMode {
    /// The logged-in user's cart.
    Authenticated(SecretString),
    /// The anonymous cart bound to the session cookie.
    Session,
}

impl CartMode {
    fn auth(&self) -> Auth<'_> {
        match self {
            Self::Authenticated(token) => Auth::Bearer(token),
            Self::Session => Auth::None,
        }
    }

    const fn label(&self) -> &'static str {
        match self {
            Self::Authenticated(_) => "auth",
            Self::Session => "session",
        }
    }
}

/// Both keys a remote cart row can be addressed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRef {
    pub line: CartItemId,
    pub product: ProductId,
}

impl LineRef {
    /// The path key for a mode: row id when authenticated, product id for
    /// the session cart.
    #[must_use]
    pub fn address(&self, mode: &CartMode) -> i64 {
        match mode {
            CartMode::Authenticated(_) => self.line.as_i64(),
            CartMode::Session => self.product.as_i64(),
        }
    }
}

impl From<&CartLineItem> for LineRef {
    fn from(item: &CartLineItem) -> Self {
        Self {
            line: item.id,
            product: item.product.id,
        }
    }
}

// =============================================================================
// Per-key locks
// =============================================================================

/// Async mutexes created on demand, one per key.
#[derive(Debug, Default)]
struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    async fn acquire(&self, key: String) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Drop locks nobody holds or waits on.
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            Arc::clone(locks.entry(key).or_default())
        };
        lock.lock_owned().await
    }
}

// =============================================================================
// CartTransport
// =============================================================================

/// Fetch and mutate the remote carts.
#[derive(Clone, Debug)]
pub struct CartTransport {
    api: ApiClient,
    locks: Arc<KeyedLocks>,
}

impl CartTransport {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            locks: Arc::new(KeyedLocks::default()),
        }
    }

    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    /// `GET /cart/`, normalized.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or non-2xx status.
    #[instrument(skip(self, mode), fields(mode = mode.label()))]
    pub async fn fetch_cart(&self, mode: &CartMode) -> Result<CartSnapshot, ApiError> {
        let body: serde_json::Value = self.api.get_json("/cart/", mode.auth()).await?;
        let cart = normalize_cart(body, self.api.base_url());
        debug!(lines = cart.len(), "Fetched cart");
        Ok(cart)
    }

    /// `POST /cart/`. The backend adds to any existing quantity.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or non-2xx status.
    #[instrument(skip(self, mode), fields(mode = mode.label(), product_id = %product_id, quantity = %quantity))]
    pub async fn add_item(
        &self,
        product_id: ProductId,
        quantity: Quantity,
        mode: &CartMode,
    ) -> Result<(), ApiError> {
        let _guard = self
            .locks
            .acquire(lock_key(mode, product_id.as_i64()))
            .await;

        let body = AddToCartRequest {
            product: product_id.as_i64(),
            quantity: quantity.get(),
        };
        self.api
            .send_unit(Method::POST, "/cart/", &body, mode.auth())
            .await
    }

    /// `PUT /cart/{key}/` with a new quantity. Below one removes the row.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or non-2xx status.
    #[instrument(skip(self, mode), fields(mode = mode.label(), line = ?line, quantity = quantity))]
    pub async fn update_quantity(
        &self,
        line: LineRef,
        quantity: i64,
        mode: &CartMode,
    ) -> Result<(), ApiError> {
        let Some(quantity) = Quantity::new(quantity) else {
            return self.remove_item(line, mode).await;
        };

        let _guard = self
            .locks
            .acquire(lock_key(mode, line.product.as_i64()))
            .await;

        let body = UpdateCartRequest {
            product: matches!(mode, CartMode::Session).then(|| line.product.as_i64()),
            quantity: quantity.get(),
        };
        let path = format!("/cart/{}/", line.address(mode));
        self.api
            .send_unit(Method::PUT, &path, &body, mode.auth())
            .await
    }

    /// `DELETE /cart/{key}/`.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or non-2xx status.
    #[instrument(skip(self, mode), fields(mode = mode.label(), line = ?line))]
    pub async fn remove_item(&self, line: LineRef, mode: &CartMode) -> Result<(), ApiError> {
        let _guard = self
            .locks
            .acquire(lock_key(mode, line.product.as_i64()))
            .await;

        let path = format!("/cart/{}/", line.address(mode));
        self.api.delete(&path, mode.auth()).await
    }
}

/// Mutations are keyed by product so an add and an update of the same row
/// never interleave.
fn lock_key(mode: &CartMode, product_id: i64) -> String {
    format!("{}:{product_id}", mode.label())
}
