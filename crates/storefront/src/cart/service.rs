//! The cart as the shopper sees it.
//!
//! [`CartService`] picks the right cart for the session state and keeps the
//! guest store as a mirror of whatever was last shown, so checkout can read
//! the cart without another round trip.
//!
//! | state         | reads                                  | writes                |
//! |---------------|----------------------------------------|-----------------------|
//! | authenticated | server cart, then session, then guest  | server cart (bearer)  |
//! | anonymous     | session cart if non-empty, else guest  | session cart + mirror |

use miracle_core::{
    CartItemId, CartLineItem, CartSnapshot, InvalidQuantity, Price, ProductId, ProductSummary,
    Quantity,
};
use thiserror::Error;
use tracing::{info, instrument, warn};

use super::normalize::UNNAMED_PRODUCT;
use super::store::GuestCartStore;
use super::transport::{CartMode, CartTransport, LineRef};
use crate::catalog::CatalogClient;
use crate::error::add_breadcrumb;
use crate::session::{SessionController, SessionError};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The authenticated request failed, or the session expired.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Quantity below one where a positive one is required.
    #[error(transparent)]
    InvalidQuantity(#[from] InvalidQuantity),

    /// No line with this id in the current cart.
    #[error("Cart line not found: {0}")]
    LineNotFound(CartItemId),
}

/// Where a loaded cart came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartSource {
    Server,
    Session,
    Guest,
}

/// A cart and its origin.
#[derive(Debug, Clone)]
pub struct LoadedCart {
    pub snapshot: CartSnapshot,
    pub source: CartSource,
}

// =============================================================================
// CartService
// =============================================================================

/// Cart operations routed by session state.
#[derive(Debug, Clone)]
pub struct CartService {
    session: SessionController,
    transport: CartTransport,
    guest: GuestCartStore,
    catalog: CatalogClient,
}

impl CartService {
    #[must_use]
    pub const fn new(
        session: SessionController,
        transport: CartTransport,
        guest: GuestCartStore,
        catalog: CatalogClient,
    ) -> Self {
        Self {
            session,
            transport,
            guest,
            catalog,
        }
    }

    /// Load the current cart and mirror it into the guest store.
    ///
    /// Never fails: remote errors fall back to the next source.
    #[instrument(skip(self))]
    pub async fn load(&self) -> LoadedCart {
        if self.session.is_authenticated().await {
            match self.fetch_authenticated().await {
                Ok(snapshot) => return self.mirror(snapshot, CartSource::Server),
                Err(e) => warn!(error = %e, "Failed to load server cart, falling back"),
            }
        }

        match self.transport.fetch_cart(&CartMode::Session).await {
            Ok(snapshot) if !snapshot.is_empty() => {
                return self.mirror(snapshot, CartSource::Session);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to load session cart, using guest cart"),
        }

        LoadedCart {
            snapshot: self.guest.read(),
            source: CartSource::Guest,
        }
    }

    /// The last mirrored cart, without a network call.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.guest.read()
    }

    /// Add a product.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for a quantity below one. When
    /// authenticated, backend failures are returned; the session cart is
    /// updated best-effort and the guest cart always takes the add.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add(&self, product_id: ProductId, quantity: i64) -> Result<CartSnapshot, CartError> {
        let quantity = Quantity::try_from(quantity)?;
        add_breadcrumb(
            "cart",
            "Added to cart",
            Some(&[
                ("product_id", product_id.to_string().as_str()),
                ("quantity", quantity.to_string().as_str()),
            ]),
        );

        if self.session.is_authenticated().await {
            let transport = &self.transport;
            self.session
                .with_auth(|token| async move {
                    transport
                        .add_item(product_id, quantity, &CartMode::Authenticated(token))
                        .await
                })
                .await?;
            return Ok(self.resync_or(|cart| cart).await);
        }

        if let Err(e) = self
            .transport
            .add_item(product_id, quantity, &CartMode::Session)
            .await
        {
            warn!(error = %e, "Session cart add failed, updating local cart only");
        }

        let product = match self.catalog.product_summary(product_id).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "Could not enrich product, storing placeholder");
                placeholder(product_id)
            }
        };

        let mut cart = self.guest.read();
        let id = cart.next_guest_id();
        cart.upsert_adding(CartLineItem {
            id,
            product,
            quantity,
        });
        self.guest.write(&cart);
        info!(lines = cart.len(), "Added to guest cart");
        Ok(cart)
    }

    /// Change a line's quantity. Below one removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` for an unknown line. When
    /// authenticated, backend failures are returned; the session cart is
    /// updated best-effort.
    #[instrument(skip(self), fields(line_id = %line_id))]
    pub async fn set_quantity(
        &self,
        line_id: CartItemId,
        quantity: i64,
    ) -> Result<CartSnapshot, CartError> {
        if quantity < 1 {
            return self.remove(line_id).await;
        }

        let line = self.line(line_id)?;

        if self.session.is_authenticated().await {
            let transport = &self.transport;
            self.session
                .with_auth(|token| async move {
                    transport
                        .update_quantity(line, quantity, &CartMode::Authenticated(token))
                        .await
                })
                .await?;
            return Ok(self
                .resync_or(|mut cart| {
                    cart.set_quantity(line_id, quantity);
                    cart
                })
                .await);
        }

        if let Err(e) = self
            .transport
            .update_quantity(line, quantity, &CartMode::Session)
            .await
        {
            warn!(error = %e, "Session cart update failed, updating local cart only");
        }

        let mut cart = self.guest.read();
        cart.set_quantity(line_id, quantity);
        self.guest.write(&cart);
        Ok(cart)
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` for an unknown line. When
    /// authenticated, backend failures are returned; the session cart is
    /// updated best-effort.
    #[instrument(skip(self), fields(line_id = %line_id))]
    pub async fn remove(&self, line_id: CartItemId) -> Result<CartSnapshot, CartError> {
        let line = self.line(line_id)?;
        add_breadcrumb(
            "cart",
            "Removed from cart",
            Some(&[("product_id", line.product.to_string().as_str())]),
        );

        if self.session.is_authenticated().await {
            let transport = &self.transport;
            self.session
                .with_auth(|token| async move {
                    transport
                        .remove_item(line, &CartMode::Authenticated(token))
                        .await
                })
                .await?;
            return Ok(self
                .resync_or(|mut cart| {
                    cart.remove_line(line_id);
                    cart
                })
                .await);
        }

        if let Err(e) = self.transport.remove_item(line, &CartMode::Session).await {
            warn!(error = %e, "Session cart removal failed, updating local cart only");
        }

        let mut cart = self.guest.read();
        cart.remove_line(line_id);
        self.guest.write(&cart);
        Ok(cart)
    }

    /// Empty the local cart. Remote carts are left untouched.
    pub fn clear(&self) {
        self.guest.clear();
        add_breadcrumb("cart", "Cleared cart", None);
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn fetch_authenticated(&self) -> Result<CartSnapshot, SessionError> {
        let transport = &self.transport;
        self.session
            .with_auth(|token| async move {
                transport
                    .fetch_cart(&CartMode::Authenticated(token))
                    .await
            })
            .await
    }

    /// Re-read the server cart after a write. If that fails, apply `local`
    /// to the mirror instead.
    async fn resync_or(&self, local: impl FnOnce(CartSnapshot) -> CartSnapshot) -> CartSnapshot {
        let cart = match self.fetch_authenticated().await {
            Ok(cart) => cart,
            Err(e) => {
                warn!(error = %e, "Could not re-read server cart, updating mirror locally");
                local(self.guest.read())
            }
        };
        self.guest.write(&cart);
        cart
    }

    fn mirror(&self, snapshot: CartSnapshot, source: CartSource) -> LoadedCart {
        self.guest.write(&snapshot);
        LoadedCart { snapshot, source }
    }

    fn line(&self, line_id: CartItemId) -> Result<LineRef, CartError> {
        self.guest
            .read()
            .find_by_line(line_id)
            .map(LineRef::from)
            .ok_or(CartError::LineNotFound(line_id))
    }
}

fn placeholder(id: ProductId) -> ProductSummary {
    ProductSummary {
        id,
        name: UNNAMED_PRODUCT.to_string(),
        description: String::new(),
        price: Price::ZERO,
        image: None,
    }
}
