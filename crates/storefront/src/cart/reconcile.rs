//! Moving cart contents between the guest store and the server cart.
//!
//! At login the guest cart is merged into the user's server cart: a product
//! already on the server gets the guest quantity added to it, any other
//! product is added. Each write is attempted independently and the outcome
//! recorded in a [`MergeReport`]. Afterwards the guest store holds a copy of
//! the server cart.
//!
//! At logout the server cart is copied into the guest store so the visitor
//! keeps seeing it once the tokens are gone.

use miracle_core::{CartItemId, CartSnapshot, ProductId, Quantity};
use secrecy::SecretString;
use tracing::{info, instrument, warn};

use super::store::GuestCartStore;
use super::transport::{CartMode, CartTransport, LineRef};

/// One write the merge needs to perform on the server cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    /// Set an existing server row to a new total.
    Update {
        line: CartItemId,
        product_id: ProductId,
        quantity: Quantity,
    },
    /// Add a product the server cart does not have.
    Add {
        product_id: ProductId,
        quantity: Quantity,
    },
}

impl MergeAction {
    #[must_use]
    pub const fn product_id(&self) -> ProductId {
        match self {
            Self::Update { product_id, .. } | Self::Add { product_id, .. } => *product_id,
        }
    }
}

impl std::fmt::Display for MergeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Update {
                line,
                product_id,
                quantity,
            } => write!(f, "update row {line} (product {product_id}) to {quantity}"),
            Self::Add {
                product_id,
                quantity,
            } => write!(f, "add {quantity} of product {product_id}"),
        }
    }
}

/// Compute the server writes that merge `guest` into `server`.
///
/// Overlapping products are summed; the rest are added. Actions follow the
/// guest cart's order.
#[must_use]
pub fn plan_merge(guest: &CartSnapshot, server: &CartSnapshot) -> Vec<MergeAction> {
    guest
        .iter()
        .map(|item| match server.find_by_product(item.product.id) {
            Some(existing) => MergeAction::Update {
                line: existing.id,
                product_id: item.product.id,
                quantity: existing.quantity.saturating_add(item.quantity),
            },
            None => MergeAction::Add {
                product_id: item.product.id,
                quantity: item.quantity,
            },
        })
        .collect()
}

/// A merge write that failed.
#[derive(Debug, Clone)]
pub struct MergeFailure {
    pub action: MergeAction,
    pub reason: String,
}

impl MergeFailure {
    #[must_use]
    pub const fn product_id(&self) -> ProductId {
        self.action.product_id()
    }
}

/// Result of merging the guest cart at login.
#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    /// Writes the server accepted.
    pub succeeded: Vec<MergeAction>,
    /// Writes the server rejected or that never reached it.
    pub failed: Vec<MergeFailure>,
    /// A failure outside the per-item writes (initial fetch or re-fetch).
    pub sync_error: Option<String>,
    /// Server cart after the merge, when it could be re-fetched.
    pub canonical: Option<CartSnapshot>,
}

impl MergeReport {
    /// Nothing failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.sync_error.is_none()
    }

    /// Some writes succeeded and some did not.
    #[must_use]
    pub fn has_partial_failure(&self) -> bool {
        !self.failed.is_empty() && !self.succeeded.is_empty()
    }
}

// =============================================================================
// Reconciler
// =============================================================================

/// Runs the login merge and the logout snapshot.
#[derive(Debug, Clone)]
pub struct Reconciler {
    transport: CartTransport,
    guest: GuestCartStore,
}

impl Reconciler {
    #[must_use]
    pub const fn new(transport: CartTransport, guest: GuestCartStore) -> Self {
        Self { transport, guest }
    }

    /// Merge the guest cart into the user's server cart.
    ///
    /// Never fails: every problem is logged and recorded in the report.
    #[instrument(skip_all)]
    pub async fn on_login(&self, access: &SecretString) -> MergeReport {
        let mode = CartMode::Authenticated(access.clone());
        let guest = self.guest.read();
        let mut report = MergeReport::default();

        if !guest.is_empty() {
            match self.transport.fetch_cart(&mode).await {
                Ok(server) => {
                    for action in plan_merge(&guest, &server) {
                        match self.apply(action, &mode).await {
                            Ok(()) => report.succeeded.push(action),
                            Err(e) => {
                                warn!(action = %action, error = %e, "Cart merge write failed");
                                report.failed.push(MergeFailure {
                                    action,
                                    reason: e.to_string(),
                                });
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Could not fetch server cart for merge");
                    report.sync_error = Some(format!("fetch before merge: {e}"));
                }
            }
        }

        match self.transport.fetch_cart(&mode).await {
            Ok(canonical) => {
                self.guest.write(&canonical);
                report.canonical = Some(canonical);
            }
            Err(e) => {
                warn!(error = %e, "Could not re-fetch server cart after merge");
                report.sync_error.get_or_insert_with(|| format!("fetch after merge: {e}"));
            }
        }

        info!(
            merged = report.succeeded.len(),
            failed = report.failed.len(),
            clean = report.is_clean(),
            "Guest cart reconciled"
        );
        report
    }

    /// Copy the server cart into the guest store before the tokens go away.
    ///
    /// An empty server cart or a failed fetch leaves the guest store alone.
    #[instrument(skip_all)]
    pub async fn snapshot_on_logout(&self, access: &SecretString) {
        let mode = CartMode::Authenticated(access.clone());
        match self.transport.fetch_cart(&mode).await {
            Ok(cart) if !cart.is_empty() => {
                info!(lines = cart.len(), "Saving server cart for guest use");
                self.guest.write(&cart);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Could not snapshot server cart at logout"),
        }
    }

    async fn apply(&self, action: MergeAction, mode: &CartMode) -> Result<(), crate::api::ApiError> {
        match action {
            MergeAction::Update {
                line,
                product_id,
                quantity,
            } => {
                let line = LineRef {
                    line,
                    product: product_id,
                };
                self.transport
                    .update_quantity(line, i64::from(quantity.get()), mode)
                    .await
            }
            MergeAction::Add {
                product_id,
                quantity,
            } => self.transport.add_item(product_id, quantity, mode).await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use miracle_core::{CartLineItem, Price, ProductSummary};

    use super::*;

    fn line(id: i64, product: i64, qty: i64) -> CartLineItem {
        CartLineItem {
            id: CartItemId::new(id),
            product: ProductSummary {
                id: ProductId::new(product),
                name: format!("Product {product}"),
                description: String::new(),
                price: Price::from_cents(100),
                image: None,
            },
            quantity: Quantity::coerce(qty),
        }
    }

    #[test]
    fn test_overlap_is_summed() {
        let guest = CartSnapshot::from_items([line(1, 10, 2)]);
        let server = CartSnapshot::from_items([line(55, 10, 3), line(56, 11, 1)]);

        let plan = plan_merge(&guest, &server);
        assert_eq!(
            plan,
            vec![MergeAction::Update {
                line: CartItemId::new(55),
                product_id: ProductId::new(10),
                quantity: Quantity::coerce(5),
            }]
        );
    }

    #[test]
    fn test_disjoint_products_added() {
        let guest = CartSnapshot::from_items([line(1, 10, 2), line(2, 12, 4)]);
        let server = CartSnapshot::from_items([line(56, 11, 1)]);

        let plan = plan_merge(&guest, &server);
        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|a| matches!(a, MergeAction::Add { .. })));
        assert_eq!(plan.first().unwrap().product_id(), ProductId::new(10));
    }

    #[test]
    fn test_empty_guest_plans_nothing() {
        let server = CartSnapshot::from_items([line(56, 11, 1)]);
        assert!(plan_merge(&CartSnapshot::new(), &server).is_empty());
    }

    #[test]
    fn test_report_flags() {
        let mut report = MergeReport::default();
        assert!(report.is_clean());
        assert!(!report.has_partial_failure());

        let add = MergeAction::Add {
            product_id: ProductId::new(1),
            quantity: Quantity::ONE,
        };
        report.failed.push(MergeFailure {
            action: add,
            reason: "API error: 500".to_string(),
        });
        assert!(!report.is_clean());
        assert!(!report.has_partial_failure());

        report.succeeded.push(add);
        assert!(report.has_partial_failure());
    }
}
