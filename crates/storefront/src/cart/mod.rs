//! Shopping cart across the guest store, the session cart and the
//! authenticated server cart.

pub mod normalize;
mod reconcile;
mod service;
mod store;
mod transport;

pub use reconcile::{MergeAction, MergeFailure, MergeReport, Reconciler, plan_merge};
pub use service::{CartError, CartService, CartSource, LoadedCart};
pub use store::{GUEST_CART_KEY, GuestCartStore};
pub use transport::{CartMode, CartTransport, LineRef};
