//! Core types for Miracle.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod email;
pub mod id;
pub mod price;
pub mod user;

pub use cart::{CartLineItem, CartSnapshot, InvalidQuantity, ProductSummary, Quantity, TAX_PERCENT};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::Price;
pub use user::{ADMIN_USERNAME, UserRecord, is_user_admin};
