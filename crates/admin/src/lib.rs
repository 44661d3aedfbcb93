//! Miracle back-office library.
//!
//! CRUD over categories, products, coupons and recipes, plus the user
//! dashboard figures. Runs over a [`miracle_storefront::Storefront`]
//! session whose user must be the administrator.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod client;
pub mod error;
pub mod types;

pub use client::AdminClient;
pub use error::AdminError;
pub use types::{
    CategoryInput, Coupon, CouponInput, ImageUpload, ProductInput, RecipeInput, UserCount,
};
