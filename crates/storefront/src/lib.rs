//! Miracle storefront client library.
//!
//! Talks to the Miracle REST backend on behalf of a shopper: catalog
//! browsing, the cart across its three homes (guest store, anonymous
//! session cart, authenticated server cart) and the login/logout
//! transitions that move cart contents between them.
//!
//! Start from [`Storefront`], which wires every component over one HTTP
//! client and one key-value store.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod access;
pub mod api;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod error;
pub mod session;
pub mod state;
pub mod storage;

pub use state::Storefront;
