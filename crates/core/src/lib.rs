//! Miracle Core - Shared types library.
//!
//! This crate provides the domain types used across all Miracle components:
//! - `storefront` - REST client, cart reconciliation and session control
//! - `admin` - Back-office client for catalog and coupon management
//! - `cli` - Command-line storefront
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no storage. This keeps the cart invariants testable in isolation.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, prices, quantities, emails, cart snapshots, users

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
