//! Campus Eats Core - Shared types library.
//!
//! This crate provides the types used across all Campus Eats components:
//! - `client` - Cart store, checkout, backend glue and order tracking
//! - `cli` - The `campus-eats` command-line front end
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no HTTP
//! clients, no persistence. The cart model and its vendor splitting live here
//! so they can be tested without any backend.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails, passwords and statuses
//! - [`cart`] - Cart lines, cart mutations and per-vendor order groups

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;

pub use cart::{Cart, CartItem, CartLine, SplitError, VendorOrderGroup};
pub use types::*;
