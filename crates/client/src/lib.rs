//! Campus Eats client library.
//!
//! The cart store, checkout, order tracking and the hosted backend client,
//! usable from any front end (the `campus-eats` CLI is one).
//!
//! # Modules
//!
//! - [`cart_store`] - Persisted, observable cart
//! - [`checkout`] - Per-vendor order submission with compensating cancellation
//! - [`tracking`] - Live status of a placed order
//! - [`vendor_orders`] - A vendor's incoming order board and status changes
//! - [`backend`] - The `Backend` trait and its REST implementation
//! - [`session`] - Signed-in session persistence and login
//! - [`storage`] - Key/value persistence (files or memory)

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod cart_store;
pub mod checkout;
pub mod config;
pub mod error;
pub mod session;
pub mod state;
pub mod storage;
pub mod tracking;
pub mod vendor_orders;

pub use cart_store::CartStore;
pub use checkout::{CheckoutError, CheckoutReceipt, CheckoutService};
pub use config::ClientConfig;
pub use error::AppError;
pub use state::AppState;
pub use tracking::{OrderTracker, TrackedOrder};
pub use vendor_orders::{OrderBoard, VendorOrderError, VendorOrders};
