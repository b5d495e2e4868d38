//! The hosted backend collaborator.
//!
//! # Architecture
//!
//! - [`Backend`] is the seam: checkout, tracking and the CLI only see the trait
//! - [`RestBackend`] talks to a PostgREST-style record API plus a password
//!   identity endpoint, caching vendor and menu reads via `moka`
//! - Requests that act for a user take the signed-in [`Session`]; the row
//!   level policies on the backend decide what that user may touch
//!
//! # Collections
//!
//! `vendors`, `menu_items`, `orders`, `order_items`, plus `profiles` joined
//! into a vendor's order listing.

mod cache;
mod rest;
pub mod types;

pub use rest::RestBackend;
pub use types::*;

use async_trait::async_trait;
use campus_eats_core::{Email, MenuItemId, OrderId, OrderStatus, UserId, VendorId};
use secrecy::SecretString;
use thiserror::Error;
use tokio::sync::mpsc;

/// Postgres SQLSTATE for a foreign key violation.
pub const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not match the expected shape.
    #[error("Unexpected response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The backend rejected the request.
    #[error("{message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Record not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing, expired or invalid credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl BackendError {
    /// Build an API error.
    #[must_use]
    pub fn api(status: u16, code: Option<&str>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    /// Whether the backend refused a row because it references a missing
    /// record (e.g. an order for a vendor that no longer exists).
    #[must_use]
    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(self, Self::Api { code: Some(code), .. } if code == FOREIGN_KEY_VIOLATION)
    }
}

/// Status updates for one order. Closed when the order reaches a terminal
/// status or the producer stops.
pub type OrderStatusStream = mpsc::Receiver<OrderStatusUpdate>;

/// Record-oriented operations of the hosted backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// All vendors, by name.
    async fn list_vendors(&self) -> Result<Vec<Vendor>, BackendError>;

    /// One vendor.
    async fn vendor(&self, id: VendorId) -> Result<Vendor, BackendError>;

    /// A vendor's menu.
    async fn list_menu(&self, vendor_id: VendorId) -> Result<Vec<MenuItem>, BackendError>;

    /// One menu item.
    async fn menu_item(&self, id: MenuItemId) -> Result<MenuItem, BackendError>;

    /// Exchange email and password for a session.
    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Session, BackendError>;

    /// Insert an order and return the stored row.
    async fn create_order(
        &self,
        session: &Session,
        order: &NewOrder,
    ) -> Result<OrderRecord, BackendError>;

    /// Batch-insert order lines.
    async fn insert_order_items(
        &self,
        session: &Session,
        items: &[NewOrderItem],
    ) -> Result<(), BackendError>;

    /// Set an order's status and return the updated row.
    async fn update_order_status(
        &self,
        session: &Session,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<OrderRecord, BackendError>;

    /// One order.
    async fn order(&self, session: &Session, order_id: OrderId)
    -> Result<OrderRecord, BackendError>;

    /// A user's orders, newest first, with vendor and line names.
    async fn list_orders(
        &self,
        session: &Session,
        user_id: UserId,
    ) -> Result<Vec<OrderSummary>, BackendError>;

    /// Orders placed with a vendor, newest first, with customer and line
    /// names.
    async fn list_vendor_orders(
        &self,
        session: &Session,
        vendor_id: VendorId,
    ) -> Result<Vec<IncomingOrder>, BackendError>;

    /// Subscribe to status changes of one order.
    async fn subscribe_order_status(
        &self,
        session: &Session,
        order_id: OrderId,
    ) -> Result<OrderStatusStream, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foreign_key_violation_detection() {
        let err = BackendError::api(
            409,
            Some("23503"),
            "insert or update on table \"orders\" violates foreign key constraint",
        );
        assert!(err.is_foreign_key_violation());

        let err = BackendError::api(409, Some("23505"), "duplicate key");
        assert!(!err.is_foreign_key_violation());

        let err = BackendError::NotFound("order 1".to_string());
        assert!(!err.is_foreign_key_violation());
    }

    #[test]
    fn test_api_error_displays_raw_message() {
        let err = BackendError::api(500, None, "database is on fire");
        assert_eq!(err.to_string(), "database is on fire");
    }
}
