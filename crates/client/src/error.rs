//! Unified error handling with Sentry integration.
//!
//! Front ends return `Result<T, AppError>` and call [`AppError::report`]
//! once at the top level, which captures server-side failures to Sentry and
//! yields the message to show the user.

use thiserror::Error;

use crate::backend::BackendError;
use crate::checkout::CheckoutError;
use crate::config::ConfigError;
use crate::session::SessionError;
use crate::vendor_orders::VendorOrderError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Backend request failed.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Checkout did not complete.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// Login failed.
    #[error("Login failed: {0}")]
    Session(#[from] SessionError),

    /// An incoming order could not be handled.
    #[error(transparent)]
    VendorOrders(#[from] VendorOrderError),

    /// The command needs a signed-in user.
    #[error("Please login first (campus-eats login)")]
    LoginRequired,

    /// Invalid command input.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl AppError {
    /// Whether this failure is on our side rather than the user's.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        match self {
            Self::Config(_) => true,
            Self::Backend(err) | Self::VendorOrders(VendorOrderError::Backend(err)) => {
                !matches!(err, BackendError::NotFound(_) | BackendError::Unauthorized(_))
            }
            Self::VendorOrders(VendorOrderError::IllegalTransition { .. }) => false,
            Self::Checkout(err) => matches!(
                err,
                CheckoutError::Backend(_) | CheckoutError::Partial { .. }
            ),
            Self::Session(err) => matches!(err, SessionError::Backend(_)),
            Self::LoginRequired | Self::BadRequest(_) | Self::NotFound(_) => false,
        }
    }

    /// Capture server errors to Sentry and return the message for the user.
    pub fn report(&self) -> String {
        if self.is_server_error() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Command failed"
            );
        }

        match self {
            Self::Session(SessionError::InvalidCredentials) => {
                "Invalid email or password".to_string()
            }
            Self::Session(SessionError::InvalidEmail(_)) => "Invalid email address".to_string(),
            Self::Session(SessionError::InvalidPassword(err)) => err.to_string(),
            _ => self.to_string(),
        }
    }
}

/// Set the Sentry user context after login or when a session is loaded.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context on logout.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a user action.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("item_id", "12")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use campus_eats_core::{OrderId, OrderStatus, PasswordError};

    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order 12".to_string());
        assert_eq!(err.to_string(), "Not found: order 12");

        let err = AppError::from(CheckoutError::EmptyCart);
        assert_eq!(err.to_string(), "Your cart is empty!");
    }

    #[test]
    fn test_server_error_classification() {
        assert!(AppError::Backend(BackendError::api(500, None, "boom")).is_server_error());

        let not_found = BackendError::NotFound("Vendor not found: 999".into());
        assert!(!AppError::Backend(not_found).is_server_error());
        let expired = BackendError::Unauthorized("JWT expired".into());
        assert!(!AppError::Backend(expired).is_server_error());

        assert!(
            AppError::Checkout(CheckoutError::Backend(BackendError::api(500, None, "x")))
                .is_server_error()
        );
        assert!(!AppError::Checkout(CheckoutError::StaleCart).is_server_error());
        assert!(!AppError::Checkout(CheckoutError::AuthenticationRequired).is_server_error());
        assert!(!AppError::Session(SessionError::InvalidCredentials).is_server_error());
        assert!(!AppError::LoginRequired.is_server_error());

        let illegal = VendorOrderError::IllegalTransition {
            order_id: OrderId::new(7),
            from: OrderStatus::Completed,
            to: OrderStatus::Pending,
        };
        assert!(!AppError::VendorOrders(illegal).is_server_error());
        let failed = VendorOrderError::Backend(BackendError::api(500, None, "boom"));
        assert!(AppError::VendorOrders(failed).is_server_error());
    }

    #[test]
    fn test_report_user_messages() {
        assert_eq!(
            AppError::Session(SessionError::InvalidCredentials).report(),
            "Invalid email or password"
        );
        assert_eq!(
            AppError::Session(SessionError::InvalidPassword(PasswordError::TooShort { min: 6 }))
                .report(),
            PasswordError::TooShort { min: 6 }.to_string()
        );
        assert_eq!(
            AppError::Checkout(CheckoutError::AuthenticationRequired).report(),
            "Please login to place an order"
        );
    }
}
