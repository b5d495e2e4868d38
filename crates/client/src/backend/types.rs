//! Typed records exchanged with the hosted backend.
//!
//! Field names follow the backend's column names (`snake_case`). Every
//! response is decoded into one of these structs; a shape mismatch is a
//! decode error rather than a silently missing field.

use campus_eats_core::{
    CartItem, Email, MenuItemId, OrderId, OrderStatus, Price, UserId, VendorId,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

const fn default_true() -> bool {
    true
}

// =============================================================================
// Directory
// =============================================================================

/// A food vendor (`vendors` collection).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vendor {
    pub id: VendorId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Residential college the stall is in.
    #[serde(default)]
    pub hostel: Option<String>,
    #[serde(default = "default_true")]
    pub is_open: bool,
    /// The account that runs the stall.
    #[serde(default)]
    pub owner_id: Option<UserId>,
}

/// A menu item (`menu_items` collection).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: MenuItemId,
    #[serde(default)]
    pub vendor_id: Option<VendorId>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

impl MenuItem {
    /// Snapshot this item for the cart at its current price.
    #[must_use]
    pub fn to_cart_item(&self) -> CartItem {
        let mut item = CartItem::new(self.id, self.name.clone(), self.price, self.vendor_id);
        item.image_ref.clone_from(&self.image_url);
        item.category.clone_from(&self.category);
        item
    }

    #[must_use]
    pub const fn unit_price(&self) -> Price {
        Price::myr(self.price)
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Insert payload for `orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewOrder {
    pub user_id: UserId,
    pub vendor_id: VendorId,
    pub total_amount: Decimal,
    pub status: OrderStatus,
}

/// A row of `orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub user_id: UserId,
    pub vendor_id: VendorId,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for `order_items`. The price is copied, not referenced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub order_id: OrderId,
    pub menu_item_id: MenuItemId,
    pub quantity: u32,
    pub price_at_time: Decimal,
}

/// Vendor columns embedded in an order listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorRef {
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Menu item columns embedded in an order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItemRef {
    pub name: String,
}

/// One line of an order listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummaryLine {
    pub quantity: u32,
    pub price_at_time: Decimal,
    /// `None` when the menu item has since been deleted.
    #[serde(default)]
    pub menu_item: Option<MenuItemRef>,
}

impl OrderSummaryLine {
    #[must_use]
    pub fn name(&self) -> &str {
        self.menu_item
            .as_ref()
            .map_or("(removed item)", |item| item.name.as_str())
    }
}

/// An order with its vendor and lines joined, as shown in the order history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub vendor: Option<VendorRef>,
    #[serde(default)]
    pub order_items: Vec<OrderSummaryLine>,
}

impl OrderSummary {
    #[must_use]
    pub const fn total(&self) -> Price {
        Price::myr(self.total_amount)
    }

    #[must_use]
    pub fn vendor_name(&self) -> &str {
        self.vendor.as_ref().map_or("Unknown vendor", |v| v.name.as_str())
    }
}

/// Customer columns embedded in a vendor's order listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRef {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// An order placed with a vendor, with its customer and lines joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingOrder {
    pub id: OrderId,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub customer: Option<CustomerRef>,
    #[serde(default)]
    pub order_items: Vec<OrderSummaryLine>,
}

impl IncomingOrder {
    #[must_use]
    pub const fn total(&self) -> Price {
        Price::myr(self.total_amount)
    }

    #[must_use]
    pub fn customer_name(&self) -> &str {
        self.customer
            .as_ref()
            .and_then(|c| c.full_name.as_deref())
            .unwrap_or("Guest")
    }
}

/// A status change observed on a subscribed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderStatusUpdate {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub observed_at: DateTime<Utc>,
}

// =============================================================================
// Identity
// =============================================================================

/// The user a session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<Email>,
}

/// An authenticated session issued by the identity service.
///
/// Persisted as JSON in the data directory; the tokens are written in plain
/// text there and redacted everywhere else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    #[serde(with = "secret_string")]
    pub access_token: SecretString,
    #[serde(default, with = "secret_string::option")]
    pub refresh_token: Option<SecretString>,
    pub expires_at: DateTime<Utc>,
    pub user: SessionUser,
}

impl Session {
    /// Whether the access token has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user.id
    }
}

/// Serde adapter storing a [`SecretString`] as its plain value.
mod secret_string {
    use secrecy::{ExposeSecret, SecretString};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(secret.expose_secret())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
        String::deserialize(deserializer).map(SecretString::from)
    }

    pub mod option {
        use super::{Deserialize, Deserializer, ExposeSecret, SecretString, Serializer};

        #[allow(clippy::ref_option)]
        pub fn serialize<S: Serializer>(
            secret: &Option<SecretString>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match secret {
                Some(secret) => serializer.serialize_some(secret.expose_secret()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<SecretString>, D::Error> {
            Option::<String>::deserialize(deserializer).map(|value| value.map(SecretString::from))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn test_menu_item_decodes_backend_row() {
        let row = r#"{"id": 12, "vendor_id": 3, "name": "Mee Goreng", "price": 6.5,
            "description": null, "category": "Noodles", "image_url": "https://cdn/x.png",
            "is_available": true, "created_at": "2025-01-01T00:00:00+00:00"}"#;
        let item: MenuItem = serde_json::from_str(row).unwrap();
        assert_eq!(item.id, MenuItemId::new(12));
        assert_eq!(item.unit_price().display(), "RM 6.50");

        let cart_item = item.to_cart_item();
        assert_eq!(cart_item.vendor_id, Some(VendorId::new(3)));
        assert_eq!(cart_item.category.as_deref(), Some("Noodles"));
        assert_eq!(cart_item.image_ref.as_deref(), Some("https://cdn/x.png"));
    }

    #[test]
    fn test_menu_item_rejects_missing_price() {
        let row = r#"{"id": 12, "name": "Mee Goreng"}"#;
        assert!(serde_json::from_str::<MenuItem>(row).is_err());
    }

    #[test]
    fn test_vendor_defaults() {
        let vendor: Vendor = serde_json::from_str(r#"{"id": 1, "name": "Kafe Sri"}"#).unwrap();
        assert!(vendor.is_open);
        assert_eq!(vendor.hostel, None);
    }

    #[test]
    fn test_new_order_wire_format() {
        let order = NewOrder {
            user_id: "3f0c1c1e-7b7a-4c55-9d0b-2a6a6f1e9c10".parse().unwrap(),
            vendor_id: VendorId::new(2),
            total_amount: Decimal::new(600, 2),
            status: OrderStatus::Pending,
        };
        let value = serde_json::to_value(&order).unwrap();
        assert_eq!(value["vendor_id"], 2);
        assert_eq!(value["status"], "pending");
        assert_eq!(value["user_id"], "3f0c1c1e-7b7a-4c55-9d0b-2a6a6f1e9c10");
    }

    #[test]
    fn test_order_summary_decodes_joined_row() {
        let row = r#"{
            "id": 9, "total_amount": 11.0, "status": "preparing",
            "created_at": "2025-03-02T04:05:06.123456+00:00",
            "vendor": {"name": "Kafe Sri", "image_url": null},
            "order_items": [
                {"quantity": 2, "price_at_time": 3, "menu_item": {"name": "Roti Canai"}},
                {"quantity": 1, "price_at_time": 5, "menu_item": null}
            ]
        }"#;
        let summary: OrderSummary = serde_json::from_str(row).unwrap();
        assert_eq!(summary.status, OrderStatus::Preparing);
        assert_eq!(summary.vendor_name(), "Kafe Sri");
        assert_eq!(summary.total().display(), "RM 11.00");
        assert_eq!(summary.order_items[0].name(), "Roti Canai");
        assert_eq!(summary.order_items[1].name(), "(removed item)");
    }

    #[test]
    fn test_incoming_order_decodes_joined_row() {
        let row = r#"{"id": 7, "total_amount": 8, "status": "pending",
            "created_at": "2026-03-02T04:05:06+00:00",
            "customer": {"full_name": "Ali", "email": "ali@uni.my"},
            "order_items": [{"quantity": 2, "price_at_time": 3,
                             "menu_item": {"name": "Roti Canai"}}]}"#;
        let order: IncomingOrder = serde_json::from_str(row).unwrap();
        assert_eq!(order.customer_name(), "Ali");
        assert_eq!(order.total().display(), "RM 8.00");
        assert_eq!(order.order_items[0].name(), "Roti Canai");

        let anonymous = row.replace(r#""customer": {"full_name": "Ali", "email": "ali@uni.my"},"#, "");
        let order: IncomingOrder = serde_json::from_str(&anonymous).unwrap();
        assert_eq!(order.customer_name(), "Guest");
    }

    #[test]
    fn test_session_debug_redacts_tokens() {
        let session = Session {
            access_token: SecretString::from("eyJ.secret.token"),
            refresh_token: Some(SecretString::from("refresh-me")),
            expires_at: Utc::now(),
            user: SessionUser {
                id: "3f0c1c1e-7b7a-4c55-9d0b-2a6a6f1e9c10".parse().unwrap(),
                email: None,
            },
        };
        let debug_output = format!("{session:?}");
        assert!(!debug_output.contains("eyJ.secret.token"));
        assert!(!debug_output.contains("refresh-me"));
        assert!(debug_output.contains("REDACTED"));
    }

    #[test]
    fn test_session_tokens_persist_in_plain_json() {
        let raw = r#"{"access_token":"a.b.c","refresh_token":"r",
            "expires_at":"2026-01-01T00:00:00Z",
            "user":{"id":"3f0c1c1e-7b7a-4c55-9d0b-2a6a6f1e9c10","email":null}}"#;
        let session: Session = serde_json::from_str(raw).unwrap();
        assert_eq!(session.access_token.expose_secret(), "a.b.c");

        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["access_token"], "a.b.c");
        assert_eq!(value["refresh_token"], "r");

        let without_refresh = raw.replace(r#""refresh_token":"r","#, "");
        let session: Session = serde_json::from_str(&without_refresh).unwrap();
        assert!(session.refresh_token.is_none());
    }
}
