//! Vendor side of an order: the incoming order board and status changes.
//!
//! A vendor accepts (`pending -> preparing`) or rejects (`pending ->
//! cancelled`) a new order, then marks it ready (`preparing -> completed`).
//! Any other change is refused before it reaches the backend.

use campus_eats_core::{OrderId, OrderStatus, VendorId};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::backend::{Backend, BackendError, IncomingOrder, OrderRecord, Session};

/// Errors that can occur while handling incoming orders.
#[derive(Debug, Error)]
pub enum VendorOrderError {
    /// The order's lifecycle does not allow this change.
    #[error("Order #{order_id} is {from} and cannot be marked as {to}")]
    IllegalTransition {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// A backend request failed.
    #[error("Failed to update status: {0}")]
    Backend(#[from] BackendError),
}

/// A vendor's open and finished orders, one column per status, newest first.
/// Cancelled orders are left off the board.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderBoard {
    pending: Vec<IncomingOrder>,
    preparing: Vec<IncomingOrder>,
    completed: Vec<IncomingOrder>,
}

impl OrderBoard {
    /// Columns in board order.
    pub const COLUMNS: [OrderStatus; 3] = [
        OrderStatus::Pending,
        OrderStatus::Preparing,
        OrderStatus::Completed,
    ];

    #[must_use]
    pub fn from_orders(orders: Vec<IncomingOrder>) -> Self {
        let mut board = Self::default();
        for order in orders {
            match order.status {
                OrderStatus::Pending => board.pending.push(order),
                OrderStatus::Preparing => board.preparing.push(order),
                OrderStatus::Completed => board.completed.push(order),
                OrderStatus::Cancelled => {}
            }
        }
        board
    }

    /// Orders in the column for `status`.
    #[must_use]
    pub fn column(&self, status: OrderStatus) -> &[IncomingOrder] {
        match status {
            OrderStatus::Pending => &self.pending,
            OrderStatus::Preparing => &self.preparing,
            OrderStatus::Completed => &self.completed,
            OrderStatus::Cancelled => &[],
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        Self::COLUMNS
            .iter()
            .all(|status| self.column(*status).is_empty())
    }
}

/// Incoming order handling for a signed-in vendor.
pub struct VendorOrders<'a> {
    backend: &'a dyn Backend,
    session: &'a Session,
}

impl<'a> VendorOrders<'a> {
    #[must_use]
    pub const fn new(backend: &'a dyn Backend, session: &'a Session) -> Self {
        Self { backend, session }
    }

    /// The order board of `vendor_id`.
    ///
    /// # Errors
    ///
    /// Returns `VendorOrderError::Backend` if the orders cannot be listed.
    #[instrument(skip(self), fields(user_id = %self.session.user_id()))]
    pub async fn board(&self, vendor_id: VendorId) -> Result<OrderBoard, VendorOrderError> {
        let orders = self
            .backend
            .list_vendor_orders(self.session, vendor_id)
            .await?;
        Ok(OrderBoard::from_orders(orders))
    }

    /// Move an order to `next`.
    ///
    /// # Errors
    ///
    /// Returns `VendorOrderError::IllegalTransition` without writing anything
    /// if the order's current status cannot move to `next`.
    /// Returns `VendorOrderError::Backend` if the order cannot be read or
    /// updated.
    #[instrument(skip(self), fields(user_id = %self.session.user_id()))]
    pub async fn advance(
        &self,
        order_id: OrderId,
        next: OrderStatus,
    ) -> Result<OrderRecord, VendorOrderError> {
        let current = self.backend.order(self.session, order_id).await?;
        if !current.status.can_transition_to(next) {
            warn!(from = %current.status, to = %next, "Refused order status change");
            return Err(VendorOrderError::IllegalTransition {
                order_id,
                from: current.status,
                to: next,
            });
        }

        let updated = self
            .backend
            .update_order_status(self.session, order_id, next)
            .await?;
        info!(from = %current.status, to = %updated.status, "Order status changed");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;

    fn incoming(id: i64, status: OrderStatus) -> IncomingOrder {
        IncomingOrder {
            id: OrderId::new(id),
            total_amount: Decimal::new(5, 0),
            status,
            created_at: Utc::now(),
            customer: None,
            order_items: Vec::new(),
        }
    }

    #[test]
    fn test_board_groups_by_status_and_keeps_order() {
        let board = OrderBoard::from_orders(vec![
            incoming(4, OrderStatus::Pending),
            incoming(3, OrderStatus::Cancelled),
            incoming(2, OrderStatus::Pending),
            incoming(1, OrderStatus::Completed),
        ]);

        let pending: Vec<OrderId> = board
            .column(OrderStatus::Pending)
            .iter()
            .map(|order| order.id)
            .collect();
        assert_eq!(pending, vec![OrderId::new(4), OrderId::new(2)]);
        assert!(board.column(OrderStatus::Preparing).is_empty());
        assert_eq!(board.column(OrderStatus::Completed).len(), 1);
        assert!(board.column(OrderStatus::Cancelled).is_empty());
        assert!(!board.is_empty());
    }

    #[test]
    fn test_board_of_only_cancelled_orders_is_empty() {
        let board = OrderBoard::from_orders(vec![incoming(1, OrderStatus::Cancelled)]);
        assert!(board.is_empty());
    }

    #[test]
    fn test_illegal_transition_message() {
        let err = VendorOrderError::IllegalTransition {
            order_id: OrderId::new(7),
            from: OrderStatus::Completed,
            to: OrderStatus::Preparing,
        };
        assert_eq!(
            err.to_string(),
            "Order #7 is completed and cannot be marked as preparing"
        );
    }
}
