//! Local view of one placed order, driven by pushed status updates.

use campus_eats_core::{OrderId, OrderStatus};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::backend::{OrderStatusStream, OrderStatusUpdate};

/// What the tracking view shows for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedOrder {
    pub id: OrderId,
    pub status: OrderStatus,
    /// Delivery progress in percent.
    pub progress: u8,
}

impl TrackedOrder {
    #[must_use]
    pub const fn new(id: OrderId, status: OrderStatus) -> Self {
        Self {
            id,
            status,
            progress: status.delivery_progress(),
        }
    }
}

/// Follows one order.
///
/// Updates are applied last-write-wins in arrival order. Missed updates are
/// not reconciled; the next update simply overwrites the view.
pub struct OrderTracker {
    state: watch::Sender<TrackedOrder>,
}

impl OrderTracker {
    /// Start tracking from a known status (usually `pending` right after
    /// checkout).
    #[must_use]
    pub fn new(id: OrderId, status: OrderStatus) -> Self {
        let (state, _) = watch::channel(TrackedOrder::new(id, status));
        Self { state }
    }

    /// The current view.
    #[must_use]
    pub fn current(&self) -> TrackedOrder {
        *self.state.borrow()
    }

    /// Observe the view as it changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TrackedOrder> {
        self.state.subscribe()
    }

    /// Apply one update. Updates for other orders are ignored.
    pub fn apply(&self, update: OrderStatusUpdate) -> bool {
        let id = self.state.borrow().id;
        if update.order_id != id {
            debug!(order_id = %update.order_id, tracked = %id, "Ignoring update for another order");
            return false;
        }
        self.state
            .send_modify(|view| *view = TrackedOrder::new(id, update.status));
        debug!(order_id = %id, status = %update.status, "Order status updated");
        true
    }

    /// Consume updates until the stream ends or the order reaches a terminal
    /// status. Returns the final view.
    pub async fn run(&self, mut updates: OrderStatusStream) -> TrackedOrder {
        while let Some(update) = updates.recv().await {
            if self.apply(update) && update.status.is_terminal() {
                break;
            }
        }

        let last = self.current();
        info!(order_id = %last.id, status = %last.status, "Stopped tracking order");
        last
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use tokio::sync::mpsc;

    use super::*;

    fn update(id: i64, status: OrderStatus) -> OrderStatusUpdate {
        OrderStatusUpdate {
            order_id: OrderId::new(id),
            status,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn test_progress_follows_status() {
        let tracker = OrderTracker::new(OrderId::new(1), OrderStatus::Pending);
        assert_eq!(tracker.current().progress, 20);

        tracker.apply(update(1, OrderStatus::Preparing));
        assert_eq!(tracker.current().progress, 60);
    }

    #[test]
    fn test_last_write_wins() {
        let tracker = OrderTracker::new(OrderId::new(1), OrderStatus::Pending);
        tracker.apply(update(1, OrderStatus::Completed));
        tracker.apply(update(1, OrderStatus::Preparing));
        assert_eq!(tracker.current().status, OrderStatus::Preparing);
    }

    #[test]
    fn test_ignores_other_orders() {
        let tracker = OrderTracker::new(OrderId::new(1), OrderStatus::Pending);
        assert!(!tracker.apply(update(2, OrderStatus::Cancelled)));
        assert_eq!(tracker.current().status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_run_stops_at_terminal_status() {
        let tracker = OrderTracker::new(OrderId::new(4), OrderStatus::Pending);
        let (tx, rx) = mpsc::channel(8);
        tx.send(update(4, OrderStatus::Preparing)).await.unwrap();
        tx.send(update(4, OrderStatus::Completed)).await.unwrap();
        tx.send(update(4, OrderStatus::Cancelled)).await.unwrap();

        let last = tracker.run(rx).await;
        assert_eq!(last.status, OrderStatus::Completed);
        assert_eq!(last.progress, 100);
    }

    #[tokio::test]
    async fn test_run_ends_with_stream() {
        let tracker = OrderTracker::new(OrderId::new(4), OrderStatus::Pending);
        let mut view = tracker.subscribe();
        let (tx, rx) = mpsc::channel(8);
        tx.send(update(4, OrderStatus::Preparing)).await.unwrap();
        drop(tx);

        let last = tracker.run(rx).await;
        assert_eq!(last.status, OrderStatus::Preparing);
        assert!(view.has_changed().unwrap());
        assert_eq!(view.borrow_and_update().progress, 60);
    }
}
