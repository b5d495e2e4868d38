//! Incoming orders for vendors.

use campus_eats_client::error::add_breadcrumb;
use campus_eats_client::{AppError, AppState, OrderBoard};
use campus_eats_core::{OrderId, OrderStatus, VendorId};

use super::require_session;

/// Show a vendor's order board, one column per status.
pub async fn orders(state: &AppState, vendor_id: VendorId) -> Result<(), AppError> {
    let session = require_session(state)?;
    let board = state.vendor_orders(&session).board(vendor_id).await?;

    if board.is_empty() {
        println!("No orders for vendor {vendor_id}.");
        return Ok(());
    }
    print_board(&board);
    Ok(())
}

/// Move an order to a new status.
pub async fn set_status(
    state: &AppState,
    order_id: OrderId,
    status: OrderStatus,
) -> Result<(), AppError> {
    let session = require_session(state)?;
    let order = state
        .vendor_orders(&session)
        .advance(order_id, status)
        .await?;

    let id = order_id.to_string();
    add_breadcrumb(
        "vendor",
        "Changed order status",
        Some(&[("order_id", id.as_str()), ("status", status.as_str())]),
    );
    println!("Order #{} marked as {}", order.id, order.status);
    if let Some(hint) = next_step(order.status) {
        println!("{hint}");
    }
    Ok(())
}

fn print_board(board: &OrderBoard) {
    for status in OrderBoard::COLUMNS {
        let column = board.column(status);
        println!("{status} ({})", column.len());
        for order in column {
            println!(
                "  #{}  {}  {}  {}",
                order.id,
                order.created_at.format("%Y-%m-%d %H:%M"),
                order.customer_name(),
                order.total().display()
            );
            for line in &order.order_items {
                println!("      {} x {}", line.quantity, line.name());
            }
        }
    }
}

/// What the vendor can do next with an order in `status`.
const fn next_step(status: OrderStatus) -> Option<&'static str> {
    match status {
        OrderStatus::Pending => Some("Accept with `preparing` or reject with `cancelled`."),
        OrderStatus::Preparing => Some("Mark it `completed` when it is ready."),
        OrderStatus::Completed | OrderStatus::Cancelled => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finished_orders_have_no_next_step() {
        assert!(next_step(OrderStatus::Pending).is_some());
        assert!(next_step(OrderStatus::Preparing).is_some());
        assert!(next_step(OrderStatus::Completed).is_none());
        assert!(next_step(OrderStatus::Cancelled).is_none());
    }
}
