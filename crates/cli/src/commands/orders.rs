//! Checkout, order history and order tracking.

use campus_eats_client::error::add_breadcrumb;
use campus_eats_client::tracking::TrackedOrder;
use campus_eats_client::{AppError, AppState, OrderTracker};
use campus_eats_core::{OrderId, Price};

use super::require_session;

/// Lines shown per order in the history before eliding.
const PREVIEW_LINES: usize = 3;

const PROGRESS_WIDTH: usize = 20;

/// Place one order per vendor.
pub async fn checkout(state: &AppState) -> Result<(), AppError> {
    let session = state.session();
    let receipt = state.checkout().place_orders(session.as_ref()).await?;
    add_breadcrumb("checkout", "Placed orders", None);

    println!("Order placed successfully!");
    for order in &receipt.orders {
        println!(
            "  #{}  vendor {}  {}",
            order.id,
            order.vendor_id,
            Price::myr(order.total_amount).display()
        );
    }
    println!("Total {}", receipt.total().display());
    if let Some(first) = receipt.orders.first() {
        println!("Track it with `campus-eats track {}`.", first.id);
    }
    Ok(())
}

/// List the signed-in user's orders, newest first.
pub async fn list(state: &AppState) -> Result<(), AppError> {
    let session = require_session(state)?;
    let orders = state
        .backend()
        .list_orders(&session, session.user_id())
        .await?;

    if orders.is_empty() {
        println!("No orders yet.");
        return Ok(());
    }

    for order in orders {
        println!(
            "#{}  {}  {}  {}  {}",
            order.id,
            order.created_at.format("%Y-%m-%d %H:%M"),
            order.vendor_name(),
            order.status,
            order.total().display()
        );
        for line in order.order_items.iter().take(PREVIEW_LINES) {
            println!("      {} x {}", line.quantity, line.name());
        }
        if order.order_items.len() > PREVIEW_LINES {
            println!("      ... and {} more", order.order_items.len() - PREVIEW_LINES);
        }
    }
    Ok(())
}

/// Follow an order until it is completed or cancelled.
pub async fn track(state: &AppState, order_id: OrderId) -> Result<(), AppError> {
    let session = require_session(state)?;
    let order = state.backend().order(&session, order_id).await?;
    if order.status.is_terminal() {
        print_progress(&TrackedOrder::new(order.id, order.status));
        return Ok(());
    }

    let updates = state
        .backend()
        .subscribe_order_status(&session, order_id)
        .await?;

    let tracker = OrderTracker::new(order.id, order.status);
    let mut view = tracker.subscribe();
    let mut shown = tracker.current();
    print_progress(&shown);

    let printer = tokio::spawn(async move {
        while view.changed().await.is_ok() {
            let current = *view.borrow_and_update();
            if current != shown {
                print_progress(&current);
                shown = current;
            }
        }
    });

    let last = tracker.run(updates).await;
    drop(tracker);
    let _ = printer.await;

    if !last.status.is_terminal() {
        println!("Lost connection to order #{order_id}; last status {}.", last.status);
    }
    Ok(())
}

fn print_progress(order: &TrackedOrder) {
    println!(
        "#{}  {}  {}",
        order.id,
        progress_bar(order.progress),
        order.status
    );
}

/// `[#####...............]  20%`
fn progress_bar(percent: u8) -> String {
    let percent = usize::from(percent.min(100));
    let filled = percent * PROGRESS_WIDTH / 100;
    format!(
        "[{}{}] {percent:>3}%",
        "#".repeat(filled),
        ".".repeat(PROGRESS_WIDTH - filled)
    )
}
