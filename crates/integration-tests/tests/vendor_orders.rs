//! Integration tests for the vendor side of an order.
//!
//! A student checks out through the in-memory backend, then the owner of
//! the vendor works the order through its lifecycle.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::time::Duration;

use campus_eats_client::backend::Backend;
use campus_eats_client::{CheckoutService, OrderBoard, OrderTracker, VendorOrderError, VendorOrders};
use campus_eats_core::{OrderId, OrderStatus, VendorId};
use campus_eats_integration_tests::fixtures::{
    self, campus_backend, cart_store, session, vendor_session,
};
use campus_eats_integration_tests::{Call, MemoryBackend};

async fn place_order(backend: &MemoryBackend) -> OrderId {
    let (store, _) = cart_store();
    store.add_item(fixtures::menu_item(1, 1, "Nasi Lemak", 5).to_cart_item(), 2);
    let receipt = CheckoutService::new(&store, backend)
        .place_orders(Some(&session()))
        .await
        .unwrap();
    receipt.orders[0].id
}

fn status_updates(backend: &MemoryBackend) -> Vec<(OrderId, OrderStatus)> {
    backend
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::UpdateOrderStatus(id, status) => Some((id, status)),
            _ => None,
        })
        .collect()
}

// =============================================================================
// Order Board
// =============================================================================

#[tokio::test]
async fn test_board_shows_new_orders_as_pending() {
    let backend = campus_backend();
    let first = place_order(&backend).await;
    let second = place_order(&backend).await;
    let owner = vendor_session();

    let board = VendorOrders::new(&backend, &owner)
        .board(VendorId::new(1))
        .await
        .unwrap();

    let pending = board.column(OrderStatus::Pending);
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].id, second);
    assert_eq!(pending[1].id, first);
    assert_eq!(pending[0].customer_name(), "Ali bin Abu");
    assert_eq!(pending[0].total().display(), "RM 10.00");
    assert_eq!(pending[0].order_items[0].quantity, 2);
    assert_eq!(pending[0].order_items[0].name(), "Nasi Lemak");
}

#[tokio::test]
async fn test_board_of_another_vendor_is_empty() {
    let backend = campus_backend();
    place_order(&backend).await;
    let student = session();

    let board = VendorOrders::new(&backend, &student)
        .board(VendorId::new(1))
        .await
        .unwrap();
    assert_eq!(board, OrderBoard::default());
}

// =============================================================================
// Status Changes
// =============================================================================

#[tokio::test]
async fn test_accept_then_mark_ready() {
    let backend = campus_backend();
    let order_id = place_order(&backend).await;
    let owner = vendor_session();
    let desk = VendorOrders::new(&backend, &owner);

    let accepted = desk.advance(order_id, OrderStatus::Preparing).await.unwrap();
    assert_eq!(accepted.status, OrderStatus::Preparing);
    let ready = desk.advance(order_id, OrderStatus::Completed).await.unwrap();
    assert_eq!(ready.status, OrderStatus::Completed);

    let board = desk.board(VendorId::new(1)).await.unwrap();
    assert!(board.column(OrderStatus::Pending).is_empty());
    assert_eq!(board.column(OrderStatus::Completed)[0].id, order_id);
}

#[tokio::test]
async fn test_reject_cancels_pending_order() {
    let backend = campus_backend();
    let order_id = place_order(&backend).await;
    let owner = vendor_session();

    let rejected = VendorOrders::new(&backend, &owner)
        .advance(order_id, OrderStatus::Cancelled)
        .await
        .unwrap();

    assert_eq!(rejected.status, OrderStatus::Cancelled);
    assert_eq!(backend.orders()[0].status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn test_illegal_transitions_are_refused_without_writing() {
    let backend = campus_backend();
    let order_id = place_order(&backend).await;
    let owner = vendor_session();
    let desk = VendorOrders::new(&backend, &owner);

    // Pending orders must be accepted before they can be completed
    let err = desk
        .advance(order_id, OrderStatus::Completed)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VendorOrderError::IllegalTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Completed,
            ..
        }
    ));

    desk.advance(order_id, OrderStatus::Preparing).await.unwrap();
    let err = desk
        .advance(order_id, OrderStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(err, VendorOrderError::IllegalTransition { .. }));

    desk.advance(order_id, OrderStatus::Completed).await.unwrap();
    let err = desk
        .advance(order_id, OrderStatus::Preparing)
        .await
        .unwrap_err();
    assert!(matches!(err, VendorOrderError::IllegalTransition { .. }));

    assert_eq!(
        status_updates(&backend),
        vec![
            (order_id, OrderStatus::Preparing),
            (order_id, OrderStatus::Completed),
        ]
    );
    assert_eq!(backend.orders()[0].status, OrderStatus::Completed);
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let backend = campus_backend();
    let owner = vendor_session();

    let err = VendorOrders::new(&backend, &owner)
        .advance(OrderId::new(404), OrderStatus::Preparing)
        .await
        .unwrap_err();
    assert!(matches!(err, VendorOrderError::Backend(_)));
    assert!(status_updates(&backend).is_empty());
}

// =============================================================================
// End to End
// =============================================================================

#[tokio::test]
async fn test_student_tracker_follows_vendor_changes() {
    let backend = campus_backend();
    let order_id = place_order(&backend).await;
    let updates = backend
        .subscribe_order_status(&session(), order_id)
        .await
        .unwrap();
    let tracker = OrderTracker::new(order_id, OrderStatus::Pending);

    let owner = vendor_session();
    let desk = VendorOrders::new(&backend, &owner);
    desk.advance(order_id, OrderStatus::Preparing).await.unwrap();
    desk.advance(order_id, OrderStatus::Completed).await.unwrap();

    let last = tokio::time::timeout(Duration::from_secs(5), tracker.run(updates))
        .await
        .unwrap();
    assert_eq!(last.status, OrderStatus::Completed);
    assert_eq!(last.progress, 100);
}
