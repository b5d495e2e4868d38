//! Integration tests for the persisted cart.
//!
//! These tests use real files in a temporary data directory, so they cover
//! the on-disk format and recovery from corrupt cart files.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use campus_eats_client::CartStore;
use campus_eats_client::storage::{FileStorage, KeyValueStorage, keys};
use campus_eats_core::{CartItem, MenuItemId, VendorId};
use campus_eats_integration_tests::fixtures;
use rust_decimal::Decimal;

fn data_dir() -> PathBuf {
    std::env::temp_dir().join(format!("campus-eats-it-{}", uuid::Uuid::new_v4()))
}

fn file_store(dir: &Path) -> CartStore {
    CartStore::new(Arc::new(FileStorage::new(dir)))
}

fn nasi_lemak() -> CartItem {
    fixtures::menu_item(1, 1, "Nasi Lemak", 5).to_cart_item()
}

// =============================================================================
// Mutations
// =============================================================================

#[test]
fn test_same_item_twice_merges_into_one_line() {
    let (store, _) = fixtures::cart_store();
    store.add_item(nasi_lemak(), 2);
    let cart = store.add_item(nasi_lemak(), 3);

    assert_eq!(cart.len(), 1);
    assert_eq!(cart.lines()[0].quantity, 5);
    assert_eq!(store.subtotal().display(), "RM 25.00");
}

#[test]
fn test_reducing_below_one_removes_line() {
    let (store, _) = fixtures::cart_store();
    store.add_item(nasi_lemak(), 2);

    store.update_quantity(MenuItemId::new(1), -5);
    assert!(store.cart().line(MenuItemId::new(1)).is_none());
    assert_eq!(store.item_count(), 0);
}

#[test]
fn test_unknown_item_update_leaves_cart_unchanged() {
    let (store, _) = fixtures::cart_store();
    store.add_item(nasi_lemak(), 2);
    let before = store.cart();

    let after = store.update_quantity(MenuItemId::new(42), 3);
    assert_eq!(before, after);
}

#[test]
fn test_clear_persists_empty_cart() {
    let dir = data_dir();
    let store = file_store(&dir);
    store.add_item(nasi_lemak(), 1);
    store.clear();

    assert_eq!(store.item_count(), 0);
    let raw = std::fs::read_to_string(dir.join("cart.json")).unwrap();
    assert_eq!(raw, "[]");
    std::fs::remove_dir_all(&dir).ok();
}

// =============================================================================
// Persistence
// =============================================================================

#[test]
fn test_cart_survives_restart() {
    let dir = data_dir();
    file_store(&dir).add_item(nasi_lemak(), 2);

    let reopened = file_store(&dir);
    assert_eq!(reopened.item_count(), 2);
    assert_eq!(reopened.cart().lines()[0].vendor_id(), Some(VendorId::new(1)));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_undefined_file_reads_as_empty_cart() {
    let dir = data_dir();
    let storage = FileStorage::new(&dir);
    storage.write(keys::CART, "undefined").unwrap();

    let store = file_store(&dir);
    assert!(store.cart().is_empty());
    assert_eq!(store.item_count(), 0);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_malformed_file_is_discarded() {
    let dir = data_dir();
    let storage = FileStorage::new(&dir);
    storage.write(keys::CART, "[{\"id\": 1, \"quantity\":").unwrap();

    let store = file_store(&dir);
    assert!(store.cart().is_empty());
    assert!(!dir.join("cart.json").exists());

    store.add_item(nasi_lemak(), 1);
    assert_eq!(file_store(&dir).item_count(), 1);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_reads_cart_written_by_web_client() {
    let dir = data_dir();
    let storage = FileStorage::new(&dir);
    storage
        .write(
            keys::CART,
            r#"[
                {"id": 1, "name": "Nasi Lemak", "price": 5, "image": "/img/nl.png",
                 "category": "Rice", "vendorId": 1, "quantity": 2},
                {"id": 2, "name": "Roti Canai", "price": 3, "quantity": 1}
            ]"#,
        )
        .unwrap();

    let cart = file_store(&dir).cart();
    assert_eq!(cart.len(), 2);
    assert_eq!(cart.item_count(), 3);
    assert_eq!(cart.lines()[0].item.image_ref.as_deref(), Some("/img/nl.png"));
    assert_eq!(cart.lines()[1].vendor_id(), None);
    assert_eq!(cart.subtotal().amount, Decimal::new(13, 0));
    std::fs::remove_dir_all(&dir).ok();
}

// =============================================================================
// Sharing and Notification
// =============================================================================

#[test]
fn test_two_stores_on_one_directory_last_writer_wins() {
    let dir = data_dir();
    let first = file_store(&dir);
    let second = file_store(&dir);

    first.add_item(nasi_lemak(), 1);
    second.add_item(nasi_lemak(), 1);
    assert_eq!(first.item_count(), 2);

    first.clear();
    assert!(second.cart().is_empty());
    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_observer_sees_every_mutation() {
    let (store, _) = fixtures::cart_store();
    let mut changes = store.subscribe();

    store.add_item(nasi_lemak(), 1);
    changes.changed().await.unwrap();
    assert_eq!(*changes.borrow_and_update(), 1);
    assert_eq!(store.item_count(), 1);

    store.clear();
    changes.changed().await.unwrap();
    assert_eq!(*changes.borrow_and_update(), 2);
    assert_eq!(store.item_count(), 0);
}
