//! The persisted, observable cart store.
//!
//! Every read goes to storage, so two stores sharing one storage (two CLI
//! invocations, or two handles in one process) always see the last write.
//! There is no merge or version check: the last writer wins.
//!
//! Every mutation loads the cart, applies the change, persists the full cart
//! and then bumps a revision counter on a `watch` channel. Subscribers get no
//! payload beyond the revision and re-read the store.

use std::sync::{Arc, Mutex, PoisonError};

use campus_eats_core::{Cart, CartItem, MenuItemId, Price, VendorId};
use tokio::sync::watch;
use tracing::debug;

use crate::storage::{KeyValueStorage, keys, read_json, write_json};

/// Revision counter published after every cart mutation.
pub type CartRevision = u64;

/// Receiver side of the change signal.
pub type CartChanges = watch::Receiver<CartRevision>;

/// Handle to the cart. Cheap to clone; clones share the change channel.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    storage: Arc<dyn KeyValueStorage>,
    changes: watch::Sender<CartRevision>,
    write_lock: Mutex<()>,
}

impl CartStore {
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(CartStoreInner {
                storage,
                changes,
                write_lock: Mutex::new(()),
            }),
        }
    }

    /// The current persisted cart. Missing or corrupt data reads as empty.
    #[must_use]
    pub fn cart(&self) -> Cart {
        read_json(self.inner.storage.as_ref(), keys::CART).unwrap_or_default()
    }

    /// Total units in the cart, for the badge counter.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.cart().item_count()
    }

    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.cart().subtotal()
    }

    /// Subscribe to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> CartChanges {
        self.inner.changes.subscribe()
    }

    /// Current revision (number of mutations made through this store).
    #[must_use]
    pub fn revision(&self) -> CartRevision {
        *self.inner.changes.borrow()
    }

    /// Add `quantity` units of `item`, merging with an existing line.
    pub fn add_item(&self, item: CartItem, quantity: u32) -> Cart {
        let item_id = item.item_id;
        let cart = self.mutate(|cart| cart.add_item(item, quantity));
        debug!(%item_id, quantity, items = cart.item_count(), "Added to cart");
        cart
    }

    /// Change a line's quantity by `delta`; lines reaching zero are removed.
    pub fn update_quantity(&self, item_id: MenuItemId, delta: i64) -> Cart {
        let cart = self.mutate(|cart| cart.update_quantity(item_id, delta));
        debug!(%item_id, delta, items = cart.item_count(), "Updated cart quantity");
        cart
    }

    /// Drop the line for `item_id`.
    pub fn remove_item(&self, item_id: MenuItemId) -> Cart {
        let cart = self.mutate(|cart| {
            cart.remove_item(item_id);
        });
        debug!(%item_id, "Removed from cart");
        cart
    }

    /// Record the vendor of a line that was stored without one.
    pub fn set_vendor(&self, item_id: MenuItemId, vendor_id: VendorId) -> Cart {
        self.mutate(|cart| {
            cart.set_vendor(item_id, vendor_id);
        })
    }

    /// Empty the cart and persist the empty state.
    pub fn clear(&self) {
        self.mutate(Cart::clear);
        debug!("Cleared cart");
    }

    fn mutate(&self, apply: impl FnOnce(&mut Cart)) -> Cart {
        let _guard = self
            .inner
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut cart = self.cart();
        apply(&mut cart);
        write_json(self.inner.storage.as_ref(), keys::CART, &cart);
        self.inner.changes.send_modify(|revision| *revision += 1);
        cart
    }
}
