//! Integration tests for Campus Eats.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p campus-eats-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_store` - Persistence and change notification of the cart
//! - `checkout` - Vendor splitting, submission and compensation
//! - `tracking` - Order status subscription and the tracker
//! - `session` - Login and the stored session
//! - `vendor_orders` - A vendor's order board and status changes
//!
//! The tests run against [`MemoryBackend`], an in-memory [`Backend`] with a
//! call log and failure injection. No network or database is needed.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use campus_eats_client::backend::{
    Backend, BackendError, CustomerRef, IncomingOrder, MenuItem, MenuItemRef, NewOrder,
    NewOrderItem, OrderRecord, OrderStatusStream, OrderStatusUpdate, OrderSummary,
    OrderSummaryLine, Session, SessionUser, Vendor, VendorRef,
};
use campus_eats_core::{Email, MenuItemId, OrderId, OrderStatus, UserId, VendorId};
use chrono::{TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Barrier, mpsc};

pub mod fixtures;

/// A backend request, as recorded by [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListVendors,
    Vendor(VendorId),
    ListMenu(VendorId),
    MenuItem(MenuItemId),
    SignIn(String),
    CreateOrder(NewOrder),
    InsertOrderItems(Vec<NewOrderItem>),
    UpdateOrderStatus(OrderId, OrderStatus),
    Order(OrderId),
    ListOrders(UserId),
    ListVendorOrders(VendorId),
    SubscribeOrderStatus(OrderId),
}

/// In-memory backend.
///
/// Creating an order for a vendor it does not know fails with a foreign key
/// violation, like the real schema does. Orders are only visible to their
/// customer and to the owner of their vendor.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    vendors: BTreeMap<VendorId, Vendor>,
    menu: BTreeMap<MenuItemId, MenuItem>,
    users: Vec<(Email, String, UserId)>,
    full_names: HashMap<UserId, String>,
    orders: BTreeMap<OrderId, OrderRecord>,
    order_items: Vec<NewOrderItem>,
    next_order_id: i64,
    calls: Vec<Call>,
    failing_orders: HashSet<VendorId>,
    failing_items: HashSet<VendorId>,
    failing_cancellations: bool,
    order_gate: Option<Arc<Barrier>>,
    subscribers: HashMap<OrderId, Vec<mpsc::Sender<OrderStatusUpdate>>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    #[must_use]
    pub fn with_vendor(self, vendor: Vendor) -> Self {
        self.state().vendors.insert(vendor.id, vendor);
        self
    }

    #[must_use]
    pub fn with_menu_item(self, item: MenuItem) -> Self {
        self.state().menu.insert(item.id, item);
        self
    }

    #[must_use]
    pub fn with_user(self, email: &str, password: &str, user_id: UserId) -> Self {
        if let Ok(email) = Email::parse(email) {
            self.state()
                .users
                .push((email, password.to_string(), user_id));
        }
        self
    }

    /// Give a user the display name vendors see on incoming orders.
    #[must_use]
    pub fn with_full_name(self, user_id: UserId, full_name: &str) -> Self {
        self.state().full_names.insert(user_id, full_name.to_string());
        self
    }

    /// Remove a vendor, as if it was deleted after items were carted.
    pub fn remove_vendor(&self, vendor_id: VendorId) {
        self.state().vendors.remove(&vendor_id);
    }

    /// Remove a menu item.
    pub fn remove_menu_item(&self, item_id: MenuItemId) {
        self.state().menu.remove(&item_id);
    }

    // =========================================================================
    // Failure injection
    // =========================================================================

    /// Make order creation for `vendor_id` fail with a server error.
    pub fn fail_orders_for(&self, vendor_id: VendorId) {
        self.state().failing_orders.insert(vendor_id);
    }

    /// Make line insertion for orders of `vendor_id` fail.
    pub fn fail_order_items_for(&self, vendor_id: VendorId) {
        self.state().failing_items.insert(vendor_id);
    }

    /// Make every status update fail.
    pub fn fail_cancellations(&self) {
        self.state().failing_cancellations = true;
    }

    /// Hold each order creation until `count` creations are waiting at once.
    pub fn gate_order_creation(&self, count: usize) {
        self.state().order_gate = Some(Arc::new(Barrier::new(count)));
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Every request made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Requests that created or changed records.
    #[must_use]
    pub fn write_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| {
                matches!(
                    call,
                    Call::CreateOrder(_) | Call::InsertOrderItems(_) | Call::UpdateOrderStatus(..)
                )
            })
            .collect()
    }

    #[must_use]
    pub fn orders(&self) -> Vec<OrderRecord> {
        self.state().orders.values().cloned().collect()
    }

    #[must_use]
    pub fn order_items(&self) -> Vec<NewOrderItem> {
        self.state().order_items.clone()
    }

    // =========================================================================
    // Vendor side
    // =========================================================================

    /// Change an order's status and push it to subscribers. Subscriptions
    /// close after a terminal status.
    pub fn set_status(&self, order_id: OrderId, status: OrderStatus) {
        self.state().apply_status(order_id, status);
    }

    /// Drop every subscription without a terminal status.
    pub fn disconnect_subscribers(&self) {
        self.state().subscribers.clear();
    }
}

impl State {
    fn apply_status(&mut self, order_id: OrderId, status: OrderStatus) -> Option<OrderRecord> {
        let order = self.orders.get_mut(&order_id)?;
        order.status = status;
        let record = order.clone();

        let update = OrderStatusUpdate {
            order_id,
            status,
            observed_at: Utc::now(),
        };
        if let Some(senders) = self.subscribers.get_mut(&order_id) {
            senders.retain(|tx| tx.try_send(update).is_ok());
        }
        if status.is_terminal() {
            self.subscribers.remove(&order_id);
        }
        Some(record)
    }

    fn owns_vendor(&self, user_id: UserId, vendor_id: VendorId) -> bool {
        self.vendors
            .get(&vendor_id)
            .is_some_and(|vendor| vendor.owner_id == Some(user_id))
    }

    fn summary_lines(&self, order_id: OrderId) -> Vec<OrderSummaryLine> {
        self.order_items
            .iter()
            .filter(|item| item.order_id == order_id)
            .map(|item| OrderSummaryLine {
                quantity: item.quantity,
                price_at_time: item.price_at_time,
                menu_item: self.menu.get(&item.menu_item_id).map(|m| MenuItemRef {
                    name: m.name.clone(),
                }),
            })
            .collect()
    }
}

fn foreign_key_violation(vendor_id: VendorId) -> BackendError {
    BackendError::api(
        409,
        Some("23503"),
        format!(
            "insert or update on table \"orders\" violates foreign key constraint \
             \"orders_vendor_id_fkey\" (vendor_id={vendor_id})"
        ),
    )
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn list_vendors(&self) -> Result<Vec<Vendor>, BackendError> {
        let mut state = self.state();
        state.calls.push(Call::ListVendors);
        let mut vendors: Vec<Vendor> = state.vendors.values().cloned().collect();
        vendors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(vendors)
    }

    async fn vendor(&self, id: VendorId) -> Result<Vendor, BackendError> {
        let mut state = self.state();
        state.calls.push(Call::Vendor(id));
        state
            .vendors
            .get(&id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("Vendor not found: {id}")))
    }

    async fn list_menu(&self, vendor_id: VendorId) -> Result<Vec<MenuItem>, BackendError> {
        let mut state = self.state();
        state.calls.push(Call::ListMenu(vendor_id));
        Ok(state
            .menu
            .values()
            .filter(|item| item.vendor_id == Some(vendor_id))
            .cloned()
            .collect())
    }

    async fn menu_item(&self, id: MenuItemId) -> Result<MenuItem, BackendError> {
        let mut state = self.state();
        state.calls.push(Call::MenuItem(id));
        state
            .menu
            .get(&id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("Menu item not found: {id}")))
    }

    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Session, BackendError> {
        let mut state = self.state();
        state.calls.push(Call::SignIn(email.as_str().to_string()));
        let user_id = state
            .users
            .iter()
            .find(|(e, p, _)| e == email && p == password.expose_secret())
            .map(|(_, _, id)| *id)
            .ok_or_else(|| BackendError::Unauthorized("Invalid login credentials".to_string()))?;

        Ok(Session {
            access_token: SecretString::from(format!("token-{user_id}")),
            refresh_token: None,
            expires_at: Utc::now() + TimeDelta::hours(1),
            user: SessionUser {
                id: user_id,
                email: Some(email.clone()),
            },
        })
    }

    async fn create_order(
        &self,
        session: &Session,
        order: &NewOrder,
    ) -> Result<OrderRecord, BackendError> {
        let gate = self.state().order_gate.clone();
        if let Some(gate) = gate {
            gate.wait().await;
        }

        let mut state = self.state();
        state.calls.push(Call::CreateOrder(order.clone()));

        if order.user_id != session.user_id() {
            return Err(BackendError::api(
                403,
                Some("42501"),
                "new row violates row-level security policy for table \"orders\"",
            ));
        }
        if state.failing_orders.contains(&order.vendor_id) {
            return Err(BackendError::api(500, None, "could not create order"));
        }
        if !state.vendors.contains_key(&order.vendor_id) {
            return Err(foreign_key_violation(order.vendor_id));
        }

        state.next_order_id += 1;
        let record = OrderRecord {
            id: OrderId::new(state.next_order_id),
            user_id: order.user_id,
            vendor_id: order.vendor_id,
            total_amount: order.total_amount,
            status: order.status,
            created_at: Utc::now(),
        };
        state.orders.insert(record.id, record.clone());
        Ok(record)
    }

    async fn insert_order_items(
        &self,
        _session: &Session,
        items: &[NewOrderItem],
    ) -> Result<(), BackendError> {
        let mut state = self.state();
        state.calls.push(Call::InsertOrderItems(items.to_vec()));

        for item in items {
            let vendor_id = state
                .orders
                .get(&item.order_id)
                .map(|order| order.vendor_id)
                .ok_or_else(|| {
                    BackendError::api(409, Some("23503"), "order_items_order_id_fkey")
                })?;
            if state.failing_items.contains(&vendor_id) {
                return Err(BackendError::api(500, None, "could not insert order items"));
            }
        }
        state.order_items.extend_from_slice(items);
        Ok(())
    }

    async fn update_order_status(
        &self,
        session: &Session,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<OrderRecord, BackendError> {
        let mut state = self.state();
        state.calls.push(Call::UpdateOrderStatus(order_id, status));
        if state.failing_cancellations {
            return Err(BackendError::api(500, None, "could not update order"));
        }

        // Rows the caller may not touch are invisible, like under row level security
        let user_id = session.user_id();
        let visible = state.orders.get(&order_id).is_some_and(|order| {
            order.user_id == user_id || state.owns_vendor(user_id, order.vendor_id)
        });
        if !visible {
            return Err(BackendError::NotFound(format!("Order not found: {order_id}")));
        }
        state
            .apply_status(order_id, status)
            .ok_or_else(|| BackendError::NotFound(format!("Order not found: {order_id}")))
    }

    async fn order(
        &self,
        _session: &Session,
        order_id: OrderId,
    ) -> Result<OrderRecord, BackendError> {
        let mut state = self.state();
        state.calls.push(Call::Order(order_id));
        state
            .orders
            .get(&order_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("Order not found: {order_id}")))
    }

    async fn list_orders(
        &self,
        _session: &Session,
        user_id: UserId,
    ) -> Result<Vec<OrderSummary>, BackendError> {
        let mut state = self.state();
        state.calls.push(Call::ListOrders(user_id));

        let mut summaries: Vec<OrderSummary> = state
            .orders
            .values()
            .filter(|order| order.user_id == user_id)
            .map(|order| OrderSummary {
                id: order.id,
                total_amount: order.total_amount,
                status: order.status,
                created_at: order.created_at,
                vendor: state.vendors.get(&order.vendor_id).map(|v| VendorRef {
                    name: v.name.clone(),
                    image_url: v.image_url.clone(),
                }),
                order_items: state.summary_lines(order.id),
            })
            .collect();

        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(summaries)
    }

    async fn list_vendor_orders(
        &self,
        session: &Session,
        vendor_id: VendorId,
    ) -> Result<Vec<IncomingOrder>, BackendError> {
        let mut state = self.state();
        state.calls.push(Call::ListVendorOrders(vendor_id));
        if !state.owns_vendor(session.user_id(), vendor_id) {
            return Ok(Vec::new());
        }

        let mut orders: Vec<IncomingOrder> = state
            .orders
            .values()
            .filter(|order| order.vendor_id == vendor_id)
            .map(|order| IncomingOrder {
                id: order.id,
                total_amount: order.total_amount,
                status: order.status,
                created_at: order.created_at,
                customer: Some(CustomerRef {
                    full_name: state.full_names.get(&order.user_id).cloned(),
                    email: state
                        .users
                        .iter()
                        .find(|(_, _, id)| *id == order.user_id)
                        .map(|(email, _, _)| email.as_str().to_string()),
                }),
                order_items: state.summary_lines(order.id),
            })
            .collect();

        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn subscribe_order_status(
        &self,
        _session: &Session,
        order_id: OrderId,
    ) -> Result<OrderStatusStream, BackendError> {
        let mut state = self.state();
        state.calls.push(Call::SubscribeOrderStatus(order_id));
        let status = state
            .orders
            .get(&order_id)
            .map(|order| order.status)
            .ok_or_else(|| BackendError::NotFound(format!("Order not found: {order_id}")))?;

        let (tx, rx) = mpsc::channel(16);
        let _ = tx.try_send(OrderStatusUpdate {
            order_id,
            status,
            observed_at: Utc::now(),
        });
        if !status.is_terminal() {
            state.subscribers.entry(order_id).or_default().push(tx);
        }
        Ok(rx)
    }
}
