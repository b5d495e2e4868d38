//! Checkout: split the cart by vendor and submit one order per vendor.
//!
//! Each vendor group is submitted in two sequential steps (create the order,
//! then insert its lines). Groups are submitted concurrently. Checkout
//! succeeds only when every group succeeds, and only then is the cart
//! cleared.
//!
//! When any group fails, every order this checkout already created is moved
//! to `cancelled`, so a failed checkout leaves no live orders behind and the
//! cart stays intact for a retry.

use std::fmt::Write as _;

use campus_eats_core::{OrderId, OrderStatus, Price, SplitError, VendorOrderGroup};
use futures::future::join_all;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::backend::{Backend, BackendError, NewOrder, NewOrderItem, OrderRecord, Session};
use crate::cart_store::CartStore;

/// Errors that can end a checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing to order.
    #[error("Your cart is empty!")]
    EmptyCart,

    /// No signed-in user.
    #[error("Please login to place an order")]
    AuthenticationRequired,

    /// The cart references vendors or items the backend no longer has.
    #[error("Cart contains items from unavailable vendors. Please clear your cart and try again.")]
    StaleCart,

    /// A backend request failed.
    #[error("Failed to place order: {0}")]
    Backend(BackendError),

    /// Checkout failed and some of its orders could not be cancelled.
    #[error("{cause} (orders left open: {})", format_ids(.uncancelled))]
    Partial {
        cause: Box<CheckoutError>,
        uncancelled: Vec<OrderId>,
    },
}

impl CheckoutError {
    /// Classify a failed backend request.
    #[must_use]
    pub fn from_backend(err: BackendError) -> Self {
        if err.is_foreign_key_violation() {
            Self::StaleCart
        } else {
            Self::Backend(err)
        }
    }

    /// Orders created by the failed checkout that are still open.
    #[must_use]
    pub fn uncancelled_orders(&self) -> &[OrderId] {
        match self {
            Self::Partial { uncancelled, .. } => uncancelled,
            _ => &[],
        }
    }
}

fn format_ids(ids: &[OrderId]) -> String {
    let mut out = String::new();
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "#{id}");
    }
    out
}

/// Orders created by a successful checkout, one per vendor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutReceipt {
    pub orders: Vec<OrderRecord>,
}

impl CheckoutReceipt {
    #[must_use]
    pub fn order_ids(&self) -> Vec<OrderId> {
        self.orders.iter().map(|order| order.id).collect()
    }

    /// Sum of all order totals.
    #[must_use]
    pub fn total(&self) -> Price {
        self.orders
            .iter()
            .map(|order| Price::myr(order.total_amount))
            .sum()
    }
}

/// Outcome of one vendor group that did not go through.
struct GroupFailure {
    /// The order row, if the create step succeeded before the failure.
    created: Option<OrderRecord>,
    error: BackendError,
}

/// Checkout service.
pub struct CheckoutService<'a> {
    cart: &'a CartStore,
    backend: &'a dyn Backend,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(cart: &'a CartStore, backend: &'a dyn Backend) -> Self {
        Self { cart, backend }
    }

    /// Place one order per vendor for the current cart.
    ///
    /// # Errors
    ///
    /// - `CheckoutError::EmptyCart` / `CheckoutError::AuthenticationRequired`
    ///   before any backend call
    /// - `CheckoutError::StaleCart` if an item or vendor no longer exists
    /// - `CheckoutError::Backend` for any other failed request
    /// - `CheckoutError::Partial` if, after a failure, created orders could
    ///   not be cancelled
    #[instrument(skip(self, session), fields(user_id))]
    pub async fn place_orders(
        &self,
        session: Option<&Session>,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        if self.cart.cart().is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let session = session.ok_or(CheckoutError::AuthenticationRequired)?;
        tracing::Span::current().record("user_id", tracing::field::display(session.user_id()));

        self.resolve_vendors().await?;

        let groups = self.cart.cart().split_by_vendor().map_err(|e| match e {
            SplitError::Empty => CheckoutError::EmptyCart,
            SplitError::UnresolvedVendor(_) => CheckoutError::StaleCart,
        })?;

        let results = join_all(
            groups
                .iter()
                .map(|group| self.submit_group(session, group)),
        )
        .await;

        let mut created = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok(order) => created.push(order),
                Err(failure) => {
                    created.extend(failure.created);
                    first_error.get_or_insert(failure.error);
                }
            }
        }

        let Some(err) = first_error else {
            self.cart.clear();
            let receipt = CheckoutReceipt { orders: created };
            info!(
                orders = receipt.orders.len(),
                total = %receipt.total(),
                "Checkout completed"
            );
            return Ok(receipt);
        };

        error!(error = %err, created = created.len(), "Checkout failed");
        let cause = CheckoutError::from_backend(err);
        let uncancelled = self.cancel_orders(session, &created).await;
        if uncancelled.is_empty() {
            Err(cause)
        } else {
            Err(CheckoutError::Partial {
                cause: Box::new(cause),
                uncancelled,
            })
        }
    }

    /// Look up the vendor of every line stored without one and persist it.
    async fn resolve_vendors(&self) -> Result<(), CheckoutError> {
        for item_id in self.cart.cart().unresolved_items() {
            let item = match self.backend.menu_item(item_id).await {
                Ok(item) => item,
                Err(BackendError::NotFound(_)) => {
                    warn!(%item_id, "Cart item no longer exists");
                    return Err(CheckoutError::StaleCart);
                }
                Err(e) => return Err(CheckoutError::from_backend(e)),
            };
            let Some(vendor_id) = item.vendor_id else {
                warn!(%item_id, "Cart item has no vendor");
                return Err(CheckoutError::StaleCart);
            };
            self.cart.set_vendor(item_id, vendor_id);
        }
        Ok(())
    }

    /// Create the order, then insert its lines.
    #[instrument(skip(self, session, group), fields(vendor_id = %group.vendor_id))]
    async fn submit_group(
        &self,
        session: &Session,
        group: &VendorOrderGroup,
    ) -> Result<OrderRecord, GroupFailure> {
        let new_order = NewOrder {
            user_id: session.user_id(),
            vendor_id: group.vendor_id,
            total_amount: group.total().amount,
            status: OrderStatus::Pending,
        };

        let order = self
            .backend
            .create_order(session, &new_order)
            .await
            .map_err(|error| GroupFailure {
                created: None,
                error,
            })?;

        let items: Vec<NewOrderItem> = group
            .lines
            .iter()
            .map(|line| NewOrderItem {
                order_id: order.id,
                menu_item_id: line.item_id(),
                quantity: line.quantity,
                price_at_time: line.item.unit_price,
            })
            .collect();

        match self.backend.insert_order_items(session, &items).await {
            Ok(()) => {
                info!(order_id = %order.id, total = %order.total_amount, "Order placed");
                Ok(order)
            }
            Err(error) => Err(GroupFailure {
                created: Some(order),
                error,
            }),
        }
    }

    /// Cancel orders created by a failed checkout. Returns the ids that are
    /// still open afterwards.
    async fn cancel_orders(&self, session: &Session, orders: &[OrderRecord]) -> Vec<OrderId> {
        let results = join_all(orders.iter().map(|order| async move {
            if !order.status.can_transition_to(OrderStatus::Cancelled) {
                warn!(order_id = %order.id, status = %order.status, "Order cannot be cancelled");
                return Err(order.id);
            }
            match self
                .backend
                .update_order_status(session, order.id, OrderStatus::Cancelled)
                .await
            {
                Ok(_) => {
                    info!(order_id = %order.id, "Cancelled order from failed checkout");
                    Ok(())
                }
                Err(e) => {
                    error!(order_id = %order.id, error = %e, "Failed to cancel order");
                    Err(order.id)
                }
            }
        }))
        .await;

        results.into_iter().filter_map(Result::err).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_messages() {
        assert_eq!(CheckoutError::EmptyCart.to_string(), "Your cart is empty!");
        assert_eq!(
            CheckoutError::AuthenticationRequired.to_string(),
            "Please login to place an order"
        );
        assert_eq!(
            CheckoutError::StaleCart.to_string(),
            "Cart contains items from unavailable vendors. Please clear your cart and try again."
        );
        assert_eq!(
            CheckoutError::Backend(BackendError::api(500, None, "connection reset")).to_string(),
            "Failed to place order: connection reset"
        );
    }

    #[test]
    fn test_foreign_key_violation_is_stale_cart() {
        let err = CheckoutError::from_backend(BackendError::api(
            409,
            Some("23503"),
            "violates foreign key constraint \"orders_vendor_id_fkey\"",
        ));
        assert!(matches!(err, CheckoutError::StaleCart));

        let err = CheckoutError::from_backend(BackendError::api(400, Some("22P02"), "bad input"));
        assert!(matches!(err, CheckoutError::Backend(_)));
    }

    #[test]
    fn test_partial_lists_open_orders() {
        let err = CheckoutError::Partial {
            cause: Box::new(CheckoutError::StaleCart),
            uncancelled: vec![OrderId::new(7), OrderId::new(9)],
        };
        assert!(err.to_string().ends_with("(orders left open: #7, #9)"));
        assert_eq!(err.uncancelled_orders(), &[OrderId::new(7), OrderId::new(9)]);
        assert!(CheckoutError::EmptyCart.uncancelled_orders().is_empty());
    }
}
