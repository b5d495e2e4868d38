//! Shopping cart model and per-vendor order splitting.
//!
//! A [`Cart`] is an ordered list of [`CartLine`]s, unique by menu item id.
//! Every line present has a quantity of at least one: reducing a line to zero
//! removes it, and adding zero units is a no-op. All mutations are total.
//!
//! The persisted form is a JSON array of lines:
//!
//! ```json
//! [{"id": 3, "name": "Nasi Lemak", "price": "5.00", "image": null,
//!   "category": "Rice", "vendorId": 1, "quantity": 2}]
//! ```
//!
//! At checkout the cart is partitioned into [`VendorOrderGroup`]s, one per
//! vendor, each becoming one backend order.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{MenuItemId, Price, VendorId};

/// A menu item as captured when it was put in the cart.
///
/// The unit price is a snapshot: later menu price changes do not affect lines
/// already in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[serde(rename = "id")]
    pub item_id: MenuItemId,
    pub name: String,
    #[serde(rename = "price")]
    pub unit_price: Decimal,
    #[serde(rename = "image", default)]
    pub image_ref: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Missing for lines saved before the vendor was known.
    #[serde(default)]
    pub vendor_id: Option<VendorId>,
}

impl CartItem {
    /// Create an item with the required fields.
    #[must_use]
    pub const fn new(
        item_id: MenuItemId,
        name: String,
        unit_price: Decimal,
        vendor_id: Option<VendorId>,
    ) -> Self {
        Self {
            item_id,
            name,
            unit_price,
            image_ref: None,
            category: None,
            vendor_id,
        }
    }

    #[must_use]
    pub fn with_image(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// One cart entry: an item and how many of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    #[serde(flatten)]
    pub item: CartItem,
    pub quantity: u32,
}

impl CartLine {
    #[must_use]
    pub const fn item_id(&self) -> MenuItemId {
        self.item.item_id
    }

    #[must_use]
    pub const fn vendor_id(&self) -> Option<VendorId> {
        self.item.vendor_id
    }

    /// Unit price in the default currency.
    #[must_use]
    pub const fn unit_price(&self) -> Price {
        Price::myr(self.item.unit_price)
    }

    /// `unit_price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price().times(self.quantity)
    }
}

/// Errors from [`Cart::split_by_vendor`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SplitError {
    #[error("cart is empty")]
    Empty,
    #[error("menu item {0} has no vendor")]
    UnresolvedVendor(MenuItemId),
}

/// The shopping cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<CartLine>", into = "Vec<CartLine>")]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl From<Vec<CartLine>> for Cart {
    /// Normalizes untrusted input: zero-quantity lines are dropped and
    /// duplicate item ids are merged into the first occurrence.
    fn from(raw: Vec<CartLine>) -> Self {
        let mut cart = Self::new();
        for line in raw {
            cart.add_item(line.item, line.quantity);
        }
        cart
    }
}

impl From<Cart> for Vec<CartLine> {
    fn from(cart: Cart) -> Self {
        cart.lines
    }
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn line(&self, item_id: MenuItemId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.item_id() == item_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Total number of units across all lines (the badge counter).
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0u32, |sum, line| sum.saturating_add(line.quantity))
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Add `quantity` units of `item`.
    ///
    /// An existing line for the same item id keeps its captured details and
    /// has its quantity increased; otherwise a new line is appended.
    pub fn add_item(&mut self, item: CartItem, quantity: u32) {
        if quantity == 0 {
            return;
        }
        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|line| line.item_id() == item.item_id)
        {
            line.quantity = line.quantity.saturating_add(quantity);
            if line.item.vendor_id.is_none() {
                line.item.vendor_id = item.vendor_id;
            }
        } else {
            self.lines.push(CartLine { item, quantity });
        }
    }

    /// Add `delta` (possibly negative) to a line's quantity.
    ///
    /// The result is clamped at zero and a line at zero is removed. Unknown
    /// item ids leave the cart unchanged.
    pub fn update_quantity(&mut self, item_id: MenuItemId, delta: i64) {
        for line in &mut self.lines {
            if line.item_id() == item_id {
                let next = i64::from(line.quantity)
                    .saturating_add(delta)
                    .clamp(0, i64::from(u32::MAX));
                line.quantity = u32::try_from(next).unwrap_or(0);
            }
        }
        self.lines.retain(|line| line.quantity > 0);
    }

    /// Drop the line for `item_id`. Returns whether a line was removed.
    pub fn remove_item(&mut self, item_id: MenuItemId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| line.item_id() != item_id);
        self.lines.len() != before
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Item ids whose line has no vendor.
    #[must_use]
    pub fn unresolved_items(&self) -> Vec<MenuItemId> {
        self.lines
            .iter()
            .filter(|line| line.vendor_id().is_none())
            .map(CartLine::item_id)
            .collect()
    }

    /// Fill in the vendor of a line. Returns whether a line was updated.
    pub fn set_vendor(&mut self, item_id: MenuItemId, vendor_id: VendorId) -> bool {
        self.lines
            .iter_mut()
            .find(|line| line.item_id() == item_id)
            .is_some_and(|line| {
                line.item.vendor_id = Some(vendor_id);
                true
            })
    }

    /// Partition the lines into one group per vendor, ordered by vendor id.
    /// Line order inside a group follows cart order.
    ///
    /// # Errors
    ///
    /// - [`SplitError::Empty`] if the cart has no lines
    /// - [`SplitError::UnresolvedVendor`] for the first line without a vendor
    pub fn split_by_vendor(&self) -> Result<Vec<VendorOrderGroup>, SplitError> {
        if self.lines.is_empty() {
            return Err(SplitError::Empty);
        }

        let mut groups: BTreeMap<VendorId, Vec<CartLine>> = BTreeMap::new();
        for line in &self.lines {
            let vendor_id = line
                .vendor_id()
                .ok_or_else(|| SplitError::UnresolvedVendor(line.item_id()))?;
            groups.entry(vendor_id).or_default().push(line.clone());
        }

        Ok(groups
            .into_iter()
            .map(|(vendor_id, lines)| VendorOrderGroup { vendor_id, lines })
            .collect())
    }
}

/// Cart lines that will become a single order for one vendor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorOrderGroup {
    pub vendor_id: VendorId,
    pub lines: Vec<CartLine>,
}

impl VendorOrderGroup {
    /// `sum(unit_price * quantity)` over the group's lines.
    #[must_use]
    pub fn total(&self) -> Price {
        self.lines.iter().map(CartLine::line_total).sum()
    }
}
