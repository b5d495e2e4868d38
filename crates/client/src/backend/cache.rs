//! Cache types for vendor and menu responses.

use campus_eats_core::{MenuItemId, VendorId};

use super::types::{MenuItem, Vendor};

/// Cache key for directory reads.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Vendors,
    Vendor(VendorId),
    Menu(VendorId),
    MenuItem(MenuItemId),
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Vendors(Vec<Vendor>),
    Vendor(Box<Vendor>),
    Menu(Vec<MenuItem>),
    MenuItem(Box<MenuItem>),
}
