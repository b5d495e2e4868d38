//! Test data shared by the integration tests.

use std::sync::Arc;

use campus_eats_client::CartStore;
use campus_eats_client::backend::{MenuItem, Session, SessionUser, Vendor};
use campus_eats_client::storage::MemoryStorage;
use campus_eats_core::{Email, MenuItemId, UserId, VendorId};
use chrono::{TimeDelta, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;

use crate::MemoryBackend;

/// The student every fixture session belongs to.
#[must_use]
pub fn student_id() -> UserId {
    UserId::new(uuid::Uuid::from_u128(0x3f0c_1c1e_7b7a_4c55_9d0b_2a6a_6f1e_9c10))
}

pub const STUDENT_EMAIL: &str = "ali@uni.my";
pub const STUDENT_PASSWORD: &str = "nasi-lemak-42";

/// The account that runs vendor 1.
#[must_use]
pub fn vendor_owner_id() -> UserId {
    UserId::new(uuid::Uuid::from_u128(0x9a7e_55d2_0c4b_4e8f_a1d3_6b2c_8e0f_1a24))
}

pub const VENDOR_EMAIL: &str = "kafe.sri@uni.my";

#[must_use]
pub fn vendor(id: i64, name: &str) -> Vendor {
    Vendor {
        id: VendorId::new(id),
        name: name.to_string(),
        description: None,
        image_url: None,
        hostel: None,
        is_open: true,
        owner_id: None,
    }
}

/// A menu item priced in whole ringgit.
#[must_use]
pub fn menu_item(id: i64, vendor_id: i64, name: &str, ringgit: i64) -> MenuItem {
    MenuItem {
        id: MenuItemId::new(id),
        vendor_id: Some(VendorId::new(vendor_id)),
        name: name.to_string(),
        description: None,
        price: Decimal::new(ringgit, 0),
        category: None,
        image_url: None,
        is_available: true,
    }
}

fn session_for(id: UserId, email: &str) -> Session {
    Session {
        access_token: SecretString::from(format!("test-token-{id}")),
        refresh_token: None,
        expires_at: Utc::now() + TimeDelta::hours(1),
        user: SessionUser {
            id,
            email: Email::parse(email).ok(),
        },
    }
}

/// A signed-in session for the fixture student.
#[must_use]
pub fn session() -> Session {
    session_for(student_id(), STUDENT_EMAIL)
}

/// A signed-in session for the owner of vendor 1.
#[must_use]
pub fn vendor_session() -> Session {
    session_for(vendor_owner_id(), VENDOR_EMAIL)
}

/// Two vendors:
/// - vendor 1 "Kafe Sri" (run by [`vendor_owner_id`]): item 1 Nasi Lemak RM5
/// - vendor 2 "Warung Pak Mat": item 2 Roti Canai RM3, item 3 Teh Tarik RM2
#[must_use]
pub fn campus_backend() -> MemoryBackend {
    let kafe_sri = Vendor {
        owner_id: Some(vendor_owner_id()),
        ..vendor(1, "Kafe Sri")
    };
    MemoryBackend::new()
        .with_vendor(kafe_sri)
        .with_vendor(vendor(2, "Warung Pak Mat"))
        .with_menu_item(menu_item(1, 1, "Nasi Lemak", 5))
        .with_menu_item(menu_item(2, 2, "Roti Canai", 3))
        .with_menu_item(menu_item(3, 2, "Teh Tarik", 2))
        .with_user(STUDENT_EMAIL, STUDENT_PASSWORD, student_id())
        .with_full_name(student_id(), "Ali bin Abu")
}

/// A cart store over fresh in-memory storage.
#[must_use]
pub fn cart_store() -> (CartStore, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    (CartStore::new(storage.clone()), storage)
}
