//! Vendor and menu browsing.

use campus_eats_client::backend::MenuItem;
use campus_eats_client::{AppError, AppState};
use campus_eats_core::VendorId;

/// List all vendors.
pub async fn vendors(state: &AppState) -> Result<(), AppError> {
    let vendors = state.backend().list_vendors().await?;
    if vendors.is_empty() {
        println!("No vendors yet.");
        return Ok(());
    }

    for vendor in vendors {
        let open = if vendor.is_open { "open" } else { "closed" };
        match vendor.hostel.as_deref() {
            Some(hostel) => println!("{:>4}  {}  ({hostel}, {open})", vendor.id, vendor.name),
            None => println!("{:>4}  {}  ({open})", vendor.id, vendor.name),
        }
    }
    Ok(())
}

/// Show one vendor's menu, optionally filtered.
pub async fn menu(
    state: &AppState,
    vendor_id: VendorId,
    category: Option<&str>,
    search: Option<&str>,
) -> Result<(), AppError> {
    let vendor = state.backend().vendor(vendor_id).await?;
    let items = state.backend().list_menu(vendor_id).await?;

    println!("{}", vendor.name);
    if let Some(description) = vendor.description.as_deref() {
        println!("{description}");
    }
    if !vendor.is_open {
        println!("(currently closed)");
    }
    println!();

    let shown = filter_menu(&items, category, search);
    if shown.is_empty() {
        println!("No menu items match.");
        return Ok(());
    }

    for item in shown {
        let availability = if item.is_available { "" } else { "  [sold out]" };
        println!(
            "{:>5}  {:<32} {:>10}  {}{availability}",
            item.id,
            item.name,
            item.unit_price().display(),
            item.category.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

/// Items in `category` (exact, case-insensitive) whose name contains
/// `search` (case-insensitive).
fn filter_menu<'a>(
    items: &'a [MenuItem],
    category: Option<&str>,
    search: Option<&str>,
) -> Vec<&'a MenuItem> {
    let search = search.map(str::to_lowercase);
    items
        .iter()
        .filter(|item| {
            category.is_none_or(|wanted| {
                item.category
                    .as_deref()
                    .is_some_and(|c| c.eq_ignore_ascii_case(wanted))
            })
        })
        .filter(|item| {
            search
                .as_deref()
                .is_none_or(|needle| item.name.to_lowercase().contains(needle))
        })
        .collect()
}
