//! Cart commands.

use campus_eats_client::error::add_breadcrumb;
use campus_eats_client::{AppError, AppState};
use campus_eats_core::{Cart, MenuItemId};

/// Print the cart.
pub fn show(state: &AppState) {
    print_cart(&state.cart().cart());
}

/// Add a menu item at its current price.
pub async fn add(state: &AppState, item_id: MenuItemId, quantity: u32) -> Result<(), AppError> {
    if quantity == 0 {
        return Err(AppError::BadRequest("quantity must be at least 1".to_string()));
    }

    let item = state.backend().menu_item(item_id).await?;
    if !item.is_available {
        return Err(AppError::BadRequest(format!(
            "{} is currently unavailable",
            item.name
        )));
    }

    let cart = state.cart().add_item(item.to_cart_item(), quantity);
    let (id, qty) = (item_id.to_string(), quantity.to_string());
    add_breadcrumb(
        "cart",
        "Added item",
        Some(&[("item_id", id.as_str()), ("quantity", qty.as_str())]),
    );

    println!("Added {quantity} x {} to your cart.", item.name);
    println!("{} item(s), subtotal {}", cart.item_count(), cart.subtotal().display());
    Ok(())
}

/// Change a line's quantity by `delta`.
pub fn update(state: &AppState, item_id: MenuItemId, delta: i64) -> Result<(), AppError> {
    if state.cart().cart().line(item_id).is_none() {
        return Err(AppError::NotFound(format!("item {item_id} is not in your cart")));
    }

    let cart = state.cart().update_quantity(item_id, delta);
    match cart.line(item_id) {
        Some(line) => println!("{} x {}", line.quantity, line.item.name),
        None => println!("Removed item {item_id} from your cart."),
    }
    Ok(())
}

/// Remove a line.
pub fn remove(state: &AppState, item_id: MenuItemId) -> Result<(), AppError> {
    let Some(name) = state.cart().cart().line(item_id).map(|l| l.item.name.clone()) else {
        return Err(AppError::NotFound(format!("item {item_id} is not in your cart")));
    };

    state.cart().remove_item(item_id);
    println!("Removed {name} from your cart.");
    Ok(())
}

/// Empty the cart.
pub fn clear(state: &AppState) {
    state.cart().clear();
    println!("Cart cleared.");
}

fn print_cart(cart: &Cart) {
    if cart.is_empty() {
        println!("Your cart is empty.");
        return;
    }

    for line in cart.lines() {
        let vendor = line
            .vendor_id()
            .map_or_else(|| "?".to_string(), |id| id.to_string());
        println!(
            "{:>5}  {:>3} x {:<32} {:>10}  vendor {vendor}",
            line.item_id(),
            line.quantity,
            line.item.name,
            line.line_total().display(),
        );
    }
    println!();
    println!(
        "{} item(s), subtotal {}",
        cart.item_count(),
        cart.subtotal().display()
    );
}
