//! Cart commands.
//!
//! # Usage
//!
//! ```bash
//! sv-cli cart add price_2box --title "The Simple Valley Bar - 2 Boxes" --price 79.99
//! sv-cli cart inc price_2box
//! sv-cli cart dec price_2box --yes
//! sv-cli cart show
//! ```
//!
//! Each command prints the cart as it stands afterwards.

use std::fmt::Write as _;

use rust_decimal::Decimal;
use simple_valley_core::PriceId;
use simple_valley_core::cart::{
    CartError, CartLine, CartManager, CartView, KeyValueStore, QuantityChange,
};
use thiserror::Error;

/// Errors from cart commands.
#[derive(Debug, Error)]
pub enum CartCommandError {
    #[error("Invalid price ID: {0}")]
    InvalidId(String),

    #[error(transparent)]
    Cart(#[from] CartError),
}

/// A line to add, as given on the command line.
#[derive(Debug, Clone)]
pub struct NewLine {
    pub id: String,
    pub title: String,
    pub price: Decimal,
    pub quantity: u32,
    pub image: Option<String>,
}

fn parse_id(id: &str) -> Result<PriceId, CartCommandError> {
    PriceId::parse(id).map_err(|_| CartCommandError::InvalidId(id.to_owned()))
}

/// Render the cart view as plain text.
#[must_use]
pub fn render(view: &CartView) -> String {
    if let Some(message) = view.empty_message() {
        return message.to_string();
    }

    let mut out = String::new();
    for item in &view.items {
        let _ = writeln!(
            out,
            "{:>3} x {}  {}  ({})  [{}]",
            item.quantity, item.title, item.line_price, item.price, item.id
        );
    }
    let _ = write!(
        out,
        "{} item(s), subtotal {}",
        view.item_count, view.subtotal
    );
    out
}

/// Show the cart.
#[must_use]
pub fn show<S: KeyValueStore>(manager: &CartManager<S>) -> String {
    render(&manager.view())
}

/// Add a line, merging with an existing line for the same price.
///
/// # Errors
///
/// Returns an error if the ID or line is invalid, or the cart cannot be saved.
pub fn add<S: KeyValueStore>(
    manager: &mut CartManager<S>,
    line: NewLine,
) -> Result<String, CartCommandError> {
    let mut cart_line =
        CartLine::new(parse_id(&line.id)?, line.title, line.price).with_quantity(line.quantity);
    if let Some(image) = line.image {
        cart_line = cart_line.with_image(image);
    }

    let quantity = manager.add_item(cart_line)?;
    Ok(format!(
        "{} now x{quantity}\n{}",
        line.id,
        show(manager)
    ))
}

/// Remove a line outright.
///
/// # Errors
///
/// Returns an error if the ID is invalid or the cart cannot be saved.
pub fn remove<S: KeyValueStore>(
    manager: &mut CartManager<S>,
    id: &str,
) -> Result<String, CartCommandError> {
    let status = if manager.remove_item(&parse_id(id)?)? {
        format!("Removed {id}")
    } else {
        format!("{id} is not in the cart")
    };
    Ok(format!("{status}\n{}", show(manager)))
}

/// Change a line's quantity by `delta`.
///
/// # Errors
///
/// Returns an error if the ID is invalid or the cart cannot be saved.
pub fn change<S: KeyValueStore>(
    manager: &mut CartManager<S>,
    id: &str,
    delta: i32,
) -> Result<String, CartCommandError> {
    let status = match manager.change_quantity(&parse_id(id)?, delta)? {
        QuantityChange::Updated(quantity) => format!("{id} now x{quantity}"),
        QuantityChange::Removed => format!("Removed {id}"),
        QuantityChange::Unchanged => format!("{id} unchanged"),
        QuantityChange::Missing => format!("{id} is not in the cart"),
    };
    Ok(format!("{status}\n{}", show(manager)))
}

/// Empty the cart.
///
/// # Errors
///
/// Returns an error if the stored cart cannot be removed.
pub fn clear<S: KeyValueStore>(manager: &mut CartManager<S>) -> Result<String, CartCommandError> {
    manager.clear()?;
    Ok(show(manager))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use simple_valley_core::cart::MemoryStore;

    use super::*;

    fn two_box() -> NewLine {
        NewLine {
            id: "price_2box".to_string(),
            title: "2 Boxes".to_string(),
            price: Decimal::new(7999, 2),
            quantity: 1,
            image: None,
        }
    }

    #[test]
    fn test_render_empty() {
        let manager = CartManager::load(MemoryStore::new());
        assert_eq!(show(&manager), "Your cart is empty.");
    }

    #[test]
    fn test_add_twice_merges() {
        let mut manager = CartManager::load(MemoryStore::new());
        add(&mut manager, two_box()).unwrap();
        let out = add(&mut manager, two_box()).unwrap();

        assert!(out.starts_with("price_2box now x2"));
        assert!(out.ends_with("2 item(s), subtotal $159.98"));
    }

    #[test]
    fn test_dec_declined_keeps_last_unit() {
        let mut manager =
            CartManager::load(MemoryStore::new()).with_removal_confirmation(|_| false);
        add(&mut manager, two_box()).unwrap();

        let out = change(&mut manager, "price_2box", -1).unwrap();
        assert!(out.starts_with("price_2box unchanged"));
        assert_eq!(manager.cart().len(), 1);
    }

    #[test]
    fn test_invalid_id() {
        let mut manager = CartManager::load(MemoryStore::new());
        assert!(matches!(
            remove(&mut manager, "not a price"),
            Err(CartCommandError::InvalidId(_))
        ));
    }

    #[test]
    fn test_clear() {
        let mut manager = CartManager::load(MemoryStore::new());
        add(&mut manager, two_box()).unwrap();

        assert_eq!(clear(&mut manager).unwrap(), "Your cart is empty.");
        assert!(manager.cart().is_empty());
    }
}
