//! Display data handed to render handlers after every cart change.

use rust_decimal::Decimal;

use super::line::{Cart, CartLine};
use crate::types::{format_usd, to_cents};

/// Cart line display data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItemView {
    pub id: String,
    pub title: String,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
    pub image: Option<String>,
}

/// Cart display data: count badge, line list, subtotal and checkout button state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub item_count: u64,
    pub checkout_enabled: bool,
}

impl CartView {
    /// Create the view of an empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            subtotal: "$0.00".to_string(),
            item_count: 0,
            checkout_enabled: false,
        }
    }

    /// Message shown in place of the line list when the cart is empty.
    #[must_use]
    pub fn empty_message(&self) -> Option<&'static str> {
        self.items.is_empty().then_some("Your cart is empty.")
    }
}

/// Format an amount in major units as a price string.
fn format_price(amount: Decimal) -> String {
    to_cents(amount).map_or_else(|_| format!("${amount}"), format_usd)
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        let totals = cart.totals();
        Self {
            items: cart.lines().iter().map(CartItemView::from).collect(),
            subtotal: format_price(totals.subtotal),
            item_count: totals.item_count,
            checkout_enabled: !cart.is_empty(),
        }
    }
}

impl From<&CartLine> for CartItemView {
    fn from(line: &CartLine) -> Self {
        Self {
            id: line.id.to_string(),
            title: line.title.clone(),
            quantity: line.quantity,
            price: format_price(line.unit_price),
            line_price: format_price(line.line_total()),
            image: line.image_ref.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::PriceId;

    #[test]
    fn test_empty_view() {
        let view = CartView::from(&Cart::new());
        assert_eq!(view, CartView::empty());
        assert_eq!(view.empty_message(), Some("Your cart is empty."));
    }

    #[test]
    fn test_view_formats_prices() {
        let mut cart = Cart::new();
        cart.add(
            CartLine::new(
                PriceId::parse("price_2box").unwrap(),
                "The Simple Valley Bar - 2 Boxes",
                Decimal::new(7999, 2),
            )
            .with_quantity(2)
            .with_image("assets/img/SecondaryPic2.png"),
        )
        .unwrap();

        let view = CartView::from(&cart);
        assert_eq!(view.item_count, 2);
        assert_eq!(view.subtotal, "$159.98");
        assert!(view.checkout_enabled);
        assert_eq!(view.empty_message(), None);

        let item = &view.items[0];
        assert_eq!(item.price, "$79.99");
        assert_eq!(item.line_price, "$159.98");
        assert_eq!(item.image.as_deref(), Some("assets/img/SecondaryPic2.png"));
    }
}
