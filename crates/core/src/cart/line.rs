//! Cart lines, the cart collection and derived totals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{MoneyError, PriceId, to_cents};

/// Largest quantity a single line may hold. Increments saturate here.
pub const MAX_LINE_QUANTITY: u32 = 999;

/// Largest accepted unit price in major units.
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(99_999_999, 0, 0, false, 2);

/// A cart line that breaks one of the cart invariants.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CartInvariantError {
    #[error("line {0} has a zero quantity")]
    ZeroQuantity(PriceId),
    #[error("line {0} exceeds the maximum quantity")]
    QuantityTooLarge(PriceId),
    #[error("line {0} has a negative price")]
    NegativePrice(PriceId),
    #[error("line {0} exceeds the maximum unit price")]
    PriceTooLarge(PriceId),
    #[error("line {0} appears more than once")]
    DuplicateLine(PriceId),
}

/// One distinct priced product variant and its quantity.
///
/// The serialized field names match what the storefront scripts have always
/// written to local storage (`price`, `qty`, `image`), so carts persisted by
/// earlier releases still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Processor price identifier, unique within a cart.
    pub id: PriceId,
    /// Display title.
    pub title: String,
    /// Price of one unit in major units (dollars).
    #[serde(rename = "price")]
    pub unit_price: Decimal,
    /// Number of units, at least 1.
    #[serde(rename = "qty", alias = "quantity")]
    pub quantity: u32,
    /// Display-only image reference.
    #[serde(rename = "image", default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
}

impl CartLine {
    /// Create a line with a quantity of 1.
    #[must_use]
    pub fn new(id: PriceId, title: impl Into<String>, unit_price: Decimal) -> Self {
        Self {
            id,
            title: title.into(),
            unit_price,
            quantity: 1,
            image_ref: None,
        }
    }

    /// Set the quantity.
    #[must_use]
    pub const fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    /// Set the image reference.
    #[must_use]
    pub fn with_image(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    /// Check quantity and price bounds for this line.
    ///
    /// # Errors
    ///
    /// Returns the first invariant the line breaks.
    pub fn validate(&self) -> Result<(), CartInvariantError> {
        if self.quantity == 0 {
            return Err(CartInvariantError::ZeroQuantity(self.id.clone()));
        }
        if self.quantity > MAX_LINE_QUANTITY {
            return Err(CartInvariantError::QuantityTooLarge(self.id.clone()));
        }
        if self.unit_price.is_sign_negative() && !self.unit_price.is_zero() {
            return Err(CartInvariantError::NegativePrice(self.id.clone()));
        }
        if self.unit_price > MAX_UNIT_PRICE {
            return Err(CartInvariantError::PriceTooLarge(self.id.clone()));
        }
        Ok(())
    }
}

/// Derived cart totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CartTotals {
    /// Sum of line quantities.
    pub item_count: u64,
    /// Sum of unit price times quantity, in major units.
    pub subtotal: Decimal,
}

impl CartTotals {
    /// Subtotal in cents.
    ///
    /// # Errors
    ///
    /// Returns an error if the subtotal does not fit in an `i64` of cents.
    pub fn subtotal_cents(&self) -> Result<i64, MoneyError> {
        to_cents(self.subtotal)
    }
}

/// Ordered collection of cart lines with at most one line per price ID.
///
/// Order matters for display only. Deserializing validates every line and
/// rejects duplicate IDs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CartLine>", into = "Vec<CartLine>")]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// The lines in display order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Look up a line by price ID.
    #[must_use]
    pub fn get(&self, id: &PriceId) -> Option<&CartLine> {
        self.lines.iter().find(|line| &line.id == id)
    }

    /// Compute item count and subtotal. Never mutates the cart.
    #[must_use]
    pub fn totals(&self) -> CartTotals {
        self.lines
            .iter()
            .fold(CartTotals::default(), |totals, line| CartTotals {
                item_count: totals.item_count + u64::from(line.quantity),
                subtotal: totals.subtotal + line.line_total(),
            })
    }

    /// Merge a line into the cart and return the resulting quantity.
    ///
    /// An existing line with the same ID has its quantity increased,
    /// saturating at [`MAX_LINE_QUANTITY`]; otherwise the line is appended.
    /// The existing line keeps its title, price and image.
    ///
    /// # Errors
    ///
    /// Returns an error if the incoming line itself is invalid.
    pub fn add(&mut self, line: CartLine) -> Result<u32, CartInvariantError> {
        line.validate()?;

        if let Some(existing) = self.lines.iter_mut().find(|l| l.id == line.id) {
            existing.quantity = existing
                .quantity
                .saturating_add(line.quantity)
                .min(MAX_LINE_QUANTITY);
            return Ok(existing.quantity);
        }

        let quantity = line.quantity;
        self.lines.push(line);
        Ok(quantity)
    }

    /// Remove the line with the given ID, returning it if present.
    pub fn remove(&mut self, id: &PriceId) -> Option<CartLine> {
        let index = self.lines.iter().position(|line| &line.id == id)?;
        Some(self.lines.remove(index))
    }

    /// Set the quantity of an existing line, clamped to `1..=MAX_LINE_QUANTITY`.
    ///
    /// Returns the stored quantity, or `None` if the line is missing.
    pub fn set_quantity(&mut self, id: &PriceId, quantity: u32) -> Option<u32> {
        let line = self.lines.iter_mut().find(|line| &line.id == id)?;
        line.quantity = quantity.clamp(1, MAX_LINE_QUANTITY);
        Some(line.quantity)
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Check every line and the unique-ID invariant.
    ///
    /// # Errors
    ///
    /// Returns the first broken invariant.
    pub fn validate(&self) -> Result<(), CartInvariantError> {
        for (index, line) in self.lines.iter().enumerate() {
            line.validate()?;
            if self
                .lines
                .iter()
                .skip(index + 1)
                .any(|other| other.id == line.id)
            {
                return Err(CartInvariantError::DuplicateLine(line.id.clone()));
            }
        }
        Ok(())
    }
}

impl TryFrom<Vec<CartLine>> for Cart {
    type Error = CartInvariantError;

    fn try_from(lines: Vec<CartLine>) -> Result<Self, Self::Error> {
        let cart = Self { lines };
        cart.validate()?;
        Ok(cart)
    }
}

impl From<Cart> for Vec<CartLine> {
    fn from(cart: Cart) -> Self {
        cart.lines
    }
}
