//! The cart state manager.
//!
//! [`CartManager`] owns the authoritative client-side cart. It reads the
//! persisted cart once on load, writes the whole cart back after every
//! mutation, and runs every registered render handler so counts, the line
//! list, the subtotal and the checkout button stay in sync.
//!
//! # Example
//!
//! ```
//! use rust_decimal::Decimal;
//! use simple_valley_core::PriceId;
//! use simple_valley_core::cart::{CartLine, CartManager, MemoryStore};
//!
//! let mut manager = CartManager::load(MemoryStore::new());
//! manager.subscribe(|view| println!("{} items, {}", view.item_count, view.subtotal));
//!
//! let bar = CartLine::new(PriceId::parse("price_2box").unwrap(), "2 Boxes", Decimal::new(7999, 2));
//! manager.add_item(bar.clone()).unwrap();
//! manager.add_item(bar).unwrap();
//!
//! assert_eq!(manager.cart().len(), 1);
//! assert_eq!(manager.compute_totals().item_count, 2);
//! ```

use thiserror::Error;
use tracing::{debug, warn};

use super::line::{Cart, CartInvariantError, CartLine, CartTotals};
use super::store::{KeyValueStore, StoreError, keys};
use super::view::CartView;
use super::wire::CheckoutRequest;
use crate::types::{Email, PriceId};

/// Errors returned by cart mutations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The incoming line is invalid.
    #[error("invalid cart line: {0}")]
    InvalidLine(#[from] CartInvariantError),

    /// The cart changed in memory but could not be persisted.
    #[error("failed to persist cart: {0}")]
    Storage(#[from] StoreError),

    /// The cart could not be serialized.
    #[error("failed to serialize cart: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Outcome of [`CartManager::change_quantity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    /// The line now has this quantity.
    Updated(u32),
    /// The last unit was removed, and the line with it.
    Removed,
    /// Nothing changed (zero delta, already at a bound, or removal declined).
    Unchanged,
    /// No line has that ID.
    Missing,
}

type RenderHandler = Box<dyn FnMut(&CartView)>;
type RemovalConfirmation = Box<dyn Fn(&CartLine) -> bool>;

/// Owns the cart, its persistence and its render handlers.
pub struct CartManager<S: KeyValueStore> {
    store: S,
    cart: Cart,
    renderers: Vec<RenderHandler>,
    confirm_removal: Option<RemovalConfirmation>,
}

impl<S: KeyValueStore> std::fmt::Debug for CartManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartManager")
            .field("cart", &self.cart)
            .field("renderers", &self.renderers.len())
            .field("confirm_removal", &self.confirm_removal.is_some())
            .finish_non_exhaustive()
    }
}

impl<S: KeyValueStore> CartManager<S> {
    /// Restore the cart from the store.
    ///
    /// A missing or unreadable entry yields an empty cart. An entry that
    /// fails to parse, or holds any line without a valid price ID or with
    /// broken quantity/price/uniqueness invariants, is treated as corruption:
    /// the whole entry is discarded and the cart starts empty.
    pub fn load(mut store: S) -> Self {
        let cart = match store.get(keys::CART) {
            Ok(Some(raw)) => match serde_json::from_str::<Cart>(&raw) {
                Ok(cart) => cart,
                Err(e) => {
                    warn!(error = %e, "Discarding corrupt persisted cart");
                    if let Err(e) = store.remove(keys::CART) {
                        warn!(error = %e, "Failed to clear corrupt persisted cart");
                    }
                    Cart::new()
                }
            },
            Ok(None) => Cart::new(),
            Err(e) => {
                warn!(error = %e, "Persisted cart unavailable, starting empty");
                Cart::new()
            }
        };

        debug!(lines = cart.len(), "Cart loaded");

        Self {
            store,
            cart,
            renderers: Vec::new(),
            confirm_removal: None,
        }
    }

    /// Require confirmation before a line is removed.
    ///
    /// The handler sees the line about to go and returns `true` to proceed.
    #[must_use]
    pub fn with_removal_confirmation(
        mut self,
        confirm: impl Fn(&CartLine) -> bool + 'static,
    ) -> Self {
        self.confirm_removal = Some(Box::new(confirm));
        self
    }

    /// Register a render handler and run it once with the current view.
    pub fn subscribe(&mut self, mut handler: impl FnMut(&CartView) + 'static) {
        handler(&self.view());
        self.renderers.push(Box::new(handler));
    }

    /// The current cart.
    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    /// The backing store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Give back the backing store.
    #[must_use]
    pub fn into_store(self) -> S {
        self.store
    }

    /// Display data for the current cart.
    #[must_use]
    pub fn view(&self) -> CartView {
        CartView::from(&self.cart)
    }

    /// Item count and subtotal. Pure; callable any number of times.
    #[must_use]
    pub fn compute_totals(&self) -> CartTotals {
        self.cart.totals()
    }

    /// Add a line, incrementing the existing line with the same ID if any.
    ///
    /// Returns the line's resulting quantity.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidLine`] without touching the cart if the
    /// line is invalid, or [`CartError::Storage`] if persisting failed (the
    /// in-memory change is kept).
    pub fn add_item(&mut self, line: CartLine) -> Result<u32, CartError> {
        let quantity = self.cart.add(line)?;
        self.commit()?;
        Ok(quantity)
    }

    /// Remove the line with this ID. Missing IDs are a no-op.
    ///
    /// Returns whether a line was removed. A declined confirmation leaves
    /// the cart untouched and returns `false`.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Storage`] if persisting failed.
    pub fn remove_item(&mut self, id: &PriceId) -> Result<bool, CartError> {
        let Some(line) = self.cart.get(id) else {
            return Ok(false);
        };

        if !self.confirmed(line) {
            debug!(id = %id, "Removal declined");
            return Ok(false);
        }

        self.cart.remove(id);
        self.commit()?;
        Ok(true)
    }

    /// Adjust a line's quantity by `delta`.
    ///
    /// Quantities clamp at a floor of 1; decrementing a line that holds a
    /// single unit removes it (subject to confirmation).
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Storage`] if persisting failed.
    pub fn change_quantity(
        &mut self,
        id: &PriceId,
        delta: i32,
    ) -> Result<QuantityChange, CartError> {
        let Some(line) = self.cart.get(id) else {
            return Ok(QuantityChange::Missing);
        };

        let current = line.quantity;

        if delta < 0 && current == 1 {
            return Ok(if self.remove_item(id)? {
                QuantityChange::Removed
            } else {
                QuantityChange::Unchanged
            });
        }

        let target = current.saturating_add_signed(delta);
        let Some(updated) = self.cart.set_quantity(id, target) else {
            return Ok(QuantityChange::Missing);
        };

        if updated == current {
            return Ok(QuantityChange::Unchanged);
        }

        self.commit()?;
        Ok(QuantityChange::Updated(updated))
    }

    /// Empty the cart and drop the persisted entry.
    ///
    /// Called by the client once the hosted payment page reports success;
    /// the checkout gateway never clears carts.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Storage`] if the entry could not be removed.
    pub fn clear(&mut self) -> Result<(), CartError> {
        self.cart.clear();
        let result = self.store.remove(keys::CART);
        self.render();
        result.map_err(CartError::from)
    }

    /// Snapshot the cart for the checkout gateway.
    #[must_use]
    pub fn checkout_request(&self, user_email: Option<&Email>) -> CheckoutRequest {
        CheckoutRequest {
            cart: self.cart.lines().to_vec(),
            user_email: user_email.map(ToString::to_string),
        }
    }

    fn confirmed(&self, line: &CartLine) -> bool {
        self.confirm_removal
            .as_ref()
            .is_none_or(|confirm| confirm(line))
    }

    /// Persist the whole cart, then re-render regardless of the outcome.
    fn commit(&mut self) -> Result<(), CartError> {
        let result = match serde_json::to_string(&self.cart) {
            Ok(json) => self.store.set(keys::CART, &json).map_err(CartError::from),
            Err(e) => Err(CartError::from(e)),
        };

        if let Err(e) = &result {
            warn!(error = %e, "Cart change not persisted");
        }

        self.render();
        result
    }

    fn render(&mut self) {
        let view = CartView::from(&self.cart);
        for handler in &mut self.renderers {
            handler(&view);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use rust_decimal::Decimal;

    use super::*;
    use crate::cart::MemoryStore;

    fn id(s: &str) -> PriceId {
        PriceId::parse(s).unwrap()
    }

    fn line(s: &str, cents: i64) -> CartLine {
        CartLine::new(id(s), format!("Bar {s}"), Decimal::new(cents, 2))
    }

    fn persisted(manager: &CartManager<MemoryStore>) -> Option<Cart> {
        manager
            .store()
            .get(keys::CART)
            .unwrap()
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }

    /// Store whose writes always fail.
    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Backend("quota exceeded".to_string()))
        }

        fn remove(&mut self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn test_load_missing_is_empty() {
        let manager = CartManager::load(MemoryStore::new());
        assert!(manager.cart().is_empty());
    }

    #[test]
    fn test_add_twice_increments() {
        let mut manager = CartManager::load(MemoryStore::new());
        manager.add_item(line("A", 1000)).unwrap();
        manager.add_item(line("A", 1000)).unwrap();

        assert_eq!(manager.cart().len(), 1);
        assert_eq!(manager.cart().lines()[0].quantity, 2);
        assert_eq!(persisted(&manager).unwrap(), *manager.cart());
    }

    #[test]
    fn test_add_uses_incoming_quantity() {
        let mut manager = CartManager::load(MemoryStore::new());
        manager.add_item(line("A", 1000)).unwrap();
        let quantity = manager.add_item(line("A", 1000).with_quantity(3)).unwrap();
        assert_eq!(quantity, 4);
    }

    #[test]
    fn test_add_invalid_line_leaves_cart_untouched() {
        let mut manager = CartManager::load(MemoryStore::new());
        let result = manager.add_item(line("A", 1000).with_quantity(0));

        assert!(matches!(result, Err(CartError::InvalidLine(_))));
        assert!(manager.cart().is_empty());
        assert!(persisted(&manager).is_none());
    }

    #[test]
    fn test_remove_item() {
        let mut manager = CartManager::load(MemoryStore::new());
        manager.add_item(line("A", 1000)).unwrap();
        manager.add_item(line("B", 500)).unwrap();

        assert!(manager.remove_item(&id("A")).unwrap());
        assert!(!manager.remove_item(&id("A")).unwrap());
        assert_eq!(manager.cart().len(), 1);
        assert_eq!(persisted(&manager).unwrap().len(), 1);
    }

    #[test]
    fn test_change_quantity_increments_and_clamps() {
        let mut manager = CartManager::load(MemoryStore::new());
        manager.add_item(line("A", 1000).with_quantity(3)).unwrap();

        assert_eq!(
            manager.change_quantity(&id("A"), 2).unwrap(),
            QuantityChange::Updated(5)
        );
        assert_eq!(
            manager.change_quantity(&id("A"), -10).unwrap(),
            QuantityChange::Updated(1)
        );
        assert_eq!(
            manager.change_quantity(&id("A"), 0).unwrap(),
            QuantityChange::Unchanged
        );
        assert_eq!(
            manager.change_quantity(&id("Z"), 1).unwrap(),
            QuantityChange::Missing
        );
    }

    #[test]
    fn test_decrement_last_unit_removes_line() {
        let mut manager = CartManager::load(MemoryStore::new());
        manager.add_item(line("A", 1000)).unwrap();

        assert_eq!(
            manager.change_quantity(&id("A"), -1).unwrap(),
            QuantityChange::Removed
        );
        assert!(manager.cart().is_empty());
        assert_eq!(manager.compute_totals().item_count, 0);
    }

    #[test]
    fn test_removal_confirmation_declined() {
        let mut manager =
            CartManager::load(MemoryStore::new()).with_removal_confirmation(|_| false);
        manager.add_item(line("A", 1000)).unwrap();

        assert!(!manager.remove_item(&id("A")).unwrap());
        assert_eq!(
            manager.change_quantity(&id("A"), -1).unwrap(),
            QuantityChange::Unchanged
        );
        assert_eq!(manager.cart().len(), 1);
    }

    #[test]
    fn test_removal_confirmation_sees_line() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_in_handler = Rc::clone(&seen);
        let mut manager =
            CartManager::load(MemoryStore::new()).with_removal_confirmation(move |line| {
                seen_in_handler.borrow_mut().push(line.id.to_string());
                true
            });
        manager.add_item(line("A", 1000)).unwrap();

        assert!(manager.remove_item(&id("A")).unwrap());
        assert_eq!(*seen.borrow(), vec!["A".to_string()]);
    }

    #[test]
    fn test_no_duplicate_ids_across_sequence() {
        let mut manager = CartManager::load(MemoryStore::new());
        for step in 0..40_i32 {
            let key = ["A", "B", "C"][usize::try_from(step % 3).unwrap()];
            match step % 5 {
                0 | 1 => {
                    manager.add_item(line(key, 250)).unwrap();
                }
                2 => {
                    manager.change_quantity(&id(key), -1).unwrap();
                }
                3 => {
                    manager.change_quantity(&id(key), 2).unwrap();
                }
                _ => {
                    manager.remove_item(&id(key)).unwrap();
                }
            }
            assert!(manager.cart().validate().is_ok(), "step {step}");
        }
    }

    #[test]
    fn test_render_runs_on_subscribe_and_mutation() {
        let views = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&views);

        let mut manager = CartManager::load(MemoryStore::new());
        manager.subscribe(move |view| sink.borrow_mut().push(view.clone()));
        manager.add_item(line("A", 1000)).unwrap();
        manager.remove_item(&id("A")).unwrap();

        let views = views.borrow();
        assert_eq!(views.len(), 3);
        assert!(!views[0].checkout_enabled);
        assert_eq!(views[1].item_count, 1);
        assert_eq!(views[1].subtotal, "$10.00");
        assert!(views[1].checkout_enabled);
        assert!(!views[2].checkout_enabled);
    }

    #[test]
    fn test_load_restores_persisted_cart() {
        let mut manager = CartManager::load(MemoryStore::new());
        manager.add_item(line("A", 1000).with_quantity(2)).unwrap();
        let store = manager.into_store();

        let restored = CartManager::load(store);
        assert_eq!(restored.compute_totals().item_count, 2);
    }

    #[test]
    fn test_load_unparseable_resets() {
        let store = MemoryStore::with_entry(keys::CART, "{not json");
        let manager = CartManager::load(store);

        assert!(manager.cart().is_empty());
        assert!(!manager.store().contains(keys::CART));
    }

    #[test]
    fn test_load_missing_price_id_resets_whole_cart() {
        let raw = r#"[
            {"id":"price_ok","title":"Good","price":10.0,"qty":1},
            {"title":"Stale","price":5.0,"qty":1}
        ]"#;
        let manager = CartManager::load(MemoryStore::with_entry(keys::CART, raw));

        assert!(manager.cart().is_empty());
        assert!(!manager.store().contains(keys::CART));
    }

    #[test]
    fn test_load_invalid_price_id_resets_whole_cart() {
        let raw = r#"[
            {"id":"price_ok","title":"Good","price":10.0,"qty":1},
            {"id":"","title":"Stale","price":5.0,"qty":1}
        ]"#;
        let manager = CartManager::load(MemoryStore::with_entry(keys::CART, raw));
        assert!(manager.cart().is_empty());
    }

    #[test]
    fn test_load_duplicate_lines_resets() {
        let raw = r#"[
            {"id":"A","title":"Bar","price":10.0,"qty":1},
            {"id":"A","title":"Bar","price":10.0,"qty":1}
        ]"#;
        let manager = CartManager::load(MemoryStore::with_entry(keys::CART, raw));
        assert!(manager.cart().is_empty());
    }

    #[test]
    fn test_storage_failure_keeps_memory_and_renders() {
        let renders = Rc::new(RefCell::new(0_u32));
        let counter = Rc::clone(&renders);

        let mut manager = CartManager::load(ReadOnlyStore);
        manager.subscribe(move |_| *counter.borrow_mut() += 1);
        let result = manager.add_item(line("A", 1000));

        assert!(matches!(result, Err(CartError::Storage(_))));
        assert_eq!(manager.cart().len(), 1);
        assert_eq!(*renders.borrow(), 2);
    }

    #[test]
    fn test_clear_drops_entry() {
        let mut manager = CartManager::load(MemoryStore::new());
        manager.add_item(line("A", 1000)).unwrap();
        manager.clear().unwrap();

        assert!(manager.cart().is_empty());
        assert!(!manager.store().contains(keys::CART));
    }

    #[test]
    fn test_checkout_request_snapshot() {
        let mut manager = CartManager::load(MemoryStore::new());
        manager.add_item(line("A", 1000)).unwrap();
        let email = Email::parse("shopper@example.com").unwrap();

        let request = manager.checkout_request(Some(&email));
        assert_eq!(request.cart.len(), 1);
        assert_eq!(request.user_email.as_deref(), Some("shopper@example.com"));
    }
}
