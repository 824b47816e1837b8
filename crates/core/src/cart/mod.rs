//! Client-side shopping cart.
//!
//! - [`Cart`] and [`CartLine`]: the cart model and its invariants
//! - [`CartManager`]: load, mutate, persist and re-render
//! - [`KeyValueStore`]: where carts and flags live between page loads
//! - [`SiteFlags`]: promo dialog and floating call-to-action flags
//! - [`CheckoutRequest`]: the body sent to the checkout gateway

mod flags;
mod line;
mod manager;
pub mod store;
mod view;
mod wire;

pub use flags::SiteFlags;
pub use line::{
    Cart, CartInvariantError, CartLine, CartTotals, MAX_LINE_QUANTITY, MAX_UNIT_PRICE,
};
pub use manager::{CartError, CartManager, QuantityChange};
pub use store::{KeyValueStore, MemoryStore, StoreError, keys};
pub use view::{CartItemView, CartView};
pub use wire::{CheckoutRequest, CheckoutResponse, ErrorResponse};
