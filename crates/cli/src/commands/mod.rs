//! CLI command implementations.
//!
//! Commands return the text to print; `main` does the printing.

pub mod cart;
pub mod checkout;
pub mod promo;
pub mod store;
