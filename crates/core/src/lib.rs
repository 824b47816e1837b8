//! Simple Valley Core - Shared types and client-side cart state.
//!
//! This crate provides the types shared by every Simple Valley component:
//! - `storefront` - Checkout gateway, account API and payment webhooks
//! - `cli` - Headless cart client
//!
//! # Architecture
//!
//! The core crate contains types, traits and the cart state manager - no
//! network I/O and no HTTP clients. Persistence goes through the
//! [`cart::KeyValueStore`] trait so any client-local store can back the cart.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for processor identifiers, money and emails
//! - [`cart`] - Cart lines, totals, the cart manager and checkout wire types

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;

pub use types::*;
