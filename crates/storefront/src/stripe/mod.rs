//! Stripe payment processor integration.
//!
//! # Architecture
//!
//! - Direct REST calls with form-encoded bodies, no SDK
//! - Stripe is the only durable store: customers and paid sessions live there
//! - [`PaymentProcessor`] is the seam the checkout gateway and order history
//!   depend on; [`StripeClient`] is the production implementation
//!
//! # Example
//!
//! ```rust,ignore
//! use simple_valley_storefront::stripe::{PaymentProcessor, StripeClient};
//!
//! let client = StripeClient::new(&config.stripe)?;
//! let customer = client.find_customer_by_email(&email).await?;
//! ```

mod client;
pub mod types;
pub mod webhook;

use std::future::Future;

pub use client::StripeClient;
pub use types::*;

use simple_valley_core::{CustomerId, Email};
use thiserror::Error;

/// Errors that can occur when interacting with the Stripe API.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited by Stripe.
    #[error("Rate limited")]
    RateLimited,

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Operations the storefront needs from a payment processor.
pub trait PaymentProcessor: Send + Sync {
    /// Find the first customer with this exact email.
    fn find_customer_by_email(
        &self,
        email: &Email,
    ) -> impl Future<Output = Result<Option<Customer>, StripeError>> + Send;

    /// Create a customer with this email.
    fn create_customer(
        &self,
        email: &Email,
    ) -> impl Future<Output = Result<Customer, StripeError>> + Send;

    /// Create a hosted checkout session.
    fn create_checkout_session(
        &self,
        params: &NewCheckoutSession,
    ) -> impl Future<Output = Result<CheckoutSession, StripeError>> + Send;

    /// List a customer's checkout sessions, newest first, with line items expanded.
    fn list_checkout_sessions(
        &self,
        customer: &CustomerId,
    ) -> impl Future<Output = Result<Vec<CheckoutSession>, StripeError>> + Send;
}
