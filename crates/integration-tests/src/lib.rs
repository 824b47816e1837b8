//! Integration tests for Simple Valley.
//!
//! These run against a live storefront server and are `#[ignore]`d by
//! default.
//!
//! # Running Tests
//!
//! ```bash
//! # Start the storefront (Stripe test keys in .env)
//! cargo run -p simple-valley-storefront
//!
//! # Run integration tests
//! cargo test -p simple-valley-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_URL` - Server under test (default `http://localhost:3000`)
//! - `TEST_PRICE_ID` - A Stripe test-mode price ID
//! - `STRIPE_WEBHOOK_SECRET` - The server's webhook signing secret

use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sha2::Sha256;
use simple_valley_core::PriceId;
use simple_valley_core::cart::CartLine;

/// Base URL of the storefront under test.
#[must_use]
pub fn storefront_url() -> String {
    std::env::var("STOREFRONT_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// HTTP client for tests.
///
/// Sends a fixed `X-Forwarded-For` so the rate limiter has a key even when
/// the server runs without connect info.
///
/// # Panics
///
/// Panics if the client cannot be built.
#[must_use]
#[allow(clippy::expect_used)]
pub fn client() -> reqwest::Client {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        "x-forwarded-for",
        reqwest::header::HeaderValue::from_static("127.0.0.1"),
    );

    reqwest::Client::builder()
        .default_headers(headers)
        .build()
        .expect("Failed to create HTTP client")
}

/// A cart line for the configured test price.
///
/// # Panics
///
/// Panics if `TEST_PRICE_ID` is not a valid price ID.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_line(quantity: u32) -> CartLine {
    let id = std::env::var("TEST_PRICE_ID").unwrap_or_else(|_| "price_test".to_string());
    CartLine::new(
        PriceId::parse(&id).expect("TEST_PRICE_ID must be a price ID"),
        "The Simple Valley Bar - 1 Box",
        Decimal::new(3999, 2),
    )
    .with_quantity(quantity)
}

/// Build a `Stripe-Signature` header for a payload signed now.
///
/// # Panics
///
/// Panics if the secret cannot key an HMAC (never for HMAC-SHA256).
#[must_use]
#[allow(clippy::expect_used)]
pub fn stripe_signature(secret: &str, payload: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp();
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    )
}
