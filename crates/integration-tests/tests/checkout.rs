//! Integration tests for the checkout gateway.
//!
//! These tests require:
//! - The storefront server running (cargo run -p simple-valley-storefront)
//! - Stripe test-mode credentials and `TEST_PRICE_ID` in environment
//!
//! Run with: cargo test -p simple-valley-integration-tests -- --ignored

use reqwest::StatusCode;
use serde_json::{Value, json};
use simple_valley_core::cart::{CheckoutRequest, CheckoutResponse, ErrorResponse};
use simple_valley_integration_tests::{client, storefront_url, test_line};

fn checkout_url() -> String {
    format!("{}/api/checkout-session", storefront_url())
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_health() {
    let resp = client()
        .get(format!("{}/health", storefront_url()))
        .send()
        .await
        .expect("Failed to reach storefront");

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.expect("Failed to read body"), "ok");
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_empty_cart_rejected() {
    let resp = client()
        .post(checkout_url())
        .json(&json!({ "cart": [], "userEmail": null }))
        .send()
        .await
        .expect("Failed to post checkout");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = resp.json().await.expect("Error body is JSON");
    assert_eq!(body.error, "Cart cannot be empty.");
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_malformed_line_rejected() {
    let resp = client()
        .post(checkout_url())
        .json(&json!({ "cart": [{ "id": "", "title": "Bar", "price": 10.0, "qty": 1 }] }))
        .send()
        .await
        .expect("Failed to post checkout");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.expect("Error body is JSON");
    assert!(body["error"].is_string());
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_invalid_token_rejected() {
    let request = CheckoutRequest {
        cart: vec![test_line(1)],
        user_email: None,
    };

    let resp = client()
        .post(checkout_url())
        .bearer_auth("not-a-real-token")
        .json(&request)
        .send()
        .await
        .expect("Failed to post checkout");

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Session Creation
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server and Stripe test credentials"]
async fn test_guest_checkout_returns_url() {
    let request = CheckoutRequest {
        cart: vec![test_line(2)],
        user_email: Some("integration@example.com".to_string()),
    };

    let resp = client()
        .post(checkout_url())
        .json(&request)
        .send()
        .await
        .expect("Failed to post checkout");

    assert_eq!(resp.status(), StatusCode::OK);
    let body: CheckoutResponse = resp.json().await.expect("Checkout body is JSON");
    assert!(body.url.starts_with("https://checkout.stripe.com/"));
}
