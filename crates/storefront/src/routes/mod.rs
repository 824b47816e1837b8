//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                    - Health check
//!
//! # Checkout
//! POST   /api/checkout-session      - Create a hosted checkout session
//!
//! # Account (requires a verified bearer token)
//! GET    /api/account/orders        - Completed orders
//! POST   /api/account/email         - Change email
//! POST   /api/account/password-reset - Create a password change ticket
//! DELETE /api/account               - Delete the account
//!
//! # Webhooks
//! POST   /api/webhooks/stripe       - Signed payment events
//! ```

pub mod account;
pub mod checkout;
pub mod webhooks;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::middleware::{api_rate_limiter, checkout_rate_limiter};
use crate::state::AppState;

/// Create the checkout routes router.
pub fn checkout_routes(trust_proxy_headers: bool) -> Router<AppState> {
    Router::new()
        .route("/checkout-session", post(checkout::create_session))
        .layer(checkout_rate_limiter(trust_proxy_headers))
}

/// Create the account routes router.
pub fn account_routes(trust_proxy_headers: bool) -> Router<AppState> {
    Router::new()
        .route("/", delete(account::delete_account))
        .route("/orders", get(account::orders))
        .route("/email", post(account::update_email))
        .route("/password-reset", post(account::password_reset))
        .layer(api_rate_limiter(trust_proxy_headers))
}

/// Create the webhook routes router.
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/stripe", post(webhooks::stripe))
}

/// Create all API routes for the storefront.
///
/// `trust_proxy_headers` selects how rate limits key clients, see
/// [`crate::middleware::rate_limit::ClientIpKeyExtractor`].
pub fn routes(trust_proxy_headers: bool) -> Router<AppState> {
    Router::new()
        .merge(checkout_routes(trust_proxy_headers))
        .nest("/account", account_routes(trust_proxy_headers))
        .nest("/webhooks", webhook_routes())
}
