//! Simple Valley storefront library.
//!
//! Checkout gateway, account API and payment webhook, provided as a library
//! so the binary stays thin and the handlers can be tested in-process.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod checkout;
pub mod config;
pub mod error;
pub mod fulfillment;
pub mod middleware;
pub mod orders;
pub mod routes;
pub mod services;
pub mod state;
pub mod stripe;

use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;

use state::AppState;

/// Build the full application router.
///
/// Static files, when configured, are served as the fallback so the API
/// routes always win.
#[must_use]
pub fn app(state: AppState) -> Router {
    let static_dir = state.config().static_dir.clone();
    let trust_proxy_headers = state.config().trust_proxy_headers;

    let router = Router::new()
        .route("/health", get(health))
        .nest("/api", routes::routes(trust_proxy_headers))
        .layer(axum::middleware::from_fn(
            middleware::request_id_middleware,
        ))
        .layer(CorsLayer::permissive());

    let router = match static_dir {
        Some(dir) => router.fallback_service(tower_http::services::ServeDir::new(dir)),
        None => router,
    };

    router.with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}
