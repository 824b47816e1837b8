//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers return `Result<T, AppError>`.
//! Every error body has the shape `{"error": "..."}`; provider payloads are
//! logged, never returned.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use simple_valley_core::cart::ErrorResponse;

use crate::checkout::CheckoutError;
use crate::services::IdentityError;
use crate::stripe::StripeError;

/// Shown when required server configuration is missing.
pub const MISCONFIGURED_MESSAGE: &str = "Server misconfigured.";

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Checkout attempt failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Stripe API operation failed.
    #[error("Stripe error: {0}")]
    Stripe(#[from] StripeError),

    /// Auth0 operation failed.
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    /// A feature's configuration is missing.
    #[error("Misconfigured: {0}")]
    Misconfigured(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Checkout(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Checkout(_) | Self::Stripe(_) => StatusCode::BAD_GATEWAY,
            Self::Identity(IdentityError::InvalidToken) | Self::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Identity(IdentityError::NotConfigured) | Self::Misconfigured(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Identity(_) => StatusCode::BAD_GATEWAY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    // Don't expose internal error details to clients
    fn public_message(&self) -> String {
        match self {
            Self::Checkout(CheckoutError::EmptyCart) => CheckoutError::EmptyCart.to_string(),
            Self::Checkout(CheckoutError::InvalidCart(_)) => "Cart is invalid.".to_string(),
            Self::Checkout(CheckoutError::Subtotal(_)) => "Cart total is out of range.".to_string(),
            Self::Checkout(_) | Self::Stripe(_) => "Payment service error.".to_string(),
            Self::Identity(IdentityError::InvalidToken) => {
                "Invalid or expired session.".to_string()
            }
            Self::Identity(IdentityError::NotConfigured) | Self::Misconfigured(_) => {
                MISCONFIGURED_MESSAGE.to_string()
            }
            Self::Identity(_) => "Account service error.".to_string(),
            Self::Unauthorized(msg) | Self::BadRequest(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(ErrorResponse::new(self.public_message()))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for a verified identity.
pub fn set_sentry_user(user_id: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Checkout requested", Some(&[("lines", "2")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::EmptyCart)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Stripe(StripeError::RateLimited)),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::Identity(IdentityError::InvalidToken)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Identity(IdentityError::NotConfigured)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Misconfigured("AUTH0_M2M_CLIENT_ID".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_public_messages_hide_details() {
        let err = AppError::Stripe(StripeError::Api {
            status: 400,
            message: "invalid_request_error: No such price: 'price_secret'".to_string(),
        });
        assert_eq!(err.public_message(), "Payment service error.");

        assert_eq!(
            AppError::Misconfigured("STRIPE_SECRET_KEY".to_string()).public_message(),
            MISCONFIGURED_MESSAGE
        );
        assert_eq!(
            AppError::Checkout(CheckoutError::EmptyCart).public_message(),
            "Cart cannot be empty."
        );
    }

    #[tokio::test]
    async fn test_error_body_is_json() {
        let response = AppError::Checkout(CheckoutError::EmptyCart).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.ok();
        let body: Option<serde_json::Value> =
            bytes.and_then(|b| serde_json::from_slice(&b).ok());

        assert_eq!(
            body,
            Some(serde_json::json!({ "error": "Cart cannot be empty." }))
        );
    }
}
