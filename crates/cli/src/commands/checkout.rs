//! Checkout command.
//!
//! Posts the stored cart to a running gateway and prints the payment page
//! URL. The cart is left untouched; clear it once the payment completes.
//!
//! # Usage
//!
//! ```bash
//! sv-cli checkout --gateway http://localhost:3000 --email shopper@example.com
//! ```

use secrecy::{ExposeSecret, SecretString};
use simple_valley_core::Email;
use simple_valley_core::cart::{CartManager, CheckoutResponse, ErrorResponse, KeyValueStore};
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from the checkout command.
#[derive(Debug, Error)]
pub enum CheckoutCommandError {
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Cart is empty; nothing to check out")]
    EmptyCart,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway returned {status}: {message}")]
    Gateway { status: u16, message: String },
}

/// Options for one checkout attempt.
#[derive(Debug)]
pub struct CheckoutOptions {
    /// Gateway base URL, e.g. `http://localhost:3000`
    pub gateway: String,
    pub email: Option<String>,
    /// Auth0 access token for a signed-in shopper
    pub token: Option<SecretString>,
}

/// The checkout endpoint under a gateway base URL.
#[must_use]
pub fn endpoint(gateway: &str) -> String {
    format!("{}/api/checkout-session", gateway.trim_end_matches('/'))
}

/// Submit the cart and return the payment page URL.
///
/// # Errors
///
/// Returns an error if the email is malformed, the cart is empty, or the
/// gateway rejects the request.
#[instrument(skip_all, fields(gateway = %options.gateway))]
pub async fn run<S: KeyValueStore>(
    manager: &CartManager<S>,
    options: CheckoutOptions,
) -> Result<String, CheckoutCommandError> {
    let email = options
        .email
        .as_deref()
        .map(|e| Email::parse(e).map_err(|_| CheckoutCommandError::InvalidEmail(e.to_owned())))
        .transpose()?;

    if manager.cart().is_empty() {
        return Err(CheckoutCommandError::EmptyCart);
    }

    let body = manager.checkout_request(email.as_ref());
    debug!(lines = body.cart.len(), "Submitting cart");

    let mut request = reqwest::Client::new()
        .post(endpoint(&options.gateway))
        .json(&body);
    if let Some(token) = &options.token {
        request = request.bearer_auth(token.expose_secret());
    }

    let response = request.send().await?;
    let status = response.status();

    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&text).map_or(text, |e| e.error);
        return Err(CheckoutCommandError::Gateway {
            status: status.as_u16(),
            message,
        });
    }

    let CheckoutResponse { url } = response.json().await?;
    Ok(url)
}
