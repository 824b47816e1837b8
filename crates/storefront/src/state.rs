//! Application state shared across handlers.

use std::sync::Arc;

use crate::checkout::CheckoutSettings;
use crate::config::StorefrontConfig;
use crate::services::{Auth0Client, ShippingError, ShippoClient};
use crate::stripe::{StripeClient, StripeError, webhook::WebhookVerifier};

/// Error building the external service clients.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("stripe client: {0}")]
    Stripe(#[from] StripeError),
    #[error("shippo client: {0}")]
    Shippo(#[from] ShippingError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like API clients and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    stripe: StripeClient,
    auth0: Auth0Client,
    shippo: Option<ShippoClient>,
    webhook: WebhookVerifier,
    checkout: CheckoutSettings,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, StateError> {
        let stripe = StripeClient::new(&config.stripe)?;
        Self::with_stripe(config, stripe)
    }

    /// Create application state around an existing Stripe client.
    ///
    /// # Errors
    ///
    /// Returns an error if the Shippo client cannot be built.
    pub fn with_stripe(config: StorefrontConfig, stripe: StripeClient) -> Result<Self, StateError> {
        let auth0 = Auth0Client::new(&config.auth0);
        let shippo = config.shippo.as_ref().map(ShippoClient::new).transpose()?;
        let webhook = WebhookVerifier::new(config.stripe.webhook_secret.clone());
        let checkout = CheckoutSettings::from(&config);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                stripe,
                auth0,
                shippo,
                webhook,
                checkout,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the Stripe API client.
    #[must_use]
    pub fn stripe(&self) -> &StripeClient {
        &self.inner.stripe
    }

    /// Get a reference to the Auth0 client.
    #[must_use]
    pub fn auth0(&self) -> &Auth0Client {
        &self.inner.auth0
    }

    /// The Shippo client, when label purchase is configured.
    #[must_use]
    pub fn shippo(&self) -> Option<&ShippoClient> {
        self.inner.shippo.as_ref()
    }

    #[must_use]
    pub fn webhook(&self) -> &WebhookVerifier {
        &self.inner.webhook
    }

    #[must_use]
    pub fn checkout_settings(&self) -> &CheckoutSettings {
        &self.inner.checkout
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;

    #[test]
    fn test_state_from_config() {
        let state = AppState::new(test_config()).unwrap();

        assert!(state.shippo().is_none());
        assert!(!state.auth0().management_enabled());
        assert!(state.config().trust_proxy_headers);
        assert_eq!(
            state.checkout_settings().success_url,
            "https://simplevalleybar.com/success.html"
        );
        assert_eq!(
            state.checkout_settings().free_shipping_threshold_cents,
            7500
        );
    }
}
