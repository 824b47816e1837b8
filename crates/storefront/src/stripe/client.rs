//! Stripe REST API client.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use simple_valley_core::{CustomerId, Email};

use super::types::{ApiErrorBody, CheckoutSession, Customer, List, NewCheckoutSession};
use super::{PaymentProcessor, StripeError};
use crate::config::StripeConfig;

/// Stripe API base URL.
const BASE_URL: &str = "https://api.stripe.com/v1";

/// Most sessions a single order-history request returns.
const SESSION_PAGE_SIZE: u8 = 100;

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    base_url: String,
}

impl StripeClient {
    /// Create a new Stripe API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, StripeError> {
        Self::with_base_url(config, BASE_URL)
    }

    /// Create a client against a different API host (e.g., stripe-mock).
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn with_base_url(config: &StripeConfig, base_url: &str) -> Result<Self, StripeError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        let mut auth_header = HeaderValue::from_str(&auth_value)
            .map_err(|e| StripeError::Parse(format!("Invalid API key format: {e}")))?;
        auth_header.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_header);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Check the status and decode the body.
    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, StripeError> {
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(StripeError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body).map_or(body, |parsed| {
                let kind = parsed.error.error_type.unwrap_or_default();
                let message = parsed.error.message.unwrap_or_default();
                format!("{kind}: {message}")
            });
            warn!(status = status.as_u16(), %message, "Stripe API error");
            return Err(StripeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| StripeError::Parse(e.to_string()))
    }
}

impl PaymentProcessor for StripeClient {
    #[instrument(skip(self, email))]
    async fn find_customer_by_email(&self, email: &Email) -> Result<Option<Customer>, StripeError> {
        let url = format!(
            "{}/customers?email={}&limit=1",
            self.base_url,
            urlencoding::encode(email.as_str())
        );

        let response = self.client.get(&url).send().await?;
        let customers: List<Customer> = Self::handle_response(response).await?;

        let customer = customers.data.into_iter().next();
        debug!(found = customer.is_some(), "Customer lookup complete");
        Ok(customer)
    }

    #[instrument(skip(self, email))]
    async fn create_customer(&self, email: &Email) -> Result<Customer, StripeError> {
        let url = format!("{}/customers", self.base_url);

        let response = self
            .client
            .post(&url)
            .form(&[("email", email.as_str())])
            .send()
            .await?;
        let customer: Customer = Self::handle_response(response).await?;

        debug!(customer_id = %customer.id, "Customer created");
        Ok(customer)
    }

    #[instrument(skip(self, params), fields(lines = params.line_items.len()))]
    async fn create_checkout_session(
        &self,
        params: &NewCheckoutSession,
    ) -> Result<CheckoutSession, StripeError> {
        let url = format!("{}/checkout/sessions", self.base_url);

        let response = self
            .client
            .post(&url)
            .form(&params.to_form())
            .send()
            .await?;
        let session: CheckoutSession = Self::handle_response(response).await?;

        debug!(session_id = %session.id, "Checkout session created");
        Ok(session)
    }

    #[instrument(skip(self), fields(customer_id = %customer))]
    async fn list_checkout_sessions(
        &self,
        customer: &CustomerId,
    ) -> Result<Vec<CheckoutSession>, StripeError> {
        let url = format!(
            "{}/checkout/sessions?customer={}&limit={SESSION_PAGE_SIZE}&expand[]=data.line_items",
            self.base_url,
            urlencoding::encode(customer.as_str())
        );

        let response = self.client.get(&url).send().await?;
        let sessions: List<CheckoutSession> = Self::handle_response(response).await?;

        if sessions.has_more {
            debug!("More sessions exist beyond the first page");
        }

        Ok(sessions.data)
    }
}
