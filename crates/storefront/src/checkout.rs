//! Checkout gateway: cart snapshot in, hosted payment page URL out.
//!
//! Each attempt walks a fixed sequence of stages:
//!
//! ```text
//! Idle -> Validating -> ResolvingCustomer -> ComputingShipping
//!      -> CreatingSession -> Redirecting
//! ```
//!
//! Any stage may end in `Failed`. The current stage is recorded on the
//! tracing span so a failure log says how far the attempt got. The gateway
//! never clears the cart and never retries; the shopper can simply submit
//! again.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use tracing::{Span, debug, field, info, instrument, warn};

use simple_valley_core::cart::{Cart, CartInvariantError, CartLine};
use simple_valley_core::{CheckoutSessionId, Email, MoneyError, ShippingRateId};

use crate::config::StorefrontConfig;
use crate::stripe::{NewCheckoutSession, PaymentProcessor, SessionCustomer, StripeError};

/// Metadata tag identifying sessions created by this storefront.
pub const SESSION_SOURCE: &str = "simple-valley";

/// Where a checkout attempt is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutStage {
    Idle,
    Validating,
    ResolvingCustomer,
    ComputingShipping,
    CreatingSession,
    Redirecting,
    Failed,
}

impl CheckoutStage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::ResolvingCustomer => "resolving_customer",
            Self::ComputingShipping => "computing_shipping",
            Self::CreatingSession => "creating_session",
            Self::Redirecting => "redirecting",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CheckoutStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that end a checkout attempt.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Cart cannot be empty.")]
    EmptyCart,

    #[error("Invalid cart: {0}")]
    InvalidCart(#[from] CartInvariantError),

    #[error("Cart subtotal out of range: {0}")]
    Subtotal(#[from] MoneyError),

    #[error("Payment processor error while {stage}: {source}")]
    Processor {
        stage: CheckoutStage,
        #[source]
        source: StripeError,
    },

    #[error("Checkout session {0} has no URL")]
    MissingUrl(CheckoutSessionId),
}

impl CheckoutError {
    /// Whether the request itself was at fault.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyCart | Self::InvalidCart(_) | Self::Subtotal(_)
        )
    }
}

/// Who is checking out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shopper {
    /// Email confirmed by the identity provider; eligible for customer get-or-create.
    Verified(Email),
    /// Email typed or remembered by the client; only prefills the payment page.
    Unverified(Email),
    Guest,
}

/// Checkout parameters that do not change between requests.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub standard_shipping_rate: ShippingRateId,
    pub free_shipping_rate: ShippingRateId,
    pub free_shipping_threshold_cents: i64,
    pub allowed_countries: Vec<String>,
    pub success_url: String,
    pub cancel_url: String,
}

impl From<&StorefrontConfig> for CheckoutSettings {
    fn from(config: &StorefrontConfig) -> Self {
        Self {
            standard_shipping_rate: config.stripe.standard_shipping_rate.clone(),
            free_shipping_rate: config.stripe.free_shipping_rate.clone(),
            free_shipping_threshold_cents: config.stripe.free_shipping_threshold_cents,
            allowed_countries: config.stripe.allowed_countries.clone(),
            success_url: config.success_url(),
            cancel_url: config.cancel_url(),
        }
    }
}

/// Choose the shipping rate for a subtotal: free at or above the threshold.
#[must_use]
pub fn select_shipping_rate(subtotal_cents: i64, settings: &CheckoutSettings) -> &ShippingRateId {
    if subtotal_cents >= settings.free_shipping_threshold_cents {
        &settings.free_shipping_rate
    } else {
        &settings.standard_shipping_rate
    }
}

/// A successful attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutOutcome {
    pub session_id: CheckoutSessionId,
    pub url: String,
}

/// Drives one checkout attempt through its stages.
pub struct CheckoutGateway<'a, P> {
    processor: &'a P,
    settings: &'a CheckoutSettings,
    stage: CheckoutStage,
}

impl<'a, P: PaymentProcessor> CheckoutGateway<'a, P> {
    #[must_use]
    pub const fn new(processor: &'a P, settings: &'a CheckoutSettings) -> Self {
        Self {
            processor,
            settings,
            stage: CheckoutStage::Idle,
        }
    }

    /// The stage the attempt reached.
    #[must_use]
    pub const fn stage(&self) -> CheckoutStage {
        self.stage
    }

    /// Turn a cart snapshot into a hosted checkout session.
    ///
    /// # Errors
    ///
    /// Returns `EmptyCart` or `InvalidCart` before any processor call,
    /// `Processor` if the processor rejects a call, or `MissingUrl` if the
    /// created session has no payment page.
    #[instrument(
        skip_all,
        fields(lines = lines.len(), stage = field::Empty, session_id = field::Empty)
    )]
    pub async fn create_session(
        &mut self,
        lines: Vec<CartLine>,
        shopper: Shopper,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let result = self.run(lines, shopper).await;

        if let Err(e) = &result {
            let failed_at = self.stage;
            self.enter(CheckoutStage::Failed);
            if e.is_client_error() {
                debug!(stage = %failed_at, error = %e, "Checkout rejected");
            } else {
                warn!(stage = %failed_at, error = %e, "Checkout failed");
            }
        }

        result
    }

    async fn run(
        &mut self,
        lines: Vec<CartLine>,
        shopper: Shopper,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        self.enter(CheckoutStage::Validating);
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let cart = Cart::try_from(lines)?;
        let subtotal_cents = cart.totals().subtotal_cents()?;

        self.enter(CheckoutStage::ResolvingCustomer);
        let customer = self.resolve_customer(shopper).await?;

        self.enter(CheckoutStage::ComputingShipping);
        let shipping_rate = select_shipping_rate(subtotal_cents, self.settings).clone();
        debug!(subtotal_cents, %shipping_rate, "Shipping rate selected");

        self.enter(CheckoutStage::CreatingSession);
        let params = NewCheckoutSession {
            line_items: cart
                .lines()
                .iter()
                .map(|line| (line.id.clone(), line.quantity))
                .collect(),
            shipping_rate,
            customer,
            allowed_countries: self.settings.allowed_countries.clone(),
            success_url: self.settings.success_url.clone(),
            cancel_url: self.settings.cancel_url.clone(),
            metadata: BTreeMap::from([("source".to_string(), SESSION_SOURCE.to_string())]),
        };
        let session = self
            .processor
            .create_checkout_session(&params)
            .await
            .map_err(|source| self.processor_error(source))?;

        self.enter(CheckoutStage::Redirecting);
        Span::current().record("session_id", session.id.as_str());
        let url = session
            .url
            .ok_or_else(|| CheckoutError::MissingUrl(session.id.clone()))?;

        info!(session_id = %session.id, "Checkout session ready");
        Ok(CheckoutOutcome {
            session_id: session.id,
            url,
        })
    }

    /// Get-or-create the processor customer for a verified shopper.
    async fn resolve_customer(&self, shopper: Shopper) -> Result<SessionCustomer, CheckoutError> {
        let email = match shopper {
            Shopper::Verified(email) => email.normalized(),
            Shopper::Unverified(email) => return Ok(SessionCustomer::Email(email.into_inner())),
            Shopper::Guest => return Ok(SessionCustomer::Guest),
        };

        let existing = self
            .processor
            .find_customer_by_email(&email)
            .await
            .map_err(|source| self.processor_error(source))?;

        let customer = match existing {
            Some(customer) => customer,
            None => self
                .processor
                .create_customer(&email)
                .await
                .map_err(|source| self.processor_error(source))?,
        };

        debug!(customer_id = %customer.id, "Customer resolved");
        Ok(SessionCustomer::Existing(customer.id))
    }

    fn processor_error(&self, source: StripeError) -> CheckoutError {
        CheckoutError::Processor {
            stage: self.stage,
            source,
        }
    }

    fn enter(&mut self, stage: CheckoutStage) {
        self.stage = stage;
        Span::current().record("stage", stage.as_str());
    }
}
