//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_BASE_URL` - Public URL of the static site (success/cancel redirects)
//! - `STRIPE_SECRET_KEY` - Stripe secret API key
//! - `STRIPE_WEBHOOK_SECRET` - Stripe webhook signing secret
//! - `SHIPPING_RATE_STANDARD` - Stripe shipping rate ID charged below the threshold
//! - `SHIPPING_RATE_FREE` - Stripe shipping rate ID used at or above the threshold
//! - `AUTH0_DOMAIN` - Auth0 tenant domain (e.g., simple-valley.us.auth0.com)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_STATIC_DIR` - Directory of static site assets to serve
//! - `STOREFRONT_TRUST_PROXY_HEADERS` - Key rate limits on proxy client-IP headers
//!   (default: false, only set behind Cloudflare or Fly.io)
//! - `FREE_SHIPPING_THRESHOLD_CENTS` - Free shipping threshold (default: 7500)
//! - `SHIPPING_ALLOWED_COUNTRIES` - Comma-separated ISO country codes (default: US)
//! - `AUTH0_M2M_CLIENT_ID` / `AUTH0_M2M_CLIENT_SECRET` - Management API credentials
//! - `AUTH0_MANAGEMENT_AUDIENCE` - Management API audience override
//! - `SHIPPO_API_KEY` - Shippo API token (enables label purchase)
//! - `SHIPPO_CARRIER` / `SHIPPO_SERVICE_LEVEL` - Preferred rate (default: USPS, `usps_ground_advantage`)
//! - `SHIP_FROM_NAME`, `SHIP_FROM_STREET1`, `SHIP_FROM_CITY`, `SHIP_FROM_STATE`,
//!   `SHIP_FROM_ZIP`, `SHIP_FROM_COUNTRY`, `SHIP_FROM_PHONE`, `SHIP_FROM_EMAIL` - Origin address
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` / `SENTRY_TRACES_SAMPLE_RATE` - Sentry sampling (default: 1.0 / 0.1)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use simple_valley_core::ShippingRateId;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Default free shipping threshold: $75.00.
pub const DEFAULT_FREE_SHIPPING_THRESHOLD_CENTS: i64 = 7500;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the site, without a trailing slash
    pub base_url: String,
    /// Optional directory of static assets served at `/`
    pub static_dir: Option<PathBuf>,
    /// Trust `CF-Connecting-IP`/`X-Forwarded-For` for rate limit keys
    pub trust_proxy_headers: bool,
    /// Stripe API and checkout configuration
    pub stripe: StripeConfig,
    /// Auth0 configuration
    pub auth0: Auth0Config,
    /// Shippo configuration (label purchase disabled when absent)
    pub shippo: Option<ShippoConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., production, staging)
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Stripe configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key
    pub secret_key: SecretString,
    /// Webhook endpoint signing secret
    pub webhook_secret: SecretString,
    /// Rate charged below the free shipping threshold
    pub standard_shipping_rate: ShippingRateId,
    /// Rate used at or above the free shipping threshold
    pub free_shipping_rate: ShippingRateId,
    /// Subtotal (cents) at which shipping becomes free
    pub free_shipping_threshold_cents: i64,
    /// Countries accepted by shipping address collection
    pub allowed_countries: Vec<String>,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("standard_shipping_rate", &self.standard_shipping_rate)
            .field("free_shipping_rate", &self.free_shipping_rate)
            .field(
                "free_shipping_threshold_cents",
                &self.free_shipping_threshold_cents,
            )
            .field("allowed_countries", &self.allowed_countries)
            .finish()
    }
}

/// Auth0 configuration.
#[derive(Clone)]
pub struct Auth0Config {
    /// Tenant domain, without scheme
    pub domain: String,
    /// Machine-to-machine credentials for the Management API
    pub management: Option<Auth0ManagementConfig>,
}

impl std::fmt::Debug for Auth0Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auth0Config")
            .field("domain", &self.domain)
            .field("management", &self.management)
            .finish()
    }
}

/// Auth0 Management API credentials.
#[derive(Clone)]
pub struct Auth0ManagementConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    /// API audience (default: `https://{domain}/api/v2/`)
    pub audience: String,
}

impl std::fmt::Debug for Auth0ManagementConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auth0ManagementConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("audience", &self.audience)
            .finish()
    }
}

/// Shippo configuration.
#[derive(Clone)]
pub struct ShippoConfig {
    pub api_key: SecretString,
    /// Preferred carrier (matched against the rate's provider)
    pub carrier: String,
    /// Preferred service level token
    pub service_level: String,
    /// Origin address
    pub ship_from: ShipFromAddress,
}

impl std::fmt::Debug for ShippoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShippoConfig")
            .field("api_key", &"[REDACTED]")
            .field("carrier", &self.carrier)
            .field("service_level", &self.service_level)
            .field("ship_from", &self.ship_from)
            .finish()
    }
}

/// Address labels are shipped from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipFromAddress {
    pub name: String,
    pub street1: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
    pub phone: String,
    pub email: String,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("STOREFRONT_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_string(), e.to_string())
            })?;
        let base_url = parse_base_url("STOREFRONT_BASE_URL", &get_required_env("STOREFRONT_BASE_URL")?)?;
        let static_dir = get_optional_env("STOREFRONT_STATIC_DIR").map(PathBuf::from);
        let trust_proxy_headers = get_env_or_default("STOREFRONT_TRUST_PROXY_HEADERS", "false")
            .parse::<bool>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_TRUST_PROXY_HEADERS".to_string(), e.to_string())
            })?;

        let stripe = StripeConfig::from_env()?;
        let auth0 = Auth0Config::from_env()?;
        let shippo = ShippoConfig::from_env()?;

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = parse_rate("SENTRY_SAMPLE_RATE", "1.0")?;
        let sentry_traces_sample_rate = parse_rate("SENTRY_TRACES_SAMPLE_RATE", "0.1")?;

        Ok(Self {
            host,
            port,
            base_url,
            static_dir,
            trust_proxy_headers,
            stripe,
            auth0,
            shippo,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Where the payment page sends the shopper after paying.
    #[must_use]
    pub fn success_url(&self) -> String {
        format!("{}/success.html", self.base_url)
    }

    /// Where the payment page sends the shopper on cancel.
    #[must_use]
    pub fn cancel_url(&self) -> String {
        format!("{}/", self.base_url)
    }
}

impl StripeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            secret_key: get_validated_secret("STRIPE_SECRET_KEY")?,
            webhook_secret: get_validated_secret("STRIPE_WEBHOOK_SECRET")?,
            standard_shipping_rate: get_rate_id("SHIPPING_RATE_STANDARD")?,
            free_shipping_rate: get_rate_id("SHIPPING_RATE_FREE")?,
            free_shipping_threshold_cents: parse_threshold(&get_env_or_default(
                "FREE_SHIPPING_THRESHOLD_CENTS",
                "7500",
            ))?,
            allowed_countries: parse_countries(&get_env_or_default(
                "SHIPPING_ALLOWED_COUNTRIES",
                "US",
            ))?,
        })
    }
}

impl Auth0Config {
    fn from_env() -> Result<Self, ConfigError> {
        let domain = normalize_domain(&get_required_env("AUTH0_DOMAIN")?);
        if domain.is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "AUTH0_DOMAIN".to_string(),
                "cannot be empty".to_string(),
            ));
        }

        let management = match (
            get_optional_env("AUTH0_M2M_CLIENT_ID"),
            get_optional_env("AUTH0_M2M_CLIENT_SECRET"),
        ) {
            (Some(client_id), Some(_)) => Some(Auth0ManagementConfig {
                client_id,
                client_secret: get_validated_secret("AUTH0_M2M_CLIENT_SECRET")?,
                audience: get_optional_env("AUTH0_MANAGEMENT_AUDIENCE")
                    .unwrap_or_else(|| format!("https://{domain}/api/v2/")),
            }),
            _ => None,
        };

        Ok(Self { domain, management })
    }
}

impl ShippoConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        if get_optional_env("SHIPPO_API_KEY").is_none() {
            return Ok(None);
        }

        Ok(Some(Self {
            api_key: get_validated_secret("SHIPPO_API_KEY")?,
            carrier: get_env_or_default("SHIPPO_CARRIER", "USPS"),
            service_level: get_env_or_default("SHIPPO_SERVICE_LEVEL", "usps_ground_advantage"),
            ship_from: ShipFromAddress {
                name: get_env_or_default("SHIP_FROM_NAME", "SIMPLE VALLEY"),
                street1: get_required_env("SHIP_FROM_STREET1")?,
                city: get_required_env("SHIP_FROM_CITY")?,
                state: get_env_or_default("SHIP_FROM_STATE", "MA"),
                zip: get_required_env("SHIP_FROM_ZIP")?,
                country: get_env_or_default("SHIP_FROM_COUNTRY", "US"),
                phone: get_env_or_default("SHIP_FROM_PHONE", ""),
                email: get_env_or_default("SHIP_FROM_EMAIL", ""),
            },
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

fn get_rate_id(key: &str) -> Result<ShippingRateId, ConfigError> {
    ShippingRateId::parse(get_required_env(key)?.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn parse_rate(key: &str, default: &str) -> Result<f32, ConfigError> {
    let rate = get_env_or_default(key, default)
        .parse::<f32>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be between 0.0 and 1.0".to_string(),
        ));
    }
    Ok(rate)
}

/// Parse the base URL and strip any trailing slash.
fn parse_base_url(key: &str, raw: &str) -> Result<String, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an http(s) URL".to_string(),
        ));
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

fn parse_threshold(raw: &str) -> Result<i64, ConfigError> {
    let cents = raw.trim().parse::<i64>().map_err(|e| {
        ConfigError::InvalidEnvVar("FREE_SHIPPING_THRESHOLD_CENTS".to_string(), e.to_string())
    })?;
    if cents < 0 {
        return Err(ConfigError::InvalidEnvVar(
            "FREE_SHIPPING_THRESHOLD_CENTS".to_string(),
            "cannot be negative".to_string(),
        ));
    }
    Ok(cents)
}

fn parse_countries(raw: &str) -> Result<Vec<String>, ConfigError> {
    let countries: Vec<String> = raw
        .split(',')
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
        .collect();

    if countries.is_empty()
        || countries
            .iter()
            .any(|c| c.len() != 2 || !c.chars().all(|ch| ch.is_ascii_alphabetic()))
    {
        return Err(ConfigError::InvalidEnvVar(
            "SHIPPING_ALLOWED_COUNTRIES".to_string(),
            "expected comma-separated two-letter country codes".to_string(),
        ));
    }
    Ok(countries)
}

/// Strip scheme and trailing slash from an Auth0 domain.
fn normalize_domain(raw: &str) -> String {
    raw.trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_string()
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the key issued by the provider."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
