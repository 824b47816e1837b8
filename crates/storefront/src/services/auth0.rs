//! Auth0 client for identity verification and account management.
//!
//! Access tokens presented by the static site are verified against the
//! tenant's `/userinfo` endpoint; verified identities are cached for five
//! minutes keyed by a SHA-256 digest of the token, so raw tokens never sit in
//! memory longer than a request.
//!
//! Account changes go through the Management API with a machine-to-machine
//! token obtained by client-credentials exchange and reused until shortly
//! before it expires.

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::future::Cache;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use simple_valley_core::Email;

use crate::config::{Auth0Config, Auth0ManagementConfig};

/// How long a verified token is trusted without asking Auth0 again.
const USERINFO_TTL: Duration = Duration::from_secs(300);

/// Refresh the management token this long before Auth0 says it expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Errors that can occur when interacting with Auth0.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The access token was rejected.
    #[error("Invalid or expired access token")]
    InvalidToken,

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Management credentials are not configured.
    #[error("Auth0 management API is not configured")]
    NotConfigured,

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// An identity confirmed by Auth0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedUser {
    /// Auth0 user ID (`sub` claim), e.g. `auth0|64f1...`
    pub user_id: String,
    /// Email, present only when Auth0 does not mark it unverified
    pub email: Option<Email>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
}

impl From<UserInfo> for VerifiedUser {
    fn from(info: UserInfo) -> Self {
        let email = match info.email_verified {
            Some(false) => None,
            _ => info.email.as_deref().and_then(|e| Email::parse(e).ok()),
        };
        Self {
            user_id: info.sub,
            email,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct TicketResponse {
    ticket: String,
}

struct ManagementToken {
    value: SecretString,
    refresh_at: Instant,
}

/// Auth0 API client.
#[derive(Clone)]
pub struct Auth0Client {
    inner: Arc<Auth0ClientInner>,
}

struct Auth0ClientInner {
    client: reqwest::Client,
    base_url: String,
    management: Option<Auth0ManagementConfig>,
    userinfo_cache: Cache<String, VerifiedUser>,
    management_token: Mutex<Option<ManagementToken>>,
}

impl Auth0Client {
    /// Create a new Auth0 client.
    #[must_use]
    pub fn new(config: &Auth0Config) -> Self {
        let userinfo_cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(USERINFO_TTL)
            .support_invalidation_closures()
            .build();

        Self {
            inner: Arc::new(Auth0ClientInner {
                client: reqwest::Client::new(),
                base_url: format!("https://{}", config.domain),
                management: config.management.clone(),
                userinfo_cache,
                management_token: Mutex::new(None),
            }),
        }
    }

    /// Whether account management operations are available.
    #[must_use]
    pub fn management_enabled(&self) -> bool {
        self.inner.management.is_some()
    }

    /// Verify an access token and return the identity it belongs to.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` if Auth0 rejects the token, or another error
    /// if the request fails.
    #[instrument(skip(self, access_token))]
    pub async fn verify_access_token(
        &self,
        access_token: &str,
    ) -> Result<VerifiedUser, IdentityError> {
        let cache_key = token_digest(access_token);

        if let Some(user) = self.inner.userinfo_cache.get(&cache_key).await {
            debug!("Cache hit for access token");
            return Ok(user);
        }

        let response = self
            .inner
            .client
            .get(format!("{}/userinfo", self.inner.base_url))
            .bearer_auth(access_token)
            .send()
            .await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(IdentityError::InvalidToken);
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(IdentityError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let info: UserInfo = response
            .json()
            .await
            .map_err(|e| IdentityError::Parse(e.to_string()))?;
        let user = VerifiedUser::from(info);

        self.inner
            .userinfo_cache
            .insert(cache_key, user.clone())
            .await;

        Ok(user)
    }

    /// Change a user's email address.
    ///
    /// # Errors
    ///
    /// Returns error if management is not configured or the API request fails.
    #[instrument(skip(self, email))]
    pub async fn update_email(&self, user_id: &str, email: &Email) -> Result<(), IdentityError> {
        let token = self.management_token().await?;
        let url = format!(
            "{}/api/v2/users/{}",
            self.inner.base_url,
            urlencoding::encode(user_id)
        );

        let response = self
            .inner
            .client
            .patch(&url)
            .bearer_auth(token.expose_secret())
            .json(&serde_json::json!({ "email": email.as_str() }))
            .send()
            .await?;

        check_status(response).await?;
        self.forget_user(user_id);
        Ok(())
    }

    /// Create a password change ticket and return its URL.
    ///
    /// # Errors
    ///
    /// Returns error if management is not configured or the API request fails.
    #[instrument(skip(self))]
    pub async fn create_password_change_ticket(
        &self,
        user_id: &str,
        result_url: &str,
    ) -> Result<String, IdentityError> {
        let token = self.management_token().await?;
        let url = format!("{}/api/v2/tickets/password-change", self.inner.base_url);

        let response = self
            .inner
            .client
            .post(&url)
            .bearer_auth(token.expose_secret())
            .json(&serde_json::json!({
                "user_id": user_id,
                "result_url": result_url,
            }))
            .send()
            .await?;

        let response = check_status(response).await?;
        let ticket: TicketResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Parse(e.to_string()))?;

        Ok(ticket.ticket)
    }

    /// Permanently delete a user.
    ///
    /// # Errors
    ///
    /// Returns error if management is not configured or the API request fails.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, user_id: &str) -> Result<(), IdentityError> {
        let token = self.management_token().await?;
        let url = format!(
            "{}/api/v2/users/{}",
            self.inner.base_url,
            urlencoding::encode(user_id)
        );

        let response = self
            .inner
            .client
            .delete(&url)
            .bearer_auth(token.expose_secret())
            .send()
            .await?;

        check_status(response).await?;
        self.forget_user(user_id);
        Ok(())
    }

    /// Drop cached identities for a user whose account just changed.
    fn forget_user(&self, user_id: &str) {
        let user_id = user_id.to_owned();
        if let Err(e) = self
            .inner
            .userinfo_cache
            .invalidate_entries_if(move |_, user| user.user_id == user_id)
        {
            warn!(error = %e, "Failed to invalidate cached identities");
        }
    }

    /// Get a management token, exchanging client credentials when needed.
    async fn management_token(&self) -> Result<SecretString, IdentityError> {
        let management = self
            .inner
            .management
            .as_ref()
            .ok_or(IdentityError::NotConfigured)?;

        let mut cached = self.inner.management_token.lock().await;
        if let Some(token) = cached.as_ref()
            && Instant::now() < token.refresh_at
        {
            return Ok(token.value.clone());
        }

        let response = self
            .inner
            .client
            .post(format!("{}/oauth/token", self.inner.base_url))
            .json(&serde_json::json!({
                "grant_type": "client_credentials",
                "client_id": management.client_id,
                "client_secret": management.client_secret.expose_secret(),
                "audience": management.audience,
            }))
            .send()
            .await?;

        let response = check_status(response).await?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Parse(e.to_string()))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        let value = SecretString::from(token.access_token);
        *cached = Some(ManagementToken {
            value: value.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        debug!(expires_in = token.expires_in, "Management token refreshed");
        Ok(value)
    }
}

/// Turn a non-success status into an `Api` error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, IdentityError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), %message, "Auth0 API error");
    Err(IdentityError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Cache key for an access token.
fn token_digest(access_token: &str) -> String {
    hex::encode(Sha256::digest(access_token.as_bytes()))
}
