//! Checkout session route handler.

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use tracing::{debug, instrument};

use simple_valley_core::Email;
use simple_valley_core::cart::{CheckoutRequest, CheckoutResponse};

use crate::checkout::{CheckoutGateway, Shopper};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::OptionalUser;
use crate::services::VerifiedUser;
use crate::state::AppState;

/// Create a hosted checkout session for the submitted cart.
///
/// POST /api/checkout-session
#[instrument(skip_all)]
pub async fn create_session(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    payload: std::result::Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<CheckoutResponse>> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let shopper = shopper_for(user.as_ref(), request.user_email.as_deref());

    let lines = request.cart.len().to_string();
    add_breadcrumb("checkout", "Checkout requested", Some(&[("lines", lines.as_str())]));

    let mut gateway = CheckoutGateway::new(state.stripe(), state.checkout_settings());
    let outcome = gateway.create_session(request.cart, shopper).await?;

    Ok(Json(CheckoutResponse { url: outcome.url }))
}

/// Decide who is checking out.
///
/// A verified identity wins. Otherwise a well-formed `userEmail` only
/// prefills the payment page; a malformed one is ignored.
fn shopper_for(user: Option<&VerifiedUser>, user_email: Option<&str>) -> Shopper {
    if let Some(email) = user.and_then(|u| u.email.clone()) {
        return Shopper::Verified(email);
    }

    match user_email.map(str::trim).filter(|e| !e.is_empty()).map(Email::parse) {
        Some(Ok(email)) => Shopper::Unverified(email),
        Some(Err(e)) => {
            debug!(error = %e, "Ignoring malformed userEmail");
            Shopper::Guest
        }
        None => Shopper::Guest,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn verified(email: Option<&str>) -> VerifiedUser {
        VerifiedUser {
            user_id: "auth0|abc".to_string(),
            email: email.map(|e| Email::parse(e).unwrap()),
        }
    }

    #[test]
    fn test_verified_email_wins() {
        let user = verified(Some("member@example.com"));
        assert_eq!(
            shopper_for(Some(&user), Some("someone-else@example.com")),
            Shopper::Verified(Email::parse("member@example.com").unwrap())
        );
    }

    #[test]
    fn test_client_email_only_prefills() {
        assert_eq!(
            shopper_for(None, Some("guest@example.com")),
            Shopper::Unverified(Email::parse("guest@example.com").unwrap())
        );
    }

    #[test]
    fn test_user_without_verified_email_falls_back() {
        let user = verified(None);
        assert_eq!(
            shopper_for(Some(&user), Some("typed@example.com")),
            Shopper::Unverified(Email::parse("typed@example.com").unwrap())
        );
    }

    #[test]
    fn test_guest() {
        assert_eq!(shopper_for(None, None), Shopper::Guest);
        assert_eq!(shopper_for(None, Some("  ")), Shopper::Guest);
        assert_eq!(shopper_for(None, Some("not-an-email")), Shopper::Guest);
    }
}
