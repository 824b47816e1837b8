//! Account route handlers.
//!
//! Every route requires a verified access token. The user acted on is always
//! the token's subject, never an ID from the request body.

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use simple_valley_core::Email;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireUser;
use crate::orders::{OrderSummary, order_history};
use crate::state::AppState;

/// Body of `POST /api/account/email`.
#[derive(Debug, Deserialize)]
pub struct UpdateEmailRequest {
    #[serde(rename = "newEmail", default)]
    pub new_email: String,
}

/// Plain confirmation body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

/// Body returned by `POST /api/account/password-reset`.
#[derive(Debug, Serialize)]
pub struct PasswordResetResponse {
    pub message: String,
    #[serde(rename = "ticketUrl")]
    pub ticket_url: String,
}

/// List completed orders for the signed-in user.
///
/// GET /api/account/orders
#[instrument(skip_all, fields(user_id = %user.user_id))]
pub async fn orders(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<OrderSummary>>> {
    let Some(email) = user.email else {
        debug!("No verified email; empty order history");
        return Ok(Json(Vec::new()));
    };

    let orders = order_history(state.stripe(), &email).await?;
    Ok(Json(orders))
}

/// Change the signed-in user's email address.
///
/// POST /api/account/email
#[instrument(skip_all, fields(user_id = %user.user_id))]
pub async fn update_email(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    payload: std::result::Result<Json<UpdateEmailRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let email = Email::parse(&request.new_email)
        .map_err(|_| AppError::BadRequest("A valid email address is required.".to_string()))?;

    state.auth0().update_email(&user.user_id, &email).await?;

    add_breadcrumb("account", "Email updated", None);
    info!("Account email updated");
    Ok(MessageResponse::new("Email updated successfully."))
}

/// Start a password reset for the signed-in user.
///
/// POST /api/account/password-reset
#[instrument(skip_all, fields(user_id = %user.user_id))]
pub async fn password_reset(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<PasswordResetResponse>> {
    let ticket_url = state
        .auth0()
        .create_password_change_ticket(&user.user_id, &state.config().base_url)
        .await?;

    info!("Password change ticket created");
    Ok(Json(PasswordResetResponse {
        message: "Password reset link created.".to_string(),
        ticket_url,
    }))
}

/// Permanently delete the signed-in user.
///
/// DELETE /api/account
#[instrument(skip_all, fields(user_id = %user.user_id))]
pub async fn delete_account(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<MessageResponse>> {
    state.auth0().delete_user(&user.user_id).await?;

    info!("Account deleted");
    Ok(MessageResponse::new("Account deleted successfully."))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_update_email_request_field_name() {
        let request: UpdateEmailRequest =
            serde_json::from_str(r#"{"newEmail":"new@example.com"}"#).unwrap();
        assert_eq!(request.new_email, "new@example.com");

        let request: UpdateEmailRequest = serde_json::from_str("{}").unwrap();
        assert!(request.new_email.is_empty());
    }

    #[test]
    fn test_password_reset_response_shape() {
        let json = serde_json::to_value(PasswordResetResponse {
            message: "Password reset link created.".to_string(),
            ticket_url: "https://simple-valley.us.auth0.com/lo/reset?ticket=abc".to_string(),
        })
        .unwrap();

        assert_eq!(
            json["ticketUrl"],
            "https://simple-valley.us.auth0.com/lo/reset?ticket=abc"
        );
        assert_eq!(json["message"], "Password reset link created.");
    }
}
