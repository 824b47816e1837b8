//! Stripe webhook receiver.

use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use serde_json::{Value, json};
use tracing::{debug, field, info, instrument, warn};

use crate::error::{AppError, Result};
use crate::fulfillment;
use crate::state::AppState;
use crate::stripe::CheckoutSession;
use crate::stripe::webhook::{SIGNATURE_HEADER, WebhookError};

/// Event that triggers label purchase.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Receive a signed event delivery.
///
/// Deliveries are acknowledged as soon as they verify. Label purchase runs
/// on its own task and its failures never reach the processor.
///
/// POST /api/webhooks/stripe
#[instrument(skip_all, fields(event_id = field::Empty, event_type = field::Empty))]
pub async fn stripe(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let event = state
        .webhook()
        .construct_event(&body, signature)
        .map_err(|e| {
            warn!(error = %e, "Rejected webhook delivery");
            match e {
                WebhookError::InvalidPayload(_) => {
                    AppError::BadRequest("Invalid payload.".to_string())
                }
                _ => AppError::BadRequest("Invalid signature.".to_string()),
            }
        })?;

    let span = tracing::Span::current();
    span.record("event_id", event.id.as_str());
    span.record("event_type", event.event_type.as_str());

    if event.event_type != CHECKOUT_COMPLETED {
        debug!("Ignoring event type");
        return Ok(acknowledged());
    }

    // Verified deliveries are always acknowledged.
    let session: CheckoutSession = match serde_json::from_value(event.data.object) {
        Ok(session) => session,
        Err(e) => {
            warn!(error = %e, "Completed event without a readable session");
            return Ok(acknowledged());
        }
    };

    info!(session_id = %session.id, "Checkout completed");

    match state.shippo() {
        Some(shippo) => {
            tokio::spawn(fulfillment::fulfill(shippo.clone(), session));
        }
        None => warn!(session_id = %session.id, "Label purchase not configured; skipping"),
    }

    Ok(acknowledged())
}

fn acknowledged() -> Json<Value> {
    Json(json!({ "received": true }))
}
