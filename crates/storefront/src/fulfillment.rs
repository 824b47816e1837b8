//! Shipping label purchase for paid checkout sessions.

use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::services::{Parcel, ShippingError, ShippoAddress, ShippoClient};
use crate::stripe::{CheckoutSession, ShippingDetails};

/// Errors that stop a label from being bought.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    #[error("Session has no shipping details")]
    MissingShippingDetails,

    #[error("Shipping address is missing {0}")]
    IncompleteAddress(&'static str),

    #[error(transparent)]
    Shipping(#[from] ShippingError),
}

/// Convert the address collected on the payment page into a label address.
///
/// # Errors
///
/// Returns error if the name or a required address field is missing.
pub fn ship_to(details: &ShippingDetails) -> Result<ShippoAddress, FulfillmentError> {
    let address = details
        .address
        .as_ref()
        .ok_or(FulfillmentError::IncompleteAddress("address"))?;

    let required = |value: &Option<String>, field: &'static str| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
            .ok_or(FulfillmentError::IncompleteAddress(field))
    };

    Ok(ShippoAddress {
        name: required(&details.name, "name")?,
        street1: required(&address.line1, "line1")?,
        street2: address.line2.clone().filter(|v| !v.trim().is_empty()),
        city: required(&address.city, "city")?,
        state: address.state.clone().unwrap_or_default(),
        zip: required(&address.postal_code, "postal_code")?,
        country: required(&address.country, "country")?,
        ..ShippoAddress::default()
    })
}

/// Buy a label for a paid session and log the tracking number.
///
/// Failures are logged and reported to Sentry, never returned to the
/// processor: the webhook has already been acknowledged.
#[instrument(skip_all, fields(session_id = %session.id))]
pub async fn fulfill(shippo: ShippoClient, session: CheckoutSession) {
    match purchase_label(&shippo, &session).await {
        Ok(label) => info!(
            tracking_number = %label.tracking_number,
            label_url = %label.label_url,
            "Shipping label purchased"
        ),
        Err(FulfillmentError::MissingShippingDetails) => {
            warn!("Paid session has no shipping details; no label bought");
        }
        Err(e) => {
            let event_id = sentry::capture_error(&e);
            error!(error = %e, sentry_event_id = %event_id, "Shipping label purchase failed");
        }
    }
}

async fn purchase_label(
    shippo: &ShippoClient,
    session: &CheckoutSession,
) -> Result<crate::services::Label, FulfillmentError> {
    let details = session
        .shipping()
        .ok_or(FulfillmentError::MissingShippingDetails)?;
    let to = ship_to(details)?;

    Ok(shippo.purchase_label(&to, &Parcel::default()).await?)
}
