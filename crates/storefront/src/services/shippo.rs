//! Shippo API client for shipping label purchase.
//!
//! Labels are bought in two synchronous steps: create a shipment to get rate
//! quotes, then purchase a transaction for the preferred rate.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::{ShipFromAddress, ShippoConfig};

/// Shippo API base URL.
const BASE_URL: &str = "https://api.goshippo.com";

/// Label format printed on the 4x6 thermal printer.
const LABEL_FILE_TYPE: &str = "PDF_4x6";

/// Errors that can occur when interacting with Shippo.
#[derive(Debug, Error)]
pub enum ShippingError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// No quote from the preferred carrier and service level.
    #[error("No {carrier} {service_level} rate offered")]
    NoMatchingRate {
        carrier: String,
        service_level: String,
    },

    /// The label purchase did not succeed.
    #[error("Label purchase failed: {0}")]
    LabelFailed(String),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// A postal address in Shippo's shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShippoAddress {
    pub name: String,
    pub street1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub phone: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub email: String,
}

impl From<&ShipFromAddress> for ShippoAddress {
    fn from(from: &ShipFromAddress) -> Self {
        Self {
            name: from.name.clone(),
            street1: from.street1.clone(),
            street2: None,
            city: from.city.clone(),
            state: from.state.clone(),
            zip: from.zip.clone(),
            country: from.country.clone(),
            phone: from.phone.clone(),
            email: from.email.clone(),
        }
    }
}

/// Package dimensions and weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parcel {
    pub length: String,
    pub width: String,
    pub height: String,
    pub distance_unit: String,
    pub weight: String,
    pub mass_unit: String,
}

impl Default for Parcel {
    /// The standard bar box: 8 x 6 x 1 in, 12 oz.
    fn default() -> Self {
        Self {
            length: "8".to_string(),
            width: "6".to_string(),
            height: "1".to_string(),
            distance_unit: "in".to_string(),
            weight: "12".to_string(),
            mass_unit: "oz".to_string(),
        }
    }
}

/// A carrier rate quote.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Rate {
    pub object_id: String,
    pub provider: String,
    pub servicelevel: ServiceLevel,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceLevel {
    pub token: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Shipment {
    object_id: String,
    #[serde(default)]
    rates: Vec<Rate>,
}

#[derive(Debug, Deserialize)]
struct Transaction {
    status: String,
    #[serde(default)]
    tracking_number: Option<String>,
    #[serde(default)]
    label_url: Option<String>,
    #[serde(default)]
    messages: Vec<TransactionMessage>,
}

#[derive(Debug, Deserialize)]
struct TransactionMessage {
    #[serde(default)]
    text: String,
}

/// A purchased shipping label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub tracking_number: String,
    pub label_url: String,
}

/// Shippo API client.
#[derive(Clone)]
pub struct ShippoClient {
    client: reqwest::Client,
    carrier: String,
    service_level: String,
    ship_from: ShippoAddress,
}

impl ShippoClient {
    /// Create a new Shippo API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &ShippoConfig) -> Result<Self, ShippingError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("ShippoToken {}", config.api_key.expose_secret());
        let mut auth_header = HeaderValue::from_str(&auth_value)
            .map_err(|e| ShippingError::Parse(format!("Invalid API key format: {e}")))?;
        auth_header.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_header);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            carrier: config.carrier.clone(),
            service_level: config.service_level.clone(),
            ship_from: ShippoAddress::from(&config.ship_from),
        })
    }

    /// Quote, then buy, a label for one parcel to this address.
    ///
    /// # Errors
    ///
    /// Returns error if either API call fails, the preferred rate is not
    /// offered, or the purchase is not successful.
    #[instrument(skip(self, to, parcel))]
    pub async fn purchase_label(
        &self,
        to: &ShippoAddress,
        parcel: &Parcel,
    ) -> Result<Label, ShippingError> {
        let rates = self.create_shipment(to, parcel).await?;
        let rate = select_rate(&rates, &self.carrier, &self.service_level).ok_or_else(|| {
            ShippingError::NoMatchingRate {
                carrier: self.carrier.clone(),
                service_level: self.service_level.clone(),
            }
        })?;

        self.buy_rate(&rate.object_id).await
    }

    /// Create a shipment and return its rate quotes.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, to, parcel))]
    pub async fn create_shipment(
        &self,
        to: &ShippoAddress,
        parcel: &Parcel,
    ) -> Result<Vec<Rate>, ShippingError> {
        let body = serde_json::json!({
            "address_from": self.ship_from,
            "address_to": to,
            "parcels": [parcel],
            "async": false,
        });

        let response = self
            .client
            .post(format!("{BASE_URL}/shipments/"))
            .json(&body)
            .send()
            .await?;
        let shipment: Shipment = handle_response(response).await?;

        debug!(
            shipment_id = %shipment.object_id,
            rates = shipment.rates.len(),
            "Shipment created"
        );
        Ok(shipment.rates)
    }

    /// Purchase a label for a quoted rate.
    async fn buy_rate(&self, rate_id: &str) -> Result<Label, ShippingError> {
        let body = serde_json::json!({
            "rate": rate_id,
            "label_file_type": LABEL_FILE_TYPE,
            "async": false,
        });

        let response = self
            .client
            .post(format!("{BASE_URL}/transactions/"))
            .json(&body)
            .send()
            .await?;
        let transaction: Transaction = handle_response(response).await?;

        if transaction.status != "SUCCESS" {
            let reasons = transaction
                .messages
                .iter()
                .map(|m| m.text.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ShippingError::LabelFailed(format!(
                "{}: {reasons}",
                transaction.status
            )));
        }

        match (transaction.tracking_number, transaction.label_url) {
            (Some(tracking_number), Some(label_url)) => Ok(Label {
                tracking_number,
                label_url,
            }),
            _ => Err(ShippingError::LabelFailed(
                "missing tracking number or label URL".to_string(),
            )),
        }
    }
}

/// Pick the quote matching the preferred carrier and service level.
///
/// The carrier match is case-insensitive; the service level token is exact.
#[must_use]
pub fn select_rate<'a>(rates: &'a [Rate], carrier: &str, service_level: &str) -> Option<&'a Rate> {
    rates.iter().find(|rate| {
        rate.provider.eq_ignore_ascii_case(carrier) && rate.servicelevel.token == service_level
    })
}

async fn handle_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ShippingError> {
    let status = response.status();

    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ShippingError::Api {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json()
        .await
        .map_err(|e| ShippingError::Parse(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rates() -> Vec<Rate> {
        serde_json::from_value(serde_json::json!([
            { "object_id": "r_priority", "provider": "USPS",
              "servicelevel": { "token": "usps_priority", "name": "Priority Mail" },
              "amount": "9.85", "currency": "USD" },
            { "object_id": "r_ground", "provider": "USPS",
              "servicelevel": { "token": "usps_ground_advantage" },
              "amount": "5.10", "currency": "USD" },
            { "object_id": "r_ups", "provider": "UPS",
              "servicelevel": { "token": "ups_ground" } }
        ]))
        .unwrap()
    }

    #[test]
    fn test_select_preferred_rate() {
        let rates = rates();
        let rate = select_rate(&rates, "usps", "usps_ground_advantage").unwrap();
        assert_eq!(rate.object_id, "r_ground");
    }

    #[test]
    fn test_select_rate_missing() {
        assert!(select_rate(&rates(), "FedEx", "fedex_ground").is_none());
        assert!(select_rate(&[], "USPS", "usps_ground_advantage").is_none());
    }

    #[test]
    fn test_default_parcel() {
        let parcel = serde_json::to_value(Parcel::default()).unwrap();
        assert_eq!(
            parcel,
            serde_json::json!({
                "length": "8", "width": "6", "height": "1", "distance_unit": "in",
                "weight": "12", "mass_unit": "oz"
            })
        );
    }

    #[test]
    fn test_address_omits_empty_contact() {
        let address = ShippoAddress {
            name: "Jane Doe".to_string(),
            street1: "1 Main St".to_string(),
            city: "Boston".to_string(),
            state: "MA".to_string(),
            zip: "02118".to_string(),
            country: "US".to_string(),
            ..ShippoAddress::default()
        };
        let json = serde_json::to_value(&address).unwrap();
        assert!(json.get("phone").is_none());
        assert!(json.get("street2").is_none());
    }
}
