//! Stripe API request and response types.
//!
//! Only the fields the storefront reads are modeled; unknown fields are ignored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use simple_valley_core::{CheckoutSessionId, CustomerId, PriceId, ShippingRateId};

/// A paginated list response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct List<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

/// A Stripe customer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    #[serde(default)]
    pub email: Option<String>,
}

/// A postal address as Stripe reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

/// Shipping name and address collected on the payment page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingDetails {
    pub name: Option<String>,
    pub address: Option<Address>,
}

/// Customer contact details collected on the payment page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CustomerDetails {
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// Newer API versions nest shipping details here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CollectedInformation {
    pub shipping_details: Option<ShippingDetails>,
}

/// One purchased line of a checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub amount_total: Option<i64>,
}

/// A hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub id: CheckoutSessionId,
    /// Hosted payment page URL (absent once the session is complete or expired)
    #[serde(default)]
    pub url: Option<String>,
    /// `open`, `complete` or `expired`
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    /// Total in cents
    #[serde(default)]
    pub amount_total: Option<i64>,
    /// Unix timestamp
    pub created: i64,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub shipping_details: Option<ShippingDetails>,
    #[serde(default)]
    pub collected_information: Option<CollectedInformation>,
    #[serde(default)]
    pub line_items: Option<List<LineItem>>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl CheckoutSession {
    /// Whether the shopper finished paying.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status.as_deref() == Some("complete")
    }

    /// Collected shipping details, wherever the API version put them.
    #[must_use]
    pub fn shipping(&self) -> Option<&ShippingDetails> {
        self.collected_information
            .as_ref()
            .and_then(|info| info.shipping_details.as_ref())
            .or(self.shipping_details.as_ref())
    }

    /// Expanded line items, or an empty slice when not expanded.
    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        self.line_items.as_ref().map_or(&[], |list| list.data.as_slice())
    }
}

/// Who the checkout session is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCustomer {
    /// A verified shopper's processor customer.
    Existing(CustomerId),
    /// Prefill the payment page's email field only.
    Email(String),
    /// Guest checkout.
    Guest,
}

/// Parameters for creating a checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCheckoutSession {
    /// Price ID and quantity per line
    pub line_items: Vec<(PriceId, u32)>,
    pub shipping_rate: ShippingRateId,
    pub customer: SessionCustomer,
    pub allowed_countries: Vec<String>,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: BTreeMap<String, String>,
}

impl NewCheckoutSession {
    /// Encode as `application/x-www-form-urlencoded` pairs in Stripe's
    /// bracket notation.
    #[must_use]
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
        ];

        for (index, (price, quantity)) in self.line_items.iter().enumerate() {
            form.push((format!("line_items[{index}][price]"), price.to_string()));
            form.push((format!("line_items[{index}][quantity]"), quantity.to_string()));
        }

        for (index, country) in self.allowed_countries.iter().enumerate() {
            form.push((
                format!("shipping_address_collection[allowed_countries][{index}]"),
                country.clone(),
            ));
        }

        form.push((
            "shipping_options[0][shipping_rate]".to_string(),
            self.shipping_rate.to_string(),
        ));

        match &self.customer {
            SessionCustomer::Existing(id) => form.push(("customer".to_string(), id.to_string())),
            SessionCustomer::Email(email) => {
                form.push(("customer_email".to_string(), email.clone()));
            }
            SessionCustomer::Guest => {}
        }

        form.push(("success_url".to_string(), self.success_url.clone()));
        form.push(("cancel_url".to_string(), self.cancel_url.clone()));

        for (key, value) in &self.metadata {
            form.push((format!("metadata[{key}]"), value.clone()));
        }

        form
    }
}

/// A webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// Error body returned by the API.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorDetail {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn params(customer: SessionCustomer) -> NewCheckoutSession {
        NewCheckoutSession {
            line_items: vec![(PriceId::parse("A").unwrap(), 1)],
            shipping_rate: ShippingRateId::parse("shr_standard").unwrap(),
            customer,
            allowed_countries: vec!["US".to_string()],
            success_url: "https://simplevalleybar.com/success.html".to_string(),
            cancel_url: "https://simplevalleybar.com/".to_string(),
            metadata: BTreeMap::from([("source".to_string(), "simple-valley".to_string())]),
        }
    }

    fn value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_form_encoding() {
        let form = params(SessionCustomer::Guest).to_form();

        assert_eq!(value(&form, "mode"), Some("payment"));
        assert_eq!(value(&form, "payment_method_types[0]"), Some("card"));
        assert_eq!(value(&form, "line_items[0][price]"), Some("A"));
        assert_eq!(value(&form, "line_items[0][quantity]"), Some("1"));
        assert_eq!(
            value(&form, "shipping_address_collection[allowed_countries][0]"),
            Some("US")
        );
        assert_eq!(
            value(&form, "shipping_options[0][shipping_rate]"),
            Some("shr_standard")
        );
        assert_eq!(value(&form, "metadata[source]"), Some("simple-valley"));
        assert_eq!(value(&form, "customer"), None);
        assert_eq!(value(&form, "customer_email"), None);
    }

    #[test]
    fn test_form_customer_variants() {
        let existing =
            params(SessionCustomer::Existing(CustomerId::parse("cus_123").unwrap())).to_form();
        assert_eq!(value(&existing, "customer"), Some("cus_123"));
        assert_eq!(value(&existing, "customer_email"), None);

        let prefill = params(SessionCustomer::Email("a@b.co".to_string())).to_form();
        assert_eq!(value(&prefill, "customer"), None);
        assert_eq!(value(&prefill, "customer_email"), Some("a@b.co"));
    }

    #[test]
    fn test_session_shipping_prefers_collected_information() {
        let json = serde_json::json!({
            "id": "cs_test_1",
            "created": 1_767_225_600,
            "status": "complete",
            "shipping_details": { "name": "Legacy", "address": null },
            "collected_information": {
                "shipping_details": {
                    "name": "Jane Doe",
                    "address": { "line1": "1 Main St", "city": "Boston", "state": "MA",
                                 "postal_code": "02118", "country": "US" }
                }
            }
        });
        let session: CheckoutSession = serde_json::from_value(json).unwrap();

        assert!(session.is_complete());
        assert_eq!(
            session.shipping().and_then(|s| s.name.as_deref()),
            Some("Jane Doe")
        );
        assert!(session.items().is_empty());
    }
}
