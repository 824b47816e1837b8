//! Order history built from completed checkout sessions.

use chrono::DateTime;
use serde::Serialize;
use tracing::{debug, instrument};

use simple_valley_core::{Email, format_usd};

use crate::stripe::{CheckoutSession, PaymentProcessor, StripeError};

/// One past order as the account page shows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    pub id: String,
    /// Purchase date, `MM/DD/YYYY` in UTC
    pub date: String,
    /// Amount paid, e.g. `$74.99`
    pub total: String,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
}

impl From<&CheckoutSession> for OrderSummary {
    fn from(session: &CheckoutSession) -> Self {
        let date = DateTime::from_timestamp(session.created, 0)
            .map(|at| at.format("%m/%d/%Y").to_string())
            .unwrap_or_default();

        Self {
            id: session.id.to_string(),
            date,
            total: format_usd(session.amount_total.unwrap_or_default()),
            items: session
                .items()
                .iter()
                .map(|item| OrderItem {
                    name: item.description.clone().unwrap_or_default(),
                    quantity: item.quantity.unwrap_or(1),
                })
                .collect(),
        }
    }
}

/// Completed orders for the customer with this email, newest first.
///
/// No processor customer means no orders.
///
/// # Errors
///
/// Returns error if a processor call fails.
#[instrument(skip(processor, email))]
pub async fn order_history<P: PaymentProcessor>(
    processor: &P,
    email: &Email,
) -> Result<Vec<OrderSummary>, StripeError> {
    let Some(customer) = processor.find_customer_by_email(&email.normalized()).await? else {
        debug!("No customer record; empty order history");
        return Ok(Vec::new());
    };

    let sessions = processor.list_checkout_sessions(&customer.id).await?;
    let orders: Vec<OrderSummary> = sessions
        .iter()
        .filter(|session| session.is_complete())
        .map(OrderSummary::from)
        .collect();

    debug!(
        sessions = sessions.len(),
        orders = orders.len(),
        "Order history loaded"
    );
    Ok(orders)
}
