//! Money helpers using decimal arithmetic.
//!
//! Prices travel in major units (`79.99`) as [`Decimal`] and are converted to
//! minor units (cents) wherever the payment processor or a threshold rule
//! needs integers. Only USD is supported.

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use thiserror::Error;

/// Errors that can occur when converting amounts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The amount does not fit in an `i64` number of cents.
    #[error("amount {0} is out of range")]
    OutOfRange(Decimal),
}

/// Convert an amount in major units to cents.
///
/// Rounds half away from zero at two decimal places, so `10.005` becomes
/// `1001`.
///
/// # Errors
///
/// Returns [`MoneyError::OutOfRange`] if the result does not fit in an `i64`.
///
/// # Example
///
/// ```
/// use rust_decimal::Decimal;
/// use simple_valley_core::to_cents;
///
/// assert_eq!(to_cents(Decimal::new(7999, 2)), Ok(7999));
/// ```
pub fn to_cents(amount: Decimal) -> Result<i64, MoneyError> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|cents| cents.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|cents| cents.to_i64())
        .ok_or(MoneyError::OutOfRange(amount))
}

/// Format an amount in cents as a dollar string (e.g. `$12.34`).
#[must_use]
pub fn format_usd(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}${}.{:02}", abs / 100, abs % 100)
}
