//! Newtype IDs for payment-processor identifiers.
//!
//! The payment processor hands out opaque string identifiers (`price_...`,
//! `cus_...`, `cs_...`, `shr_...`). Use the `define_id!` macro to create
//! type-safe wrappers so a price ID can never be passed where a shipping
//! rate ID is expected.

use thiserror::Error;

/// Maximum accepted identifier length in bytes.
pub const MAX_ID_LENGTH: usize = 255;

/// Errors that can occur when parsing an identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input string is empty.
    #[error("identifier cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("identifier must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character outside `[A-Za-z0-9_-]`.
    #[error("identifier contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Validate an identifier string.
///
/// # Errors
///
/// Returns an error if the identifier is empty, longer than
/// [`MAX_ID_LENGTH`], or contains anything but ASCII alphanumerics, `_`
/// and `-`.
pub fn validate_id(s: &str) -> Result<(), IdError> {
    if s.is_empty() {
        return Err(IdError::Empty);
    }

    if s.len() > MAX_ID_LENGTH {
        return Err(IdError::TooLong { max: MAX_ID_LENGTH });
    }

    if let Some(c) = s
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(IdError::InvalidCharacter(c));
    }

    Ok(())
}

/// Macro to define a type-safe processor identifier.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` as a plain string, validated on deserialize
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - `parse()`, `as_str()`, `into_inner()`
/// - `FromStr`, `TryFrom<String>`, `Display` and `AsRef<str>`
///
/// # Example
///
/// ```rust
/// # use simple_valley_core::define_id;
/// define_id!(ProductId);
/// define_id!(OrderId);
///
/// let product = ProductId::parse("prod_123").unwrap();
/// assert_eq!(product.as_str(), "prod_123");
/// assert!(OrderId::parse("").is_err());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parse and validate an identifier.
            ///
            /// # Errors
            ///
            /// Returns an error if the identifier is empty, too long, or
            /// contains invalid characters.
            pub fn parse(s: &str) -> ::core::result::Result<Self, $crate::types::id::IdError> {
                $crate::types::id::validate_id(s)?;
                Ok(Self(s.to_owned()))
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the identifier and returns its inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::types::id::IdError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl ::core::convert::TryFrom<String> for $name {
            type Error = $crate::types::id::IdError;

            fn try_from(s: String) -> ::core::result::Result<Self, Self::Error> {
                $crate::types::id::validate_id(&s)?;
                Ok(Self(s))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Processor identifiers
define_id!(PriceId);
define_id!(CustomerId);
define_id!(CheckoutSessionId);
define_id!(ShippingRateId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_ids() {
        assert!(PriceId::parse("price_1SgqJDLXAfa3XjXDkbgFa7Ka").is_ok());
        assert!(PriceId::parse("A").is_ok());
        assert!(ShippingRateId::parse("shr_free-tier").is_ok());
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(PriceId::parse(""), Err(IdError::Empty));
    }

    #[test]
    fn test_parse_too_long() {
        let long = "p".repeat(MAX_ID_LENGTH + 1);
        assert!(matches!(PriceId::parse(&long), Err(IdError::TooLong { .. })));
    }

    #[test]
    fn test_parse_invalid_character() {
        assert_eq!(
            PriceId::parse("price 1"),
            Err(IdError::InvalidCharacter(' '))
        );
        assert!(CustomerId::parse("cus/../x").is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: PriceId = serde_json::from_str("\"price_abc\"").unwrap();
        assert_eq!(ok.as_str(), "price_abc");

        assert!(serde_json::from_str::<PriceId>("\"\"").is_err());
        assert!(serde_json::from_str::<PriceId>("null").is_err());
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = CustomerId::parse("cus_123").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"cus_123\"");
        assert_eq!(id.to_string(), "cus_123");
    }
}
