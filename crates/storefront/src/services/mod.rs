//! Third-party service clients.
//!
//! # Services
//!
//! - `auth0` - Access token verification and account management
//! - `shippo` - Shipping rate quotes and label purchase

pub mod auth0;
pub mod shippo;

pub use auth0::{Auth0Client, IdentityError, VerifiedUser};
pub use shippo::{Label, Parcel, ShippingError, ShippoAddress, ShippoClient};
