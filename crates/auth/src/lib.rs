//! `stockflow-auth`: session tokens and the scheduled-trigger secret.
//!
//! Transport-agnostic. The HTTP layer extracts the raw strings and asks this
//! crate whether they are acceptable.

pub mod claims;
pub mod principal;
pub mod roles;
pub mod token;
pub mod trigger;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use principal::{PrincipalId, Session};
pub use roles::Role;
pub use token::{Hs256JwtValidator, JwtValidator};
pub use trigger::TriggerToken;
