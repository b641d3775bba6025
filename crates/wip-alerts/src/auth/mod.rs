//! Token claims and the request authorization gates.

pub mod claims;
pub mod gate;

pub use claims::TokenClaims;
pub use gate::{authorize, has_capability, has_role, validate_api_key, RequestContext};
