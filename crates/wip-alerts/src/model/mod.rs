//! Persisted entities and their repositories.
//!
//! Each entity implements [`Record`](crate::store::Record) and exposes thin
//! typed functions over the [`ObjectStore`](crate::store::ObjectStore) that
//! supply the entity kind and the owning account.

pub mod account;
pub mod alert;
pub mod apikey;
pub mod device;
pub mod heartbeat;
pub mod renewal;
pub mod token;

pub use account::Account;
pub use alert::{Alert, AlertPriority, AlertStatus};
pub use apikey::{ApiKey, ApiKeyStatus};
pub use device::Device;
pub use heartbeat::Heartbeat;
pub use renewal::Renewal;
pub use token::{Scope, Token, TokenType};

/// Generate a fresh record id (UUID v4, hyphenated).
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
