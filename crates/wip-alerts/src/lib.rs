//! wip-alerts: token lifecycle and account-scoped storage for the
//! wip-alerts backend.
//!
//! Provides encrypted access and refresh tokens, one-time renewals,
//! request authorization gates, and a durable object store holding
//! accounts, devices, API keys, heartbeats and alerts.

pub mod auth;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod issuance;
pub mod model;
pub mod store;

// Re-export primary types
pub use error::{AlertsError, ErrorClass, Result};
pub use issuance::{RenewalRedemption, TokenIssuer, TokenPair};
pub use store::{EntityKind, ObjectStore, Record};

// Re-export key and config types
pub use config::ServiceConfig;
pub use crypto::keys::{RefreshKeyPair, SharedKey, TokenKeys};

// Re-export gate types
pub use auth::{RequestContext, TokenClaims};

// Re-export entity types
pub use model::{
    Account, Alert, AlertPriority, AlertStatus, ApiKey, ApiKeyStatus, Device, Heartbeat, Renewal,
    Scope, Token, TokenType,
};
