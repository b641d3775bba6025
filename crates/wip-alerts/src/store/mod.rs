//! Account-scoped object store.
//!
//! Records are persisted in namespaces ("buckets"), one directory per entity
//! kind. Scoped kinds hold one bucket file per owning account; the flat
//! `Accounts` kind holds a single bucket file.
//!
//! # Directory layout
//!
//! ```text
//! {root}/
//! ├── Accounts.bucket
//! ├── Devices/
//! │   └── {account_id}.bucket
//! ├── Renewals/
//! ├── APIKeys/
//! ├── Heartbeats/
//! ├── Tokens/
//! └── Alerts/
//! ```
//!
//! # Modules
//!
//! - [`bucket`]: on-disk bucket file format and atomic replacement.
//! - [`object_store`]: the transactional [`ObjectStore`].

pub mod bucket;
pub mod object_store;

use serde::{de::DeserializeOwned, Serialize};

pub use object_store::ObjectStore;

/// A persistable record. The persistence id is the record's key in its bucket
/// and must never change after creation.
pub trait Record: Serialize + DeserializeOwned {
    fn persistence_id(&self) -> &str;
}

/// The entity kinds known to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Accounts,
    Devices,
    Renewals,
    ApiKeys,
    Heartbeats,
    Tokens,
    Alerts,
}

impl EntityKind {
    /// Every kind, in bootstrap order.
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Accounts,
        EntityKind::Devices,
        EntityKind::Renewals,
        EntityKind::ApiKeys,
        EntityKind::Heartbeats,
        EntityKind::Tokens,
        EntityKind::Alerts,
    ];

    /// Name of the namespace on disk.
    pub fn bucket_name(self) -> &'static str {
        match self {
            EntityKind::Accounts => "Accounts",
            EntityKind::Devices => "Devices",
            EntityKind::Renewals => "Renewals",
            EntityKind::ApiKeys => "APIKeys",
            EntityKind::Heartbeats => "Heartbeats",
            EntityKind::Tokens => "Tokens",
            EntityKind::Alerts => "Alerts",
        }
    }

    /// Whether records of this kind live under an owning account.
    pub fn is_scoped(self) -> bool {
        !matches!(self, EntityKind::Accounts)
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.bucket_name())
    }
}
