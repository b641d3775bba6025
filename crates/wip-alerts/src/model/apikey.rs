//! Long-lived API keys used by reporting clients (alerts, heartbeats).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AlertsError, Result};
use crate::model::new_id;
use crate::store::{EntityKind, ObjectStore, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyStatus {
    Active,
    Inactive,
}

impl ApiKeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiKeyStatus::Active => "active",
            ApiKeyStatus::Inactive => "inactive",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(ApiKeyStatus::Active),
            "inactive" => Some(ApiKeyStatus::Inactive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: String,
    pub description: String,
    pub status: ApiKeyStatus,
    pub created_at: DateTime<Utc>,
}

impl Record for ApiKey {
    fn persistence_id(&self) -> &str {
        &self.id
    }
}

impl ApiKey {
    /// A new, active key.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            description: description.into(),
            status: ApiKeyStatus::Active,
            created_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ApiKeyStatus::Active
    }

    pub fn save(&self, store: &ObjectStore, account_id: &str) -> Result<()> {
        store.save_scoped(EntityKind::ApiKeys, account_id, [self])
    }
}

pub fn list_api_keys(store: &ObjectStore, account_id: &str) -> Result<HashMap<String, ApiKey>> {
    store.list_scoped(EntityKind::ApiKeys, account_id)
}

/// Find a key by id, returning it with its owning account id.
pub fn find_api_key(store: &ObjectStore, api_key_id: &str) -> Result<Option<(ApiKey, String)>> {
    store.find_global(EntityKind::ApiKeys, api_key_id)
}

/// Change the status of one of `account_id`'s keys.
///
/// # Errors
///
/// Returns `AlertsError::ApiKeyNotFound` if the account has no such key.
pub fn set_api_key_status(
    store: &ObjectStore,
    account_id: &str,
    api_key_id: &str,
    status: ApiKeyStatus,
) -> Result<ApiKey> {
    let mut keys = list_api_keys(store, account_id)?;
    let mut key = keys
        .remove(api_key_id)
        .ok_or_else(|| AlertsError::ApiKeyNotFound(api_key_id.to_string()))?;

    log::info!(
        "setting api key {api_key_id} of account {account_id} to {}",
        status.as_str()
    );
    key.status = status;
    key.save(store, account_id)?;
    Ok(key)
}
