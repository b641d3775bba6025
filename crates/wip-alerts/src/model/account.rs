//! Accounts, the owning parent of every scoped record.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{new_id, Alert, ApiKey, Device};
use crate::store::{EntityKind, ObjectStore, Record};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

impl Record for Account {
    fn persistence_id(&self) -> &str {
        &self.id
    }
}

impl Account {
    pub fn new() -> Self {
        Self {
            id: new_id(),
            created_at: Utc::now(),
        }
    }

    pub fn save(&self, store: &ObjectStore) -> Result<()> {
        log::info!("saving account {}", self.id);
        store.save_flat(EntityKind::Accounts, self)
    }

    pub fn devices(&self, store: &ObjectStore) -> Result<HashMap<String, Device>> {
        crate::model::device::list_devices(store, &self.id)
    }

    pub fn alerts(&self, store: &ObjectStore) -> Result<HashMap<String, Alert>> {
        crate::model::alert::list_alerts(store, &self.id)
    }

    pub fn api_keys(&self, store: &ObjectStore) -> Result<HashMap<String, ApiKey>> {
        crate::model::apikey::list_api_keys(store, &self.id)
    }
}

impl Default for Account {
    fn default() -> Self {
        Self::new()
    }
}

/// Look up an account by id.
pub fn get_account(store: &ObjectStore, account_id: &str) -> Result<Option<Account>> {
    store.get_flat(EntityKind::Accounts, account_id)
}

/// All accounts keyed by id.
pub fn list_accounts(store: &ObjectStore) -> Result<HashMap<String, Account>> {
    store.list_flat(EntityKind::Accounts)
}
