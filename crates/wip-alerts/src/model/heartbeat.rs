//! Heartbeats sent by API-key clients to signal they are still running.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::new_id;
use crate::store::{EntityKind, ObjectStore, Record};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub id: String,
    /// The API key that sent this heartbeat.
    pub api_key_id: String,
    pub executed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Record for Heartbeat {
    fn persistence_id(&self) -> &str {
        &self.id
    }
}

impl Heartbeat {
    pub fn new(api_key_id: impl Into<String>, executed_at: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            api_key_id: api_key_id.into(),
            executed_at,
            created_at: Utc::now(),
        }
    }

    pub fn save(&self, store: &ObjectStore, account_id: &str) -> Result<()> {
        log::debug!(
            "heartbeat {} from api key {} for account {account_id}",
            self.id,
            self.api_key_id
        );
        store.save_scoped(EntityKind::Heartbeats, account_id, [self])
    }
}

pub fn list_heartbeats(store: &ObjectStore, account_id: &str) -> Result<HashMap<String, Heartbeat>> {
    store.list_scoped(EntityKind::Heartbeats, account_id)
}

/// For each API key of the account, the heartbeat with the greatest
/// `executed_at`. Keyed by API key id.
pub fn latest_heartbeat_per_api_key(
    store: &ObjectStore,
    account_id: &str,
) -> Result<HashMap<String, Heartbeat>> {
    let mut latest: HashMap<String, Heartbeat> = HashMap::new();
    for heartbeat in list_heartbeats(store, account_id)?.into_values() {
        match latest.get(&heartbeat.api_key_id) {
            Some(current) if current.executed_at >= heartbeat.executed_at => {}
            _ => {
                latest.insert(heartbeat.api_key_id.clone(), heartbeat);
            }
        }
    }
    Ok(latest)
}
