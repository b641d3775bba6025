//! Devices registered to an account.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::new_id;
use crate::store::{EntityKind, ObjectStore, Record};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    /// Identifier reported by the device itself.
    pub device_id: String,
    pub device_type: String,
    /// Free-form JSON document describing the device, stored as a string.
    pub device_info: String,
    pub created_at: DateTime<Utc>,
}

impl Record for Device {
    fn persistence_id(&self) -> &str {
        &self.id
    }
}

impl Device {
    pub fn new(
        device_id: impl Into<String>,
        device_type: impl Into<String>,
        device_info: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            device_id: device_id.into(),
            device_type: device_type.into(),
            device_info: device_info.into(),
            created_at: Utc::now(),
        }
    }
}

pub fn save_devices<'a>(
    store: &ObjectStore,
    account_id: &str,
    devices: impl IntoIterator<Item = &'a Device>,
) -> Result<()> {
    store.save_scoped(EntityKind::Devices, account_id, devices)
}

pub fn list_devices(store: &ObjectStore, account_id: &str) -> Result<HashMap<String, Device>> {
    store.list_scoped(EntityKind::Devices, account_id)
}
