//! Renewals: one-time-use exchange records for refresh tokens.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AlertsError, Result};
use crate::model::new_id;
use crate::store::{EntityKind, ObjectStore, Record};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Renewal {
    pub id: String,
    /// Id of the refresh token this renewal was created from.
    pub refresh_token_id: String,
    /// When the renewal was redeemed for an access token.
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Record for Renewal {
    fn persistence_id(&self) -> &str {
        &self.id
    }
}

impl Renewal {
    pub fn new(refresh_token_id: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            refresh_token_id: refresh_token_id.into(),
            used_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    /// Record that the renewal was redeemed at `at`.
    ///
    /// # Errors
    ///
    /// Returns `AlertsError::RenewalAlreadyUsed` if `used_at` is already set;
    /// the original timestamp is kept.
    pub fn mark_used(&mut self, at: DateTime<Utc>) -> Result<()> {
        if self.is_used() {
            return Err(AlertsError::RenewalAlreadyUsed(self.id.clone()));
        }
        self.used_at = Some(at);
        Ok(())
    }

    pub fn save(&self, store: &ObjectStore, account_id: &str) -> Result<()> {
        save_renewals(store, account_id, [self])
    }
}

pub fn save_renewals<'a>(
    store: &ObjectStore,
    account_id: &str,
    renewals: impl IntoIterator<Item = &'a Renewal>,
) -> Result<()> {
    store.save_scoped(EntityKind::Renewals, account_id, renewals)
}

pub fn list_renewals(store: &ObjectStore, account_id: &str) -> Result<HashMap<String, Renewal>> {
    store.list_scoped(EntityKind::Renewals, account_id)
}

/// Find a renewal by id, returning it with its owning account id.
pub fn find_renewal(store: &ObjectStore, renewal_id: &str) -> Result<Option<(Renewal, String)>> {
    store.find_global(EntityKind::Renewals, renewal_id)
}

/// Every renewal of every account, keyed by account id.
pub fn list_all_renewals(store: &ObjectStore) -> Result<HashMap<String, Vec<Renewal>>> {
    store.list_global(EntityKind::Renewals)
}
