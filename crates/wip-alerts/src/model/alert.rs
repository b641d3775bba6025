//! Alerts raised by API-key clients and their review lifecycle.
//!
//! Status moves forward only:
//!
//! ```text
//! new ──▶ seen ──▶ archived
//!  └──────────────────▲
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AlertsError, Result};
use crate::model::new_id;
use crate::store::{EntityKind, ObjectStore, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertPriority {
    High,
    Normal,
    Low,
}

impl AlertPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertPriority::High => "high",
            AlertPriority::Normal => "normal",
            AlertPriority::Low => "low",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "high" => Some(AlertPriority::High),
            "normal" => Some(AlertPriority::Normal),
            "low" => Some(AlertPriority::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    New,
    Seen,
    Archived,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::New => "new",
            AlertStatus::Seen => "seen",
            AlertStatus::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "new" => Some(AlertStatus::New),
            "seen" => Some(AlertStatus::Seen),
            "archived" => Some(AlertStatus::Archived),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, to: AlertStatus) -> bool {
        matches!(
            (self, to),
            (AlertStatus::New, AlertStatus::Seen)
                | (AlertStatus::New, AlertStatus::Archived)
                | (AlertStatus::Seen, AlertStatus::Archived)
        )
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    /// The API key that raised the alert.
    pub api_key_id: String,
    pub title: String,
    pub short_description: String,
    pub long_description: String,
    pub priority: AlertPriority,
    pub status: AlertStatus,
    pub triggered_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Alert {
    fn persistence_id(&self) -> &str {
        &self.id
    }
}

impl Alert {
    pub fn new(
        api_key_id: impl Into<String>,
        title: impl Into<String>,
        short_description: impl Into<String>,
        long_description: impl Into<String>,
        priority: AlertPriority,
        triggered_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            api_key_id: api_key_id.into(),
            title: title.into(),
            short_description: short_description.into(),
            long_description: long_description.into(),
            priority,
            status: AlertStatus::New,
            triggered_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move the alert to `to`, stamping `updated_at` with `at`.
    ///
    /// # Errors
    ///
    /// Returns `AlertsError::InvalidStateTransition` for any move outside
    /// new→seen, new→archived and seen→archived. The alert is unchanged.
    pub fn transition(&mut self, to: AlertStatus, at: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(AlertsError::InvalidStateTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        self.updated_at = at;
        Ok(())
    }

    pub fn is_archived(&self) -> bool {
        self.status == AlertStatus::Archived
    }

    pub fn save(&self, store: &ObjectStore, account_id: &str) -> Result<()> {
        store.save_scoped(EntityKind::Alerts, account_id, [self])
    }
}

pub fn list_alerts(store: &ObjectStore, account_id: &str) -> Result<HashMap<String, Alert>> {
    store.list_scoped(EntityKind::Alerts, account_id)
}

pub fn list_non_archived_alerts(
    store: &ObjectStore,
    account_id: &str,
) -> Result<HashMap<String, Alert>> {
    let mut alerts = list_alerts(store, account_id)?;
    alerts.retain(|_, alert| !alert.is_archived());
    Ok(alerts)
}

/// Find an alert by id, returning it with its owning account id.
pub fn find_alert(store: &ObjectStore, alert_id: &str) -> Result<Option<(Alert, String)>> {
    store.find_global(EntityKind::Alerts, alert_id)
}

/// Transition an alert owned by `account_id` and persist it.
///
/// # Errors
///
/// - `AlertsError::AlertNotFound` if no account holds the alert.
/// - `AlertsError::Unauthorized` if it belongs to a different account.
/// - `AlertsError::InvalidStateTransition` for a disallowed move.
pub fn update_alert_status(
    store: &ObjectStore,
    account_id: &str,
    alert_id: &str,
    to: AlertStatus,
) -> Result<Alert> {
    let (mut alert, owner) = find_alert(store, alert_id)?
        .ok_or_else(|| AlertsError::AlertNotFound(alert_id.to_string()))?;

    if owner != account_id {
        log::warn!("account {account_id} tried to update alert {alert_id} owned by {owner}");
        return Err(AlertsError::Unauthorized(format!(
            "alert {alert_id} does not belong to account {account_id}"
        )));
    }

    alert.transition(to, Utc::now())?;
    alert.save(store, &owner)?;
    log::info!("alert {alert_id} is now {to}");
    Ok(alert)
}
