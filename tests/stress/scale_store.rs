//! Scale test: many accounts sharing one object store.
//!
//! Validates owner resolution across namespaces and scoped isolation.

use std::collections::HashMap;

use chrono::Utc;

use wip_alerts::model::account::list_accounts;
use wip_alerts::model::alert::{find_alert, list_alerts};
use wip_alerts::model::apikey::{find_api_key, list_api_keys};
use wip_alerts::model::heartbeat::list_heartbeats;
use wip_alerts::{
    Account, Alert, AlertPriority, ApiKey, EntityKind, Heartbeat, ObjectStore,
};

const ACCOUNTS: usize = 200;

#[test]
fn stress_200_accounts_find_global_owner() {
    let dir = tempfile::tempdir().unwrap();
    let store = ObjectStore::open(dir.path()).unwrap();

    let mut owners: HashMap<String, String> = HashMap::new();
    for i in 0..ACCOUNTS {
        let account = Account::new();
        account.save(&store).unwrap();
        for j in 0..3 {
            let key = ApiKey::new(format!("probe {i}-{j}"));
            key.save(&store, &account.id).unwrap();
            owners.insert(key.id, account.id.clone());
        }
    }

    assert_eq!(list_accounts(&store).unwrap().len(), ACCOUNTS);
    for (key_id, owner) in &owners {
        let (key, found_owner) = find_api_key(&store, key_id).unwrap().unwrap();
        assert_eq!(&key.id, key_id);
        assert_eq!(&found_owner, owner);
    }
    assert!(find_api_key(&store, "no-such-key").unwrap().is_none());

    let all: HashMap<String, Vec<ApiKey>> = store.list_global(EntityKind::ApiKeys).unwrap();
    assert_eq!(all.len(), ACCOUNTS);
    assert!(all.values().all(|keys| keys.len() == 3));
}

#[test]
fn stress_scoped_lists_never_leak_between_accounts() {
    let dir = tempfile::tempdir().unwrap();
    let store = ObjectStore::open(dir.path()).unwrap();
    let now = Utc::now();

    let mut accounts = Vec::new();
    for i in 0..50 {
        let account = Account::new();
        account.save(&store).unwrap();
        let key = ApiKey::new("probe");
        key.save(&store, &account.id).unwrap();

        for n in 0..(i % 5 + 1) {
            Alert::new(&key.id, format!("alert {n}"), "s", "l", AlertPriority::Low, now)
                .save(&store, &account.id)
                .unwrap();
            Heartbeat::new(&key.id, now).save(&store, &account.id).unwrap();
        }
        accounts.push((account.id, key.id, i % 5 + 1));
    }

    for (account_id, key_id, expected) in &accounts {
        let keys = list_api_keys(&store, account_id).unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys.contains_key(key_id));

        let alerts = list_alerts(&store, account_id).unwrap();
        assert_eq!(alerts.len(), *expected);
        assert!(alerts.values().all(|a| &a.api_key_id == key_id));

        for alert_id in alerts.keys() {
            let (_, owner) = find_alert(&store, alert_id).unwrap().unwrap();
            assert_eq!(&owner, account_id);
        }

        let heartbeats = list_heartbeats(&store, account_id).unwrap();
        assert_eq!(heartbeats.len(), *expected);
    }
}

#[test]
fn stress_1000_upserts_into_one_bucket() {
    let dir = tempfile::tempdir().unwrap();
    let store = ObjectStore::open(dir.path()).unwrap();
    let account = Account::new();
    account.save(&store).unwrap();

    let mut keys: Vec<ApiKey> = (0..1000).map(|i| ApiKey::new(format!("k{i}"))).collect();
    store
        .save_scoped(EntityKind::ApiKeys, &account.id, keys.iter())
        .unwrap();

    // Upserting the same ids again replaces, never duplicates.
    for key in keys.iter_mut() {
        key.description.push_str(" (renamed)");
    }
    store
        .save_scoped(EntityKind::ApiKeys, &account.id, keys.iter())
        .unwrap();

    let listed = list_api_keys(&store, &account.id).unwrap();
    assert_eq!(listed.len(), 1000);
    assert!(listed.values().all(|k| k.description.ends_with("(renamed)")));
}
