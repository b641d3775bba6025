//! Stress test: concurrent redemption of renewals and concurrent grants.
//!
//! Lookup and marking of a renewal are separate store operations, so
//! simultaneous redemptions of one renewal may each mint a token. These
//! tests bound that behavior: at least one redemption succeeds, every
//! minted token is distinct and persisted, and the renewal ends up used.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;

use wip_alerts::auth::claims::TokenClaims;
use wip_alerts::model::renewal::find_renewal;
use wip_alerts::model::token::list_tokens;
use wip_alerts::{Account, AlertsError, ObjectStore, TokenIssuer, TokenKeys, TokenType};

fn keys() -> &'static TokenKeys {
    static KEYS: OnceLock<TokenKeys> = OnceLock::new();
    KEYS.get_or_init(|| TokenKeys::generate(2048).expect("key generation"))
}

#[test]
fn stress_16_threads_redeem_one_renewal() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ObjectStore::open(dir.path()).unwrap());
    let account = Account::new();
    account.save(&store).unwrap();

    let issuer = TokenIssuer::new(&store, keys());
    let pair = issuer.issue_from_account(&account.id).unwrap();
    let renewal_id = issuer.create_renewal(&pair.refresh_token).unwrap();

    let minted = Arc::new(Mutex::new(Vec::new()));
    let mut handles = Vec::new();

    for _ in 0..16 {
        let store = Arc::clone(&store);
        let minted = Arc::clone(&minted);
        let renewal_id = renewal_id.clone();
        handles.push(thread::spawn(move || {
            let issuer = TokenIssuer::new(&store, keys());
            match issuer.issue_from_renewal(&renewal_id) {
                Ok(redemption) => {
                    let token = redemption.into_result().expect("renewal should be marked");
                    minted.lock().unwrap().push(token);
                }
                Err(AlertsError::RenewalAlreadyUsed(_)) => {}
                Err(e) => panic!("unexpected redemption failure: {e}"),
            }
        }));
    }

    for h in handles {
        h.join().expect("thread panicked");
    }

    let minted = minted.lock().unwrap();
    assert!(!minted.is_empty(), "at least one redemption must succeed");
    let distinct: HashSet<_> = minted.iter().collect();
    assert_eq!(distinct.len(), minted.len());

    for token in minted.iter() {
        let claims = TokenClaims::decrypt(token, &keys().shared).unwrap();
        assert_eq!(claims.sub, account.id);
        assert_eq!(claims.token_type, TokenType::AccessToken);
    }

    let (renewal, _) = find_renewal(&store, &renewal_id).unwrap().unwrap();
    assert!(renewal.is_used());

    // One refresh, one initial access, plus one per successful redemption.
    let tokens = list_tokens(&store, &account.id).unwrap();
    assert_eq!(tokens.len(), 2 + minted.len());

    // Once the dust settles the renewal is spent for good.
    assert!(matches!(
        issuer.issue_from_renewal(&renewal_id),
        Err(AlertsError::RenewalAlreadyUsed(_))
    ));
}

#[test]
fn stress_independent_accounts_renew_in_parallel() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ObjectStore::open(dir.path()).unwrap());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            let account = Account::new();
            account.save(&store).unwrap();
            let issuer = TokenIssuer::new(&store, keys());
            let pair = issuer.issue_from_account(&account.id).unwrap();

            for _ in 0..5 {
                let renewal_id = issuer.create_renewal(&pair.refresh_token).unwrap();
                issuer
                    .issue_from_renewal(&renewal_id)
                    .unwrap()
                    .into_result()
                    .unwrap();
            }
            account.id
        }));
    }

    let accounts: Vec<String> = handles
        .into_iter()
        .map(|h| h.join().expect("thread panicked"))
        .collect();

    // No write was lost between accounts sharing the store.
    for account_id in &accounts {
        assert_eq!(list_tokens(&store, account_id).unwrap().len(), 7);
    }
    let renewals = TokenIssuer::new(&store, keys()).list_all_renewals().unwrap();
    assert_eq!(renewals.len(), 8);
    assert!(renewals
        .values()
        .all(|list| list.len() == 5 && list.iter().all(|r| r.is_used())));
}

#[test]
fn stress_concurrent_account_grants_for_one_account() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ObjectStore::open(dir.path()).unwrap());
    let account = Account::new();
    account.save(&store).unwrap();

    let granted = Arc::new(Mutex::new(0usize));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        let granted = Arc::clone(&granted);
        let account_id = account.id.clone();
        handles.push(thread::spawn(move || {
            match TokenIssuer::new(&store, keys()).issue_from_account(&account_id) {
                Ok(_) => *granted.lock().unwrap() += 1,
                Err(AlertsError::RefreshTokenAlreadyIssued(_)) => {}
                Err(e) => panic!("unexpected grant failure: {e}"),
            }
        }));
    }
    for h in handles {
        h.join().expect("thread panicked");
    }

    // Check and mint are separate store calls, so racing grants may each
    // mint a pair. Every pair is persisted in full.
    let granted = *granted.lock().unwrap();
    assert!(granted >= 1);
    let tokens = list_tokens(&store, &account.id).unwrap();
    let refresh = tokens
        .values()
        .filter(|t| t.token_type == TokenType::RefreshToken)
        .count();
    assert_eq!(refresh, granted);
    assert_eq!(tokens.len(), 2 * granted);

    // After the race, no further grant succeeds.
    assert!(matches!(
        TokenIssuer::new(&store, keys()).issue_from_account(&account.id),
        Err(AlertsError::RefreshTokenAlreadyIssued(_))
    ));
}
