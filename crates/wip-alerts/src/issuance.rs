//! Token issuance and the one-time renewal protocol.
//!
//! An account is granted one refresh/access token pair. Afterwards the
//! client trades its refresh token for a renewal id, and each renewal can
//! be redeemed once for a new access token.
//!
//! Each step below is its own store call. None of the flows is atomic end
//! to end, and two concurrent redemptions of one renewal can both pass the
//! unused check.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::auth::claims::TokenClaims;
use crate::crypto::keys::TokenKeys;
use crate::error::{AlertsError, Result};
use crate::model::account::get_account;
use crate::model::renewal::{find_renewal, list_all_renewals};
use crate::model::token::{list_all_tokens, list_tokens};
use crate::model::{Renewal, Scope, Token, TokenType};
use crate::store::ObjectStore;

/// Role carried by every issued token.
pub const ROLE_USER: &str = "user";
pub const CAPABILITY_ACCESS_TOKEN: &str = "access_token";
pub const CAPABILITY_REFRESH_TOKEN: &str = "refresh_token";

/// Result of an account grant.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub refresh_token: String,
    pub access_token: String,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair").finish_non_exhaustive()
    }
}

/// Result of a renewal grant.
///
/// The access token has been minted and persisted. If marking the renewal
/// as used failed afterwards, `mark_error` carries that failure and the
/// renewal can still be redeemed again.
#[derive(Debug)]
pub struct RenewalRedemption {
    pub access_token: String,
    pub mark_error: Option<AlertsError>,
}

impl RenewalRedemption {
    /// The access token, or the marking failure if there was one.
    pub fn into_result(self) -> Result<String> {
        match self.mark_error {
            Some(e) => Err(e),
            None => Ok(self.access_token),
        }
    }
}

/// Issues and renews tokens against a store with a fixed key set.
pub struct TokenIssuer<'a> {
    store: &'a ObjectStore,
    keys: &'a TokenKeys,
}

impl<'a> TokenIssuer<'a> {
    pub fn new(store: &'a ObjectStore, keys: &'a TokenKeys) -> Self {
        Self { store, keys }
    }

    /// Grant a refresh and an access token to an account.
    ///
    /// # Errors
    ///
    /// - `AccountNotFound` if the account does not exist.
    /// - `RefreshTokenAlreadyIssued` if the account already holds a refresh token.
    ///
    /// A failure while minting the access token leaves the refresh token
    /// persisted.
    pub fn issue_from_account(&self, account_id: &str) -> Result<TokenPair> {
        let account = get_account(self.store, account_id)?.ok_or_else(|| {
            log::warn!("failed to find matching account for id={account_id}");
            AlertsError::AccountNotFound(account_id.to_string())
        })?;

        let existing = list_tokens(self.store, &account.id)?;
        if existing
            .values()
            .any(|t| t.token_type == TokenType::RefreshToken)
        {
            log::warn!("account {} already has a refresh token", account.id);
            return Err(AlertsError::RefreshTokenAlreadyIssued(account.id));
        }

        let now = Utc::now();
        let refresh_token = self.mint(&account.id, TokenType::RefreshToken, now)?;
        let access_token = self.mint(&account.id, TokenType::AccessToken, now)?;

        log::info!("issued token pair for account {}", account.id);
        Ok(TokenPair {
            refresh_token,
            access_token,
        })
    }

    /// Redeem a renewal for a new access token.
    ///
    /// # Errors
    ///
    /// - `RenewalNotFound` if no account holds the renewal.
    /// - `RenewalAlreadyUsed` if it was redeemed before.
    pub fn issue_from_renewal(&self, renewal_id: &str) -> Result<RenewalRedemption> {
        let (mut renewal, account_id) = find_renewal(self.store, renewal_id)?.ok_or_else(|| {
            log::warn!("failed to find matching renewal for id={renewal_id}");
            AlertsError::RenewalNotFound(renewal_id.to_string())
        })?;

        if renewal.is_used() {
            log::warn!("renewal {renewal_id} has already been used");
            return Err(AlertsError::RenewalAlreadyUsed(renewal.id));
        }

        let now = Utc::now();
        let access_token = self.mint(&account_id, TokenType::AccessToken, now)?;

        let mark_error = renewal
            .mark_used(now)
            .and_then(|()| renewal.save(self.store, &account_id))
            .err();
        match &mark_error {
            Some(e) => log::error!(
                "issued access token for account {account_id} but failed to mark renewal {renewal_id} used: {e}"
            ),
            None => log::info!("redeemed renewal {renewal_id} for account {account_id}"),
        }

        Ok(RenewalRedemption {
            access_token,
            mark_error,
        })
    }

    /// Exchange a refresh token for a new renewal, returning the renewal id.
    ///
    /// # Errors
    ///
    /// `TokenInvalid` if the token does not decrypt under the refresh suite
    /// or is not a refresh token.
    pub fn create_renewal(&self, refresh_token: &str) -> Result<String> {
        let claims = TokenClaims::decrypt(refresh_token, &self.keys.refresh).map_err(|e| {
            log::warn!("failed to decrypt refresh token");
            e
        })?;
        if claims.token_type != TokenType::RefreshToken {
            log::warn!("token {} is not a refresh token", claims.jti);
            return Err(AlertsError::TokenInvalid);
        }

        let renewal = Renewal::new(claims.jti.as_str());
        renewal.save(self.store, &claims.sub)?;
        log::info!("created renewal {} for account {}", renewal.id, claims.sub);
        Ok(renewal.id)
    }

    /// Every issued token, keyed by account id.
    pub fn list_all_tokens(&self) -> Result<HashMap<String, Vec<Token>>> {
        list_all_tokens(self.store)
    }

    /// Every renewal, keyed by account id.
    pub fn list_all_renewals(&self) -> Result<HashMap<String, Vec<Renewal>>> {
        list_all_renewals(self.store)
    }

    /// Create, encrypt and persist one token, returning its compact form.
    fn mint(&self, account_id: &str, token_type: TokenType, now: DateTime<Utc>) -> Result<String> {
        let capability = match token_type {
            TokenType::AccessToken => CAPABILITY_ACCESS_TOKEN,
            TokenType::RefreshToken => CAPABILITY_REFRESH_TOKEN,
        };
        let mut token = Token::new(token_type, Scope::new([ROLE_USER], [capability]), now);
        let claims = TokenClaims::for_token(&token, account_id);

        token.raw_string = match token_type {
            TokenType::AccessToken => claims.encrypt(&self.keys.shared)?,
            TokenType::RefreshToken => claims.encrypt(&self.keys.refresh)?,
        };
        token.save(self.store, account_id)?;
        log::debug!("minted {token_type} {} for account {account_id}", token.id);
        Ok(token.raw_string)
    }
}
