//! Issued tokens, persisted per account for audit and listing.
//!
//! A stored [`Token`] is never mutated or deleted once written.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::new_id;
use crate::store::{EntityKind, ObjectStore, Record};

/// Which cipher suite a token was produced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    AccessToken,
    RefreshToken,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::AccessToken => "access_token",
            TokenType::RefreshToken => "refresh_token",
        }
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Roles and capabilities carried by a token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub roles: BTreeSet<String>,
    pub capabilities: BTreeSet<String>,
}

impl Scope {
    pub fn new<R, C>(roles: R, capabilities: C) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
            capabilities: capabilities.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Also the `jti` of the encrypted payload.
    pub id: String,
    pub issue_time: DateTime<Utc>,
    pub token_type: TokenType,
    pub scope: Scope,
    /// The compact encrypted form handed to the client.
    pub raw_string: String,
    pub created_at: DateTime<Utc>,
}

// Hand-written so the encrypted form never ends up in logs.
impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("id", &self.id)
            .field("issue_time", &self.issue_time)
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("raw_string", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl Record for Token {
    fn persistence_id(&self) -> &str {
        &self.id
    }
}

impl Token {
    /// A new token record with a fresh id and an empty raw string.
    pub fn new(token_type: TokenType, scope: Scope, issue_time: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            issue_time,
            token_type,
            scope,
            raw_string: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn save(&self, store: &ObjectStore, account_id: &str) -> Result<()> {
        save_tokens(store, account_id, [self])
    }
}

pub fn save_tokens<'a>(
    store: &ObjectStore,
    account_id: &str,
    tokens: impl IntoIterator<Item = &'a Token>,
) -> Result<()> {
    store.save_scoped(EntityKind::Tokens, account_id, tokens)
}

pub fn list_tokens(store: &ObjectStore, account_id: &str) -> Result<HashMap<String, Token>> {
    store.list_scoped(EntityKind::Tokens, account_id)
}

/// Every token of every account, keyed by account id.
pub fn list_all_tokens(store: &ObjectStore) -> Result<HashMap<String, Vec<Token>>> {
    store.list_global(EntityKind::Tokens)
}
