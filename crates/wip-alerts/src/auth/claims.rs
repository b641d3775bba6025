//! The encrypted token payload.
//!
//! Serialized as JSON before encryption:
//!
//! ```json
//! {"iat":1700000000,"jti":"<token id>","sub":"<account id>",
//!  "type":"access_token","scope":{"roles":["user"],"capabilities":["access_token"]}}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::jwe::{self, KeyManagement};
use crate::error::{AlertsError, Result};
use crate::model::{Scope, Token, TokenType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issue time, unix seconds.
    pub iat: i64,
    /// Token id.
    pub jti: String,
    /// Owning account id.
    pub sub: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub scope: Scope,
}

impl TokenClaims {
    /// Claims describing a token record issued to `account_id`.
    pub fn for_token(token: &Token, account_id: &str) -> Self {
        Self {
            iat: token.issue_time.timestamp(),
            jti: token.id.clone(),
            sub: account_id.to_string(),
            token_type: token.token_type,
            scope: token.scope.clone(),
        }
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    /// Whether the claims may be used as an access token.
    ///
    /// Only the type is checked. There is no expiry policy yet, so the
    /// issue time is never inspected.
    pub fn valid(&self) -> bool {
        self.token_type == TokenType::AccessToken
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.scope.has_role(role)
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.scope.has_capability(capability)
    }

    /// Encrypt into a compact token with `key`'s suite.
    pub fn encrypt<K: KeyManagement>(&self, key: &K) -> Result<String> {
        let payload = serde_json::to_vec(self)
            .map_err(|e| AlertsError::CodecFailure(format!("token claims: {e}")))?;
        jwe::encrypt(&payload, key)
    }

    /// Decrypt a compact token with `key`'s suite.
    ///
    /// Any failure, including a payload that is not well-formed claims,
    /// is `AlertsError::TokenInvalid`.
    pub fn decrypt<K: KeyManagement>(compact: &str, key: &K) -> Result<Self> {
        let payload = jwe::decrypt(compact, key)?;
        serde_json::from_slice(&payload).map_err(|_| AlertsError::TokenInvalid)
    }
}
