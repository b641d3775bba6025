//! Request authorization gates.
//!
//! The bearer gate admits requests carrying a valid access token that
//! satisfies a caller-supplied check. The API-key gate admits reporting
//! clients holding an active API key. Both record who was admitted in a
//! [`RequestContext`].

use std::collections::BTreeMap;

use crate::auth::claims::TokenClaims;
use crate::crypto::keys::TokenKeys;
use crate::error::{AlertsError, Result};
use crate::model::apikey::find_api_key;
use crate::store::ObjectStore;

pub const AUTHORIZATION_HEADER: &str = "Authorization";
/// Response header echoing the accepted access token.
pub const BEARER_RESPONSE_HEADER: &str = "Bearer";
pub const API_KEY_HEADER: &str = "APIKey";
pub const API_KEY_QUERY_PARAM: &str = "apiKey";

/// Per-request state written by the gates and read by handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub account_id: Option<String>,
    pub api_key_id: Option<String>,
    pub response_headers: BTreeMap<String, String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Pull the token out of an [`AUTHORIZATION_HEADER`] value of the form
/// `Bearer <token>`.
///
/// The value must split on a single space into exactly two parts.
pub fn extract_bearer(header: Option<&str>) -> Result<&str> {
    let header = header.filter(|h| !h.is_empty()).ok_or_else(|| {
        AlertsError::Unauthorized(format!("no {AUTHORIZATION_HEADER} header"))
    })?;

    match header.split(' ').collect::<Vec<_>>().as_slice() {
        [_, token] => Ok(*token),
        _ => Err(AlertsError::Unauthorized(format!(
            "incomplete {AUTHORIZATION_HEADER} header"
        ))),
    }
}

/// Admit a request holding a valid access token that passes `check`.
///
/// On success the original token is set as the `Bearer` response header.
/// Every failure is `AlertsError::Unauthorized`.
pub fn authorize<F>(
    header: Option<&str>,
    keys: &TokenKeys,
    check: F,
    ctx: &mut RequestContext,
) -> Result<TokenClaims>
where
    F: Fn(&TokenClaims, &mut RequestContext) -> bool,
{
    let token = extract_bearer(header).map_err(|e| {
        log::error!("can not extract token: {e}");
        e
    })?;

    let claims = TokenClaims::decrypt(token, &keys.shared).map_err(|_| {
        log::error!("can not decrypt access token");
        AlertsError::Unauthorized("token error".into())
    })?;

    if !claims.valid() {
        log::error!("token {} is not valid", claims.jti);
        return Err(AlertsError::Unauthorized("invalid token".into()));
    }

    if !check(&claims, ctx) {
        log::error!("authorization check failed for token {}", claims.jti);
        return Err(AlertsError::Unauthorized(
            "authorization check failed".into(),
        ));
    }

    log::info!(
        "granting access to {} with roles: {}",
        claims.sub,
        claims
            .scope
            .roles
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",")
    );
    ctx.response_headers
        .insert(BEARER_RESPONSE_HEADER.to_string(), token.to_string());
    Ok(claims)
}

/// Check passing tokens holding `role`; records the account in the context.
pub fn has_role(
    role: impl Into<String>,
) -> impl Fn(&TokenClaims, &mut RequestContext) -> bool + Clone + Send + Sync {
    let role = role.into();
    move |claims: &TokenClaims, ctx: &mut RequestContext| {
        if claims.has_role(&role) {
            ctx.account_id = Some(claims.sub.clone());
            true
        } else {
            false
        }
    }
}

/// Check passing tokens holding `capability`; records the account in the context.
pub fn has_capability(
    capability: impl Into<String>,
) -> impl Fn(&TokenClaims, &mut RequestContext) -> bool + Clone + Send + Sync {
    let capability = capability.into();
    move |claims: &TokenClaims, ctx: &mut RequestContext| {
        if claims.has_capability(&capability) {
            ctx.account_id = Some(claims.sub.clone());
            true
        } else {
            false
        }
    }
}

/// The API key id from the [`API_KEY_HEADER`] header, else the
/// [`API_KEY_QUERY_PARAM`] query parameter.
pub fn extract_api_key<'a>(header: Option<&'a str>, query: Option<&'a str>) -> Result<&'a str> {
    header
        .filter(|h| !h.is_empty())
        .or_else(|| query.filter(|q| !q.is_empty()))
        .ok_or_else(|| {
            AlertsError::Unauthorized(format!(
                "no api key found as {API_KEY_HEADER} header or {API_KEY_QUERY_PARAM} query parameter"
            ))
        })
}

/// Admit a request holding an active API key.
///
/// Returns `(api_key_id, account_id)` and writes both into the context.
///
/// # Errors
///
/// `AlertsError::Unauthorized` for a missing, unknown or inactive key.
/// Store failures propagate unchanged.
pub fn validate_api_key(
    store: &ObjectStore,
    header: Option<&str>,
    query: Option<&str>,
    ctx: &mut RequestContext,
) -> Result<(String, String)> {
    let api_key_id = extract_api_key(header, query).map_err(|e| {
        log::error!("can not find api key: {e}");
        e
    })?;

    let Some((api_key, account_id)) = find_api_key(store, api_key_id)? else {
        log::error!("unknown api key {api_key_id}");
        return Err(AlertsError::Unauthorized("api key missing".into()));
    };

    if !api_key.is_active() {
        log::error!("api key with id {api_key_id} is not valid");
        return Err(AlertsError::Unauthorized("api key not valid".into()));
    }

    log::info!("granting api level access to api key with id {}", api_key.id);
    ctx.api_key_id = Some(api_key.id.clone());
    ctx.account_id = Some(account_id.clone());
    Ok((api_key.id, account_id))
}
