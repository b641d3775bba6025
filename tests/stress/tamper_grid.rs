//! Stress test: single-character tampering of compact tokens.
//!
//! Every altered token must be rejected under its own suite.

use std::sync::OnceLock;

use chrono::Utc;

use wip_alerts::auth::claims::TokenClaims;
use wip_alerts::{AlertsError, Scope, TokenKeys, TokenType};

fn keys() -> &'static TokenKeys {
    static KEYS: OnceLock<TokenKeys> = OnceLock::new();
    KEYS.get_or_init(|| TokenKeys::generate(2048).expect("key generation"))
}

fn claims(token_type: TokenType, n: usize) -> TokenClaims {
    TokenClaims {
        iat: Utc::now().timestamp(),
        jti: format!("jti-{n}"),
        sub: format!("account-{n}"),
        token_type,
        scope: Scope::new(["user"], ["access_token"]),
    }
}

/// Replace the character at `pos` with a different base64url character.
fn tamper(compact: &str, pos: usize) -> Option<String> {
    let mut bytes = compact.as_bytes().to_vec();
    bytes[pos] = match bytes[pos] {
        b'.' => return None,
        b'A' => b'B',
        _ => b'A',
    };
    String::from_utf8(bytes).ok()
}

#[test]
fn stress_every_position_of_50_access_tokens() {
    let key = &keys().shared;
    let mut checked = 0usize;

    for n in 0..50 {
        let compact = claims(TokenType::AccessToken, n).encrypt(key).unwrap();
        assert!(TokenClaims::decrypt(&compact, key).is_ok());

        for pos in 0..compact.len() {
            let Some(altered) = tamper(&compact, pos) else {
                continue;
            };
            assert!(
                matches!(
                    TokenClaims::decrypt(&altered, key),
                    Err(AlertsError::TokenInvalid)
                ),
                "token {n} accepted with position {pos} altered"
            );
            checked += 1;
        }
    }

    assert!(checked > 50 * 100);
}

#[test]
fn stress_sampled_positions_of_refresh_tokens() {
    let pair = &keys().refresh;

    for n in 0..5 {
        let compact = claims(TokenType::RefreshToken, n).encrypt(pair).unwrap();
        let segments: Vec<&str> = compact.split('.').collect();
        assert_eq!(segments.len(), 5);

        // First, middle and last character of each segment.
        let mut start = 0;
        let mut positions = Vec::new();
        for segment in &segments {
            if !segment.is_empty() {
                positions.extend([start, start + segment.len() / 2, start + segment.len() - 1]);
            }
            start += segment.len() + 1;
        }

        for pos in positions {
            let altered = tamper(&compact, pos).expect("segment positions");
            assert!(
                TokenClaims::decrypt(&altered, pair).is_err(),
                "refresh token {n} accepted with position {pos} altered"
            );
        }
    }
}

#[test]
fn stress_truncated_tokens_rejected() {
    let key = &keys().shared;
    let compact = claims(TokenType::AccessToken, 0).encrypt(key).unwrap();

    for len in 0..compact.len() {
        assert!(
            TokenClaims::decrypt(&compact[..len], key).is_err(),
            "prefix of length {len} accepted"
        );
    }
}
