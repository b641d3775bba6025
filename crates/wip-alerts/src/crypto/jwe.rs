//! Compact JWE serialization for the token cipher suites.
//!
//! A compact token is five base64url (no padding) segments joined by `.`:
//!
//! ```text
//! protected-header . encrypted-key . iv . ciphertext . tag
//! ```
//!
//! The content is always AES-128-GCM under a fresh 128-bit content key, with
//! the encoded protected header as additional authenticated data. What
//! differs between suites is how the content key is transported:
//!
//! | suite   | `alg`          | key                          |
//! |---------|----------------|------------------------------|
//! | access  | `A128KW`       | [`SharedKey`] (AES key wrap) |
//! | refresh | `RSA-OAEP-256` | [`RefreshKeyPair`]            |
//!
//! Every decryption failure is reported as `AlertsError::TokenInvalid`
//! with no further detail.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Nonce};
use aes_kw::KekAes128;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rsa::Oaep;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::crypto::keys::{RefreshKeyPair, SharedKey};
use crate::crypto::random::{random_cek_16, random_iv_12};
use crate::error::{AlertsError, Result};

/// Content encryption algorithm shared by both suites.
pub const CONTENT_ENCRYPTION: &str = "A128GCM";

const CEK_LEN: usize = 16;
const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;
/// AES key wrap adds one 8-byte integrity block.
const WRAPPED_CEK_LEN: usize = CEK_LEN + 8;

/// How a suite transports the content encryption key.
pub trait KeyManagement {
    /// The `alg` header value of the suite.
    const ALG: &'static str;

    fn wrap_cek(&self, cek: &[u8; CEK_LEN]) -> Result<Vec<u8>>;

    /// `None` on any failure; the caller maps it to `TokenInvalid`.
    fn unwrap_cek(&self, encrypted_key: &[u8]) -> Option<Zeroizing<[u8; CEK_LEN]>>;
}

impl KeyManagement for SharedKey {
    const ALG: &'static str = "A128KW";

    fn wrap_cek(&self, cek: &[u8; CEK_LEN]) -> Result<Vec<u8>> {
        let kek = KekAes128::from(*self.as_bytes());
        let mut wrapped = vec![0u8; WRAPPED_CEK_LEN];
        kek.wrap(cek, &mut wrapped)
            .map_err(|e| AlertsError::Crypto(format!("key wrap: {e}")))?;
        Ok(wrapped)
    }

    fn unwrap_cek(&self, encrypted_key: &[u8]) -> Option<Zeroizing<[u8; CEK_LEN]>> {
        if encrypted_key.len() != WRAPPED_CEK_LEN {
            return None;
        }
        let kek = KekAes128::from(*self.as_bytes());
        let mut cek = Zeroizing::new([0u8; CEK_LEN]);
        kek.unwrap(encrypted_key, &mut cek[..]).ok()?;
        Some(cek)
    }
}

impl KeyManagement for RefreshKeyPair {
    const ALG: &'static str = "RSA-OAEP-256";

    fn wrap_cek(&self, cek: &[u8; CEK_LEN]) -> Result<Vec<u8>> {
        self.public_key()
            .encrypt(&mut rand::thread_rng(), Oaep::new::<Sha256>(), cek)
            .map_err(|e| AlertsError::Crypto(format!("rsa-oaep: {e}")))
    }

    fn unwrap_cek(&self, encrypted_key: &[u8]) -> Option<Zeroizing<[u8; CEK_LEN]>> {
        let plain = Zeroizing::new(
            self.private_key()
                .decrypt(Oaep::new::<Sha256>(), encrypted_key)
                .ok()?,
        );
        let cek: [u8; CEK_LEN] = plain.as_slice().try_into().ok()?;
        Some(Zeroizing::new(cek))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ProtectedHeader {
    alg: String,
    enc: String,
}

/// Encrypt `payload` into a compact token under `key`'s suite.
pub fn encrypt<K: KeyManagement>(payload: &[u8], key: &K) -> Result<String> {
    let header = ProtectedHeader {
        alg: K::ALG.to_string(),
        enc: CONTENT_ENCRYPTION.to_string(),
    };
    let header_json = serde_json::to_vec(&header)
        .map_err(|e| AlertsError::CodecFailure(format!("protected header: {e}")))?;
    let protected = URL_SAFE_NO_PAD.encode(header_json);

    let cek = Zeroizing::new(random_cek_16());
    let iv = random_iv_12();
    let encrypted_key = key.wrap_cek(&cek)?;

    let cipher = Aes128Gcm::new_from_slice(&cek[..])
        .map_err(|e| AlertsError::Crypto(format!("cipher init: {e}")))?;
    let mut ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&iv),
            Payload {
                msg: payload,
                aad: protected.as_bytes(),
            },
        )
        .map_err(|e| AlertsError::Crypto(format!("content encryption: {e}")))?;
    let tag = ciphertext.split_off(ciphertext.len() - TAG_LEN);

    Ok([
        protected,
        URL_SAFE_NO_PAD.encode(encrypted_key),
        URL_SAFE_NO_PAD.encode(iv),
        URL_SAFE_NO_PAD.encode(ciphertext),
        URL_SAFE_NO_PAD.encode(tag),
    ]
    .join("."))
}

/// Decrypt a compact token produced by [`encrypt`] with the same suite.
///
/// # Errors
///
/// `AlertsError::TokenInvalid` for a malformed string, the other suite's
/// header, the wrong key, or any tampered segment.
pub fn decrypt<K: KeyManagement>(compact: &str, key: &K) -> Result<Vec<u8>> {
    open(compact, key).ok_or(AlertsError::TokenInvalid)
}

fn open<K: KeyManagement>(compact: &str, key: &K) -> Option<Vec<u8>> {
    let segments: Vec<&str> = compact.split('.').collect();
    let [protected, encrypted_key, iv, ciphertext, tag] = segments.as_slice() else {
        return None;
    };

    let header: ProtectedHeader = serde_json::from_slice(&decode_segment(protected)?).ok()?;
    if header.alg != K::ALG || header.enc != CONTENT_ENCRYPTION {
        return None;
    }

    let encrypted_key = decode_segment(encrypted_key)?;
    let iv = decode_segment(iv)?;
    let mut sealed = decode_segment(ciphertext)?;
    let tag = decode_segment(tag)?;
    if iv.len() != IV_LEN || tag.len() != TAG_LEN {
        return None;
    }

    let cek = key.unwrap_cek(&encrypted_key)?;
    let cipher = Aes128Gcm::new_from_slice(&cek[..]).ok()?;
    sealed.extend_from_slice(&tag);
    cipher
        .decrypt(
            Nonce::from_slice(&iv),
            Payload {
                msg: &sealed,
                aad: protected.as_bytes(),
            },
        )
        .ok()
}

/// Strict base64url: no padding, no trailing bits.
fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(segment).ok()
}
