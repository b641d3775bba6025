//! Long-lived token keys.
//!
//! The pre-shared AES-128 key protects access tokens. The RSA key pair
//! protects refresh tokens. Both are loaded once at startup and then only
//! read.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::crypto::random::random_bytes;
use crate::error::{AlertsError, Result};

/// Length of the pre-shared access token key in bytes.
pub const SHARED_KEY_LEN: usize = 16;

/// Smallest RSA modulus accepted for the refresh key pair.
pub const MIN_RSA_BITS: usize = 2048;

/// The pre-shared 128-bit key wrapping access token content keys.
///
/// Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedKey([u8; SHARED_KEY_LEN]);

impl SharedKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        Self(random_bytes())
    }

    /// Build a key from raw bytes; exactly 16 are required.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let key: [u8; SHARED_KEY_LEN] = bytes.try_into().map_err(|_| {
            AlertsError::InvalidKey(format!(
                "shared key must be {SHARED_KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(key))
    }

    /// Build a key from standard (padded) base64.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            STANDARD
                .decode(encoded.trim())
                .map_err(|e| AlertsError::InvalidKey(format!("shared key base64: {e}")))?,
        );
        Self::from_bytes(&bytes)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; SHARED_KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedKey(<redacted>)")
    }
}

/// RSA key pair used for RSA-OAEP-256 refresh tokens.
#[derive(Clone)]
pub struct RefreshKeyPair {
    private: RsaPrivateKey,
    public: RsaPublicKey,
}

impl RefreshKeyPair {
    /// Generate a new key pair with a modulus of `bits` bits.
    pub fn generate(bits: usize) -> Result<Self> {
        if bits < MIN_RSA_BITS {
            return Err(AlertsError::InvalidKey(format!(
                "refresh key must be at least {MIN_RSA_BITS} bits, got {bits}"
            )));
        }
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), bits)
            .map_err(|e| AlertsError::InvalidKey(format!("rsa key generation: {e}")))?;
        Ok(Self::from_private_key(private))
    }

    /// Load a private key from a PKCS#8 PEM document.
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self> {
        let private = RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| AlertsError::InvalidKey(format!("refresh key pem: {e}")))?;
        if private.size() * 8 < MIN_RSA_BITS {
            return Err(AlertsError::InvalidKey(format!(
                "refresh key must be at least {MIN_RSA_BITS} bits"
            )));
        }
        Ok(Self::from_private_key(private))
    }

    /// Encode the private key as PKCS#8 PEM. The returned string is zeroized on drop.
    pub fn to_pkcs8_pem(&self) -> Result<Zeroizing<String>> {
        self.private
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| AlertsError::InvalidKey(format!("refresh key pem: {e}")))
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.public.size() * 8
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    pub(crate) fn private_key(&self) -> &RsaPrivateKey {
        &self.private
    }

    fn from_private_key(private: RsaPrivateKey) -> Self {
        let public = RsaPublicKey::from(&private);
        Self { private, public }
    }
}

impl std::fmt::Debug for RefreshKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshKeyPair")
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}

/// Both token keys, built once at startup and passed by reference.
#[derive(Debug, Clone)]
pub struct TokenKeys {
    pub shared: SharedKey,
    pub refresh: RefreshKeyPair,
}

impl TokenKeys {
    pub fn new(shared: SharedKey, refresh: RefreshKeyPair) -> Self {
        Self { shared, refresh }
    }

    /// Generate a fresh shared key and a refresh key pair of `rsa_bits` bits.
    pub fn generate(rsa_bits: usize) -> Result<Self> {
        Ok(Self {
            shared: SharedKey::generate(),
            refresh: RefreshKeyPair::generate(rsa_bits)?,
        })
    }
}

/// One generated key set shared by every unit test in the crate.
#[cfg(test)]
pub(crate) fn test_keys() -> &'static TokenKeys {
    static KEYS: std::sync::OnceLock<TokenKeys> = std::sync::OnceLock::new();
    KEYS.get_or_init(|| TokenKeys::generate(MIN_RSA_BITS).unwrap())
}
