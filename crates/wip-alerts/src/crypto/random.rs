//! Secure random number generation.
//!
//! Uses the operating system's cryptographic random source via `rand`.

use rand::RngCore;

/// Fill a buffer with cryptographically secure random bytes.
pub fn fill_random(buf: &mut [u8]) {
    rand::thread_rng().fill_bytes(buf);
}

/// Generate a fixed-size array of cryptographically secure random bytes.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    fill_random(&mut buf);
    buf
}

/// Generate a random 12-byte IV (for AES-GCM).
pub fn random_iv_12() -> [u8; 12] {
    random_bytes()
}

/// Generate a random 16-byte content encryption key (for AES-128-GCM).
pub fn random_cek_16() -> [u8; 16] {
    random_bytes()
}
