//! Cryptographic primitives for wip-alerts tokens.
//!
//! This module provides:
//! - The long-lived token keys (pre-shared AES key, RSA refresh key pair)
//! - Compact JWE encryption for the access and refresh cipher suites
//! - Cryptographically secure random number generation

pub mod jwe;
pub mod keys;
pub mod random;
