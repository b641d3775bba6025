//! Binary record codec.
//!
//! Records are encoded with `bincode`. Decoding always yields owned values,
//! so a decoded record never borrows from the buffer it was read from.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{AlertsError, Result};

/// Encode a record to bytes.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| AlertsError::CodecFailure(format!("encode: {e}")))
}

/// Decode a record from bytes.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| AlertsError::CodecFailure(format!("decode: {e}")))
}
