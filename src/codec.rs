//! Canonical binary encoding of stored values.
//!
//! Fixed-width little-endian integers, trailing bytes rejected. Encoding
//! failures surface before anything reaches the store; decoding failures on
//! stored bytes mean the database is corrupt.

use crate::error::ChainError;
use crate::primitives::{Hash, HASH_SIZE};
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
}

pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, ChainError> {
    options()
        .serialize(value)
        .map_err(|e| ChainError::EncodingFailure(e.to_string()))
}

/// Decodes a stored record. `what` names the record in the error.
pub fn decode<T: DeserializeOwned>(bytes: &[u8], what: &str) -> Result<T, ChainError> {
    options()
        .deserialize(bytes)
        .map_err(|e| ChainError::CorruptData(format!("Failed to decode {}: {}", what, e)))
}

pub fn encode_u64(value: u64) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

pub fn decode_u64(bytes: &[u8], what: &str) -> Result<u64, ChainError> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| {
        ChainError::CorruptData(format!("{} must be 8 bytes, got {}", what, bytes.len()))
    })?;
    Ok(u64::from_le_bytes(raw))
}

pub fn decode_hash(bytes: &[u8], what: &str) -> Result<Hash, ChainError> {
    bytes.try_into().map_err(|_| {
        ChainError::CorruptData(format!(
            "{} must be {} bytes, got {}",
            what,
            HASH_SIZE,
            bytes.len()
        ))
    })
}
