//! Fixed-width primitive types shared by every entity.
//!
//! Hashes and addresses are plain byte arrays, compared and stored raw and
//! rendered as hex only at the boundary.

use crate::error::ChainError;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub const HASH_SIZE: usize = 32;
pub const ADDRESS_SIZE: usize = 20;
pub const SIGNATURE_SIZE: usize = 65;

/// 32-byte SHA-256 digest.
pub type Hash = [u8; HASH_SIZE];

/// 20-byte account address.
pub type Address = [u8; ADDRESS_SIZE];

/// The all-zero hash, used as the genesis previous hash and the empty merkle root.
pub const ZERO_HASH: Hash = [0u8; HASH_SIZE];

/// 65-byte recoverable ECDSA signature (64 compact bytes followed by the recovery id).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature(pub [u8; SIGNATURE_SIZE]);

impl Signature {
    pub const fn empty() -> Self {
        Signature([0u8; SIGNATURE_SIZE])
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }
}

impl Default for Signature {
    fn default() -> Self {
        Signature::empty()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0))
    }
}

// serde only derives arrays up to 32 elements, so the signature goes through
// the byte-string path.
impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let buf = serde_bytes::ByteBuf::deserialize(deserializer)?;
        let bytes: [u8; SIGNATURE_SIZE] = buf
            .as_slice()
            .try_into()
            .map_err(|_| <D::Error as DeError>::invalid_length(buf.len(), &"65 signature bytes"))?;
        Ok(Signature(bytes))
    }
}

pub fn hash_to_hex(hash: &Hash) -> String {
    hex::encode(hash)
}

pub fn hash_from_hex(hex_str: &str) -> Result<Hash, ChainError> {
    fixed_from_hex::<HASH_SIZE>(hex_str, "Hash")
}

pub fn address_to_hex(addr: &Address) -> String {
    hex::encode(addr)
}

pub fn address_from_hex(hex_str: &str) -> Result<Address, ChainError> {
    fixed_from_hex::<ADDRESS_SIZE>(hex_str, "Address")
}

pub fn signature_from_hex(hex_str: &str) -> Result<Signature, ChainError> {
    fixed_from_hex::<SIGNATURE_SIZE>(hex_str, "Signature").map(Signature)
}

fn fixed_from_hex<const N: usize>(hex_str: &str, what: &str) -> Result<[u8; N], ChainError> {
    let trimmed = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    let bytes = hex::decode(trimmed)
        .map_err(|e| ChainError::InvalidTransaction(format!("Invalid hex {}: {}", what, e)))?;
    if bytes.len() != N {
        return Err(ChainError::InvalidTransaction(format!(
            "{} must be {} bytes, got {}",
            what,
            N,
            bytes.len()
        )));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}
