//! Key families for every stored entity.
//!
//! Keys are a fixed family prefix followed by a hex hash/address and, where
//! applicable, a decimal index. Prefixes never overlap, so each family can be
//! scanned on its own.

use crate::primitives::{address_to_hex, hash_to_hex, Address, Hash};

pub const META_TIP_HEIGHT: &[u8] = b"m:h";
pub const META_TIP_HASH: &[u8] = b"m:blk";

pub const PREFIX_BLOCK: &str = "blk:";
pub const PREFIX_HEIGHT: &str = "hgt:";
pub const PREFIX_TX: &str = "tx:";
pub const PREFIX_TX_BLOCK: &str = "txb:";
pub const PREFIX_TX_INPUTS: &str = "txi:";
pub const PREFIX_TX_OUTPUTS: &str = "txo:";
pub const PREFIX_UTXO: &str = "utxo:";
pub const PREFIX_ADDR_UTXO: &str = "addr:";

/// Selects either the aggregate input/output record or one entry of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoIndex {
    Whole,
    At(u32),
}

impl From<u32> for IoIndex {
    fn from(index: u32) -> Self {
        IoIndex::At(index)
    }
}

pub fn block_key(hash: &Hash) -> Vec<u8> {
    format!("{}{}", PREFIX_BLOCK, hash_to_hex(hash)).into_bytes()
}

pub fn height_key(height: u64) -> Vec<u8> {
    format!("{}{}", PREFIX_HEIGHT, height).into_bytes()
}

pub fn tx_key(id: &Hash) -> Vec<u8> {
    format!("{}{}", PREFIX_TX, hash_to_hex(id)).into_bytes()
}

pub fn tx_block_key(id: &Hash) -> Vec<u8> {
    format!("{}{}", PREFIX_TX_BLOCK, hash_to_hex(id)).into_bytes()
}

pub fn tx_inputs_key(id: &Hash, index: IoIndex) -> Vec<u8> {
    io_key(PREFIX_TX_INPUTS, id, index)
}

pub fn tx_outputs_key(id: &Hash, index: IoIndex) -> Vec<u8> {
    io_key(PREFIX_TX_OUTPUTS, id, index)
}

fn io_key(prefix: &str, id: &Hash, index: IoIndex) -> Vec<u8> {
    match index {
        IoIndex::Whole => format!("{}{}", prefix, hash_to_hex(id)).into_bytes(),
        IoIndex::At(i) => format!("{}{}:{}", prefix, hash_to_hex(id), i).into_bytes(),
    }
}

pub fn utxo_key(tx_id: &Hash, output_index: u32) -> Vec<u8> {
    format!("{}{}:{}", PREFIX_UTXO, hash_to_hex(tx_id), output_index).into_bytes()
}

pub fn addr_utxo_key(address: &Address) -> Vec<u8> {
    format!("{}{}", PREFIX_ADDR_UTXO, address_to_hex(address)).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_PREFIXES: [&str; 8] = [
        PREFIX_BLOCK,
        PREFIX_HEIGHT,
        PREFIX_TX,
        PREFIX_TX_BLOCK,
        PREFIX_TX_INPUTS,
        PREFIX_TX_OUTPUTS,
        PREFIX_UTXO,
        PREFIX_ADDR_UTXO,
    ];

    #[test]
    fn test_prefixes_do_not_nest() {
        for a in ALL_PREFIXES {
            for b in ALL_PREFIXES {
                if a != b {
                    assert!(!a.starts_with(b), "{} starts with {}", a, b);
                }
            }
        }
        for prefix in ALL_PREFIXES {
            assert!(!META_TIP_HEIGHT.starts_with(prefix.as_bytes()));
            assert!(!META_TIP_HASH.starts_with(prefix.as_bytes()));
        }
    }

    #[test]
    fn test_key_formats() {
        let id = [0xabu8; 32];
        let hex_id = "ab".repeat(32);
        assert_eq!(block_key(&id), format!("blk:{}", hex_id).into_bytes());
        assert_eq!(height_key(42), b"hgt:42".to_vec());
        assert_eq!(utxo_key(&id, 3), format!("utxo:{}:3", hex_id).into_bytes());
        assert_eq!(addr_utxo_key(&[0x01; 20]), format!("addr:{}", "01".repeat(20)).into_bytes());
    }

    #[test]
    fn test_whole_and_indexed_share_prefix() {
        let id = [1u8; 32];
        let whole = tx_outputs_key(&id, IoIndex::Whole);
        let first = tx_outputs_key(&id, IoIndex::At(0));
        assert!(first.starts_with(&whole));
        assert_ne!(first, whole);
        assert_ne!(tx_inputs_key(&id, IoIndex::At(0)), tx_outputs_key(&id, IoIndex::At(0)));
    }

    #[test]
    fn test_distinct_entities_get_distinct_keys() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        assert_ne!(tx_key(&a), tx_key(&b));
        assert_ne!(utxo_key(&a, 1), utxo_key(&a, 10));
        assert_ne!(tx_key(&a), tx_block_key(&a));
    }
}
