//! Unspent outputs and the per-address index over them.

use crate::keys;
use crate::primitives::{Address, Hash};
use crate::transaction::TxOutput;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Reference to one output of one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub tx_id: Hash,
    pub output_index: u32,
}

impl OutPoint {
    pub fn new(tx_id: Hash, output_index: u32) -> Self {
        OutPoint { tx_id, output_index }
    }

    pub fn key(&self) -> Vec<u8> {
        keys::utxo_key(&self.tx_id, self.output_index)
    }
}

/// A committed output plus its provenance and consumption state.
///
/// Created unspent when its transaction commits; flips to spent exactly once,
/// at the height of the block that consumes it. Never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub tx_id: Hash,
    pub output_index: u32,
    pub output: TxOutput,
    pub height: u64,
    pub spent: bool,
    pub spent_height: u64,
}

impl Utxo {
    pub fn new(tx_id: Hash, output_index: u32, output: TxOutput, height: u64) -> Self {
        Utxo {
            tx_id,
            output_index,
            output,
            height,
            spent: false,
            spent_height: 0,
        }
    }

    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.tx_id, self.output_index)
    }

    pub fn key(&self) -> Vec<u8> {
        self.outpoint().key()
    }

    pub fn owner(&self) -> &Address {
        &self.output.address
    }

    pub fn amount(&self) -> u64 {
        self.output.amount
    }

    pub fn mark_spent(&mut self, height: u64) {
        self.spent = true;
        self.spent_height = height;
    }
}

/// UTXO keys currently spendable by one address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddrUtxoSet {
    keys: BTreeSet<Vec<u8>>,
}

impl AddrUtxoSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, utxo_key: Vec<u8>) -> bool {
        self.keys.insert(utxo_key)
    }

    pub fn remove(&mut self, utxo_key: &[u8]) -> bool {
        self.keys.remove(utxo_key)
    }

    pub fn contains(&self, utxo_key: &[u8]) -> bool {
        self.keys.contains(utxo_key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vec<u8>> {
        self.keys.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::transaction::output_type;

    #[test]
    fn test_mark_spent_records_height() {
        let mut utxo = Utxo::new([1u8; 32], 0, TxOutput::new([2u8; 20], 50, output_type::GENERAL), 3);
        assert!(!utxo.spent);
        utxo.mark_spent(9);
        assert!(utxo.spent);
        assert_eq!(utxo.spent_height, 9);
        assert_eq!(utxo.height, 3);
    }

    #[test]
    fn test_set_membership() {
        let mut set = AddrUtxoSet::new();
        let key = OutPoint::new([1u8; 32], 0).key();
        assert!(set.insert(key.clone()));
        assert!(!set.insert(key.clone()));
        assert!(set.contains(&key));
        assert!(set.remove(&key));
        assert!(set.is_empty());
    }

    #[test]
    fn test_set_round_trip() {
        let mut set = AddrUtxoSet::new();
        set.insert(OutPoint::new([3u8; 32], 1).key());
        set.insert(OutPoint::new([2u8; 32], 0).key());
        let bytes = codec::encode(&set).unwrap();
        let back: AddrUtxoSet = codec::decode(&bytes, "utxo index").unwrap();
        assert_eq!(back, set);
        assert_eq!(back.len(), 2);
    }
}
