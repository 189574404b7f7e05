//! Transaction mempool
//!
//! Holds transactions that are not yet in a committed block. Every operation
//! takes the same lock, so an insert or delete is never partially visible.

use crate::error::ChainError;
use crate::primitives::{hash_to_hex, Hash};
use crate::transaction::Transaction;
use crate::utxo::OutPoint;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Default cap on transactions handed to block assembly
pub const DEFAULT_MAX_TXS_PER_BLOCK: usize = 1000;

#[derive(Debug, Default)]
struct PoolInner {
    transactions: HashMap<Hash, Transaction>,
    /// Outputs claimed by some pending transaction.
    claimed: HashSet<OutPoint>,
}

impl PoolInner {
    fn remove(&mut self, id: &Hash) -> Option<Transaction> {
        let tx = self.transactions.remove(id)?;
        for input in &tx.inputs {
            self.claimed.remove(&OutPoint::new(input.tx_id, input.output_index));
        }
        Some(tx)
    }
}

#[derive(Debug)]
pub struct Mempool {
    inner: Mutex<PoolInner>,
    max_txs_per_block: usize,
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

impl Mempool {
    pub fn new() -> Self {
        Self::with_block_cap(DEFAULT_MAX_TXS_PER_BLOCK)
    }

    pub fn with_block_cap(max_txs_per_block: usize) -> Self {
        Mempool {
            inner: Mutex::new(PoolInner::default()),
            max_txs_per_block,
        }
    }

    pub fn max_txs_per_block(&self) -> usize {
        self.max_txs_per_block
    }

    /// Inserts `tx`, rejecting a second entry with the same id or one that
    /// spends an output another pending entry already spends.
    pub fn submit(&self, tx: Transaction) -> Result<(), ChainError> {
        let mut inner = self.inner.lock();
        if inner.transactions.contains_key(&tx.id) {
            return Err(ChainError::DuplicateTransaction(format!(
                "Transaction {} already in mempool",
                tx.id_hex()
            )));
        }

        if let Some(input) = tx
            .inputs
            .iter()
            .find(|input| inner.claimed.contains(&OutPoint::new(input.tx_id, input.output_index)))
        {
            return Err(ChainError::AlreadySpentOrMissing(format!(
                "{}:{} is already spent by a pending transaction",
                hash_to_hex(&input.tx_id),
                input.output_index
            )));
        }

        for input in &tx.inputs {
            inner.claimed.insert(OutPoint::new(input.tx_id, input.output_index));
        }
        debug!("mempool: accepted {} ({} pending)", tx.id_hex(), inner.transactions.len() + 1);
        inner.transactions.insert(tx.id, tx);
        Ok(())
    }

    pub fn get(&self, id: &Hash) -> Option<Transaction> {
        self.inner.lock().transactions.get(id).cloned()
    }

    pub fn contains(&self, id: &Hash) -> bool {
        self.inner.lock().transactions.contains_key(id)
    }

    /// Up to `max_txs_per_block` pending transactions, in no particular order.
    /// The pool is left untouched.
    pub fn drain_for_block(&self) -> Vec<Transaction> {
        let inner = self.inner.lock();
        inner
            .transactions
            .values()
            .take(self.max_txs_per_block)
            .cloned()
            .collect()
    }

    /// Every pending transaction, uncapped.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.inner.lock().transactions.values().cloned().collect()
    }

    pub fn delete(&self, id: &Hash) -> Option<Transaction> {
        let removed = self.inner.lock().remove(id)?;
        debug!("mempool: removed {}", hash_to_hex(id));
        Some(removed)
    }

    /// Removes every listed id under a single lock acquisition.
    pub fn delete_many<'a>(&self, ids: impl IntoIterator<Item = &'a Hash>) -> usize {
        let mut inner = self.inner.lock();
        ids.into_iter().filter(|id| inner.remove(id).is_some()).count()
    }

    /// Drops every pending transaction that spends one of `spent`.
    pub fn delete_conflicting(&self, spent: &HashSet<OutPoint>) -> usize {
        let mut inner = self.inner.lock();
        let doomed: Vec<Hash> = inner
            .transactions
            .values()
            .filter(|tx| {
                tx.inputs
                    .iter()
                    .any(|input| spent.contains(&OutPoint::new(input.tx_id, input.output_index)))
            })
            .map(|tx| tx.id)
            .collect();

        doomed.iter().filter(|id| inner.remove(id).is_some()).count()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.transactions.clear();
        inner.claimed.clear();
    }

    pub fn claimed_outpoints(&self) -> HashSet<OutPoint> {
        self.inner.lock().claimed.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().transactions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{output_type, TxInput, TxOutput};
    use std::sync::Arc;

    fn test_tx(seed: u8) -> Transaction {
        Transaction::new(
            1,
            vec![TxInput::unsigned([seed; 32], 0)],
            vec![TxOutput::new([seed; 20], 1000, output_type::GENERAL)],
            "Test Transaction",
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn test_submit_get_delete() {
        let pool = Mempool::new();
        let tx = test_tx(1);
        pool.submit(tx.clone()).unwrap();
        assert_eq!(pool.get(&tx.id), Some(tx.clone()));

        assert!(pool.delete(&tx.id).is_some());
        assert_eq!(pool.get(&tx.id), None);
        assert!(pool.delete(&tx.id).is_none());
    }

    #[test]
    fn test_duplicate_rejected() {
        let pool = Mempool::new();
        let tx = test_tx(2);
        pool.submit(tx.clone()).unwrap();
        let err = pool.submit(tx).unwrap_err();
        assert!(matches!(err, ChainError::DuplicateTransaction(_)));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_conflicting_spend_rejected() {
        let pool = Mempool::new();
        pool.submit(test_tx(3)).unwrap();

        let mut rival = test_tx(3);
        rival.memo = "rival".to_string();
        rival.finalize_id().unwrap();
        let err = pool.submit(rival).unwrap_err();
        assert!(matches!(err, ChainError::AlreadySpentOrMissing(_)));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_drain_respects_cap_and_keeps_entries() {
        let pool = Mempool::with_block_cap(3);
        for seed in 0..5 {
            pool.submit(test_tx(seed)).unwrap();
        }
        assert_eq!(pool.drain_for_block().len(), 3);
        assert_eq!(pool.len(), 5);
        assert_eq!(pool.transactions().len(), 5);
    }

    #[test]
    fn test_claimed_outpoints_follow_entries() {
        let pool = Mempool::new();
        let tx = test_tx(4);
        let outpoint = OutPoint::new([4u8; 32], 0);
        pool.submit(tx.clone()).unwrap();
        assert!(pool.claimed_outpoints().contains(&outpoint));

        pool.delete(&tx.id);
        assert!(!pool.claimed_outpoints().contains(&outpoint));
    }

    #[test]
    fn test_clear_and_delete_many() {
        let pool = Mempool::new();
        let a = test_tx(5);
        let b = test_tx(6);
        pool.submit(a.clone()).unwrap();
        pool.submit(b.clone()).unwrap();
        assert_eq!(pool.delete_many([&a.id, &[0u8; 32]]), 1);
        assert_eq!(pool.len(), 1);

        pool.clear();
        assert!(pool.is_empty());
        assert!(pool.claimed_outpoints().is_empty());
    }

    #[test]
    fn test_concurrent_submissions() {
        let pool = Arc::new(Mempool::new());
        let handles: Vec<_> = (0..8u8)
            .map(|seed| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || pool.submit(test_tx(seed)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(pool.len(), 8);
    }
}
