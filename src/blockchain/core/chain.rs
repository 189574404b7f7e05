use crate::cache::BlockCache;
use crate::codec;
use crate::config::Config;
use crate::crypto::{hash_pair, sha256};
use crate::error::ChainError;
use crate::keys::{self, IoIndex};
use crate::mempool::Mempool;
use crate::persistence::{KvStore, WriteBatch};
use crate::primitives::{hash_to_hex, Hash, ZERO_HASH};
use crate::transaction::{Transaction, TxInput, TxOutput};
use crate::utxo::{OutPoint, Utxo};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use super::state::UtxoStage;
use super::validation::{
    validate_block_integrity, validate_linkage, validate_no_double_spend, validate_transactions,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: String,
    pub height: u64,
    pub prev_hash: Hash,
    pub merkle_root: Hash,
    /// Unix seconds
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    /// Hash of `(header, transactions)`. Recomputable from the other fields.
    pub hash: Hash,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Result<Self, ChainError> {
        let mut block = Block {
            header,
            hash: ZERO_HASH,
            transactions,
        };
        block.hash = block.compute_hash()?;
        Ok(block)
    }

    pub fn compute_hash(&self) -> Result<Hash, ChainError> {
        Ok(sha256(&codec::encode(&(&self.header, &self.transactions))?))
    }

    pub fn calculate_merkle_root(transactions: &[Transaction]) -> Result<Hash, ChainError> {
        merkle_root(transactions)
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    pub fn hash_hex(&self) -> String {
        hash_to_hex(&self.hash)
    }

    pub fn is_genesis(&self) -> bool {
        self.header.height == 0 && self.header.prev_hash == ZERO_HASH
    }
}

/// Pairwise SHA-256 over transaction hashes, duplicating the last hash of an
/// odd level. An empty list has the all-zero root.
pub fn merkle_root(transactions: &[Transaction]) -> Result<Hash, ChainError> {
    if transactions.is_empty() {
        return Ok(ZERO_HASH);
    }

    let mut level = transactions
        .iter()
        .map(Transaction::hash)
        .collect::<Result<Vec<Hash>, ChainError>>()?;

    while level.len() > 1 {
        if level.len() % 2 == 1 {
            let last = level[level.len() - 1];
            level.push(last);
        }
        level = level
            .chunks(2)
            .map(|pair| hash_pair(&pair[0], &pair[1]))
            .collect();
    }

    Ok(level[0])
}

/// Snapshot of the chain tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainStatus {
    pub height: u64,
    pub hash: Hash,
}

impl ChainStatus {
    pub const UNINITIALIZED: ChainStatus = ChainStatus {
        height: 0,
        hash: ZERO_HASH,
    };

    pub fn is_initialized(&self) -> bool {
        self.hash != ZERO_HASH
    }
}

pub struct Blockchain {
    pub(super) store: Arc<dyn KvStore>,
    pub(super) mempool: Arc<Mempool>,
    pub(super) config: Config,
    /// Commits hold the write half while their batch is written, so a reader
    /// holding the read half sees either all of a block or none of it.
    pub(super) tip: RwLock<ChainStatus>,
    /// Serializes commits with each other and with mempool admission.
    pub(super) commit_lock: Mutex<()>,
    cache: BlockCache,
}

impl Blockchain {
    /// An unloaded chain over `store`. Call [`Blockchain::load`] or use
    /// [`Blockchain::open`].
    pub fn new(store: Arc<dyn KvStore>, config: Config) -> Self {
        let mempool = Arc::new(Mempool::with_block_cap(config.mempool.max_txs_per_block));
        let cache = BlockCache::new(config.chain.block_cache_size);
        Blockchain {
            store,
            mempool,
            config,
            tip: RwLock::new(ChainStatus::UNINITIALIZED),
            commit_lock: Mutex::new(()),
            cache,
        }
    }

    /// Loads the persisted tip, committing a genesis block when there is none.
    pub fn open(store: Arc<dyn KvStore>, config: Config) -> Result<Self, ChainError> {
        let chain = Self::new(store, config);
        let status = chain.load()?;
        if status.is_initialized() {
            info!(
                "Loaded chain at height {} ({})",
                status.height,
                hash_to_hex(&status.hash)
            );
        } else {
            let genesis = chain.build_genesis()?;
            chain.commit_block(&genesis)?;
        }
        Ok(chain)
    }

    /// Reads the persisted tip. An empty store leaves the chain uninitialized.
    pub fn load(&self) -> Result<ChainStatus, ChainError> {
        let _commit = self.commit_lock.lock();
        let mut tip = self.tip.write();

        let height = match self.store.get(keys::META_TIP_HEIGHT)? {
            Some(bytes) => codec::decode_u64(&bytes, "tip height")?,
            None => {
                *tip = ChainStatus::UNINITIALIZED;
                return Ok(*tip);
            }
        };
        let hash = match self.store.get(keys::META_TIP_HASH)? {
            Some(bytes) => codec::decode_hash(&bytes, "tip hash")?,
            None => {
                return Err(ChainError::CorruptData(
                    "tip height is stored without a tip hash".to_string(),
                ))
            }
        };

        *tip = ChainStatus { height, hash };
        Ok(*tip)
    }

    pub fn status(&self) -> ChainStatus {
        *self.tip.read()
    }

    pub fn get_latest_height(&self) -> u64 {
        self.tip.read().height
    }

    pub fn get_latest_hash(&self) -> Hash {
        self.tip.read().hash
    }

    pub fn mempool(&self) -> &Arc<Mempool> {
        &self.mempool
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Assembles a block from pending transactions. Writes nothing.
    pub fn build_block(&self, prev_hash: Hash, height: u64) -> Result<Block, ChainError> {
        let transactions = self.mempool.drain_for_block();
        self.assemble_block(prev_hash, height, transactions)
    }

    pub(super) fn assemble_block(
        &self,
        prev_hash: Hash,
        height: u64,
        transactions: Vec<Transaction>,
    ) -> Result<Block, ChainError> {
        let header = BlockHeader {
            version: self.config.version.protocol.clone(),
            height,
            prev_hash,
            merkle_root: merkle_root(&transactions)?,
            timestamp: chrono::Utc::now().timestamp(),
        };
        Block::new(header, transactions)
    }

    /// Validates `block` against the tip and persists it, its transactions,
    /// the UTXO changes and the new tip as one atomic batch.
    pub fn commit_block(&self, block: &Block) -> Result<(), ChainError> {
        let guard = self.commit_lock.lock();
        self.commit_locked(&guard, block)
    }

    /// Builds the next block on the current tip and commits it. On an
    /// uninitialized chain this is the genesis block.
    ///
    /// Pending transactions that can no longer be committed are dropped from
    /// the mempool first, so one stale entry cannot stall production.
    pub fn produce_block(&self) -> Result<Block, ChainError> {
        let guard = self.commit_lock.lock();
        let tip = self.status();
        let block = if tip.is_initialized() {
            self.evict_unspendable(&guard)?;
            self.build_block(tip.hash, tip.height + 1)?
        } else {
            self.build_genesis()?
        };
        self.commit_locked(&guard, &block)?;
        Ok(block)
    }

    fn commit_locked(&self, _guard: &MutexGuard<'_, ()>, block: &Block) -> Result<(), ChainError> {
        let tip = self.status();
        validate_block_integrity(block)?;
        validate_linkage(block, &tip)?;
        validate_no_double_spend(block)?;
        validate_transactions(block)?;

        let height = block.header.height;
        let mut batch = WriteBatch::new();
        batch.put(keys::block_key(&block.hash), codec::encode(block)?);
        batch.put(keys::height_key(height), block.hash.to_vec());

        for tx in &block.transactions {
            stage_transaction_records(&mut batch, tx, &block.hash)?;
        }

        let mut stage = UtxoStage::new(self.store.as_ref(), height);
        for tx in &block.transactions {
            stage.apply_transaction(tx)?;
        }
        stage.flush(&mut batch)?;

        batch.put(keys::META_TIP_HEIGHT, codec::encode_u64(height));
        batch.put(keys::META_TIP_HASH, block.hash.to_vec());

        {
            let mut tip = self.tip.write();
            self.store.write_batch(batch)?;
            *tip = ChainStatus {
                height,
                hash: block.hash,
            };
        }

        self.cache.put(block.clone());

        let spent: HashSet<OutPoint> = block
            .transactions
            .iter()
            .flat_map(|tx| &tx.inputs)
            .map(|input| OutPoint::new(input.tx_id, input.output_index))
            .collect();
        let included = self.mempool.delete_many(block.transactions.iter().map(|tx| &tx.id));
        let conflicting = self.mempool.delete_conflicting(&spent);
        if conflicting > 0 {
            debug!("Dropped {} pending transactions that conflict with block {}", conflicting, height);
        }

        info!(
            "Committed block {} at height {} ({} txs, {} evicted from mempool)",
            block.hash_hex(),
            height,
            block.transactions.len(),
            included
        );
        Ok(())
    }

    /// Reads and decodes `key`; absence is `NotFound(what)`.
    pub(super) fn fetch<T: DeserializeOwned>(&self, key: &[u8], what: &str) -> Result<T, ChainError> {
        match self.store.get(key)? {
            Some(bytes) => codec::decode(&bytes, what),
            None => Err(ChainError::NotFound(what.to_string())),
        }
    }

    fn fetch_hash(&self, key: &[u8], what: &str) -> Result<Hash, ChainError> {
        match self.store.get(key)? {
            Some(bytes) => codec::decode_hash(&bytes, what),
            None => Err(ChainError::NotFound(what.to_string())),
        }
    }

    fn block_by_hash_unlocked(&self, hash: &Hash) -> Result<Block, ChainError> {
        if let Some(block) = self.cache.get(hash) {
            return Ok(block);
        }
        let (cached, capacity) = self.cache.stats();
        debug!("Block cache miss for {} ({}/{} cached)", hash_to_hex(hash), cached, capacity);
        let block: Block = self.fetch(&keys::block_key(hash), &format!("block {}", hash_to_hex(hash)))?;
        self.cache.put(block.clone());
        Ok(block)
    }

    pub fn get_block_by_hash(&self, hash: &Hash) -> Result<Block, ChainError> {
        let _tip = self.tip.read();
        self.block_by_hash_unlocked(hash)
    }

    pub fn get_block_by_height(&self, height: u64) -> Result<Block, ChainError> {
        let _tip = self.tip.read();
        let hash = self.fetch_hash(&keys::height_key(height), &format!("block at height {}", height))?;
        self.block_by_hash_unlocked(&hash)
    }

    pub fn get_transaction(&self, id: &Hash) -> Result<Transaction, ChainError> {
        self.fetch(&keys::tx_key(id), &format!("transaction {}", hash_to_hex(id)))
    }

    /// Hash of the block that committed transaction `id`.
    pub fn get_tx_block_hash(&self, id: &Hash) -> Result<Hash, ChainError> {
        self.fetch_hash(&keys::tx_block_key(id), &format!("block for transaction {}", hash_to_hex(id)))
    }

    /// All inputs of `id`, or the single input at `IoIndex::At`.
    pub fn get_tx_inputs(&self, id: &Hash, index: IoIndex) -> Result<Vec<TxInput>, ChainError> {
        let key = keys::tx_inputs_key(id, index);
        let what = format!("inputs of transaction {}", hash_to_hex(id));
        match index {
            IoIndex::Whole => self.fetch(&key, &what),
            IoIndex::At(_) => Ok(vec![self.fetch(&key, &what)?]),
        }
    }

    /// All outputs of `id`, or the single output at `IoIndex::At`.
    pub fn get_tx_outputs(&self, id: &Hash, index: IoIndex) -> Result<Vec<TxOutput>, ChainError> {
        let key = keys::tx_outputs_key(id, index);
        let what = format!("outputs of transaction {}", hash_to_hex(id));
        match index {
            IoIndex::Whole => self.fetch(&key, &what),
            IoIndex::At(_) => Ok(vec![self.fetch(&key, &what)?]),
        }
    }

    pub fn get_utxo(&self, tx_id: &Hash, output_index: u32) -> Result<Utxo, ChainError> {
        self.fetch(
            &keys::utxo_key(tx_id, output_index),
            &format!("utxo {}:{}", hash_to_hex(tx_id), output_index),
        )
    }
}

fn stage_transaction_records(
    batch: &mut WriteBatch,
    tx: &Transaction,
    block_hash: &Hash,
) -> Result<(), ChainError> {
    batch.put(keys::tx_key(&tx.id), codec::encode(tx)?);
    batch.put(keys::tx_block_key(&tx.id), block_hash.to_vec());

    batch.put(keys::tx_inputs_key(&tx.id, IoIndex::Whole), codec::encode(&tx.inputs)?);
    for (index, input) in (0u32..).zip(&tx.inputs) {
        batch.put(keys::tx_inputs_key(&tx.id, IoIndex::At(index)), codec::encode(input)?);
    }

    batch.put(keys::tx_outputs_key(&tx.id, IoIndex::Whole), codec::encode(&tx.outputs)?);
    for (index, output) in (0u32..).zip(&tx.outputs) {
        batch.put(keys::tx_outputs_key(&tx.id, IoIndex::At(index)), codec::encode(output)?);
    }
    Ok(())
}
