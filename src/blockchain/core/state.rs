use crate::codec;
use crate::error::ChainError;
use crate::keys;
use crate::persistence::{KvStore, WriteBatch};
use crate::primitives::{address_to_hex, hash_to_hex, Address, Hash};
use crate::transaction::{Transaction, TxInput, TxOutput};
use crate::utxo::{AddrUtxoSet, OutPoint, Utxo};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::debug;

use super::chain::Blockchain;

/// UTXO and address-index changes of one block, staged in memory until they
/// are flushed into the commit batch.
///
/// Records are read through the stage, so a transaction may spend an output
/// created earlier in the same block and several outputs may land in the same
/// address set without clobbering each other.
pub(crate) struct UtxoStage<'a> {
    store: &'a dyn KvStore,
    height: u64,
    utxos: HashMap<OutPoint, Utxo>,
    sets: HashMap<Address, AddrUtxoSet>,
}

impl<'a> UtxoStage<'a> {
    pub(crate) fn new(store: &'a dyn KvStore, height: u64) -> Self {
        UtxoStage {
            store,
            height,
            utxos: HashMap::new(),
            sets: HashMap::new(),
        }
    }

    fn utxo_mut(&mut self, outpoint: OutPoint) -> Result<Option<&mut Utxo>, ChainError> {
        if let Entry::Vacant(slot) = self.utxos.entry(outpoint) {
            match self.store.get(&outpoint.key())? {
                Some(bytes) => {
                    slot.insert(codec::decode(&bytes, "utxo")?);
                }
                None => return Ok(None),
            }
        }
        Ok(self.utxos.get_mut(&outpoint))
    }

    fn set_mut(&mut self, address: &Address) -> Result<&mut AddrUtxoSet, ChainError> {
        match self.sets.entry(*address) {
            Entry::Occupied(slot) => Ok(slot.into_mut()),
            Entry::Vacant(slot) => {
                let set = match self.store.get(&keys::addr_utxo_key(address))? {
                    Some(bytes) => codec::decode(&bytes, "utxo index")?,
                    None => AddrUtxoSet::new(),
                };
                Ok(slot.insert(set))
            }
        }
    }

    /// Marks the output behind `input` spent and drops it from its owner's
    /// index. Returns the amount consumed.
    pub(crate) fn spend(&mut self, input: &TxInput) -> Result<u64, ChainError> {
        let outpoint = OutPoint::new(input.tx_id, input.output_index);
        let height = self.height;

        let (owner, amount, key) = match self.utxo_mut(outpoint)? {
            Some(utxo) if !utxo.spent => {
                utxo.mark_spent(height);
                (*utxo.owner(), utxo.amount(), utxo.key())
            }
            Some(_) => {
                return Err(ChainError::AlreadySpentOrMissing(format!(
                    "{}:{} is already spent",
                    hash_to_hex(&input.tx_id),
                    input.output_index
                )))
            }
            None => {
                return Err(ChainError::AlreadySpentOrMissing(format!(
                    "{}:{} does not exist",
                    hash_to_hex(&input.tx_id),
                    input.output_index
                )))
            }
        };

        self.set_mut(&owner)?.remove(&key);
        debug!(
            "utxo: spent {}:{} ({}) at height {}",
            hash_to_hex(&input.tx_id),
            input.output_index,
            amount,
            height
        );
        Ok(amount)
    }

    pub(crate) fn create(&mut self, tx_id: Hash, output_index: u32, output: &TxOutput) -> Result<(), ChainError> {
        let utxo = Utxo::new(tx_id, output_index, output.clone(), self.height);
        let key = utxo.key();
        self.utxos.insert(utxo.outpoint(), utxo);
        self.set_mut(&output.address)?.insert(key);
        Ok(())
    }

    /// Spends every input, then creates every output. A transaction with
    /// inputs may not create more value than it consumes.
    pub(crate) fn apply_transaction(&mut self, tx: &Transaction) -> Result<(), ChainError> {
        let mut consumed = 0u64;
        for input in &tx.inputs {
            let amount = self.spend(input)?;
            consumed = consumed.checked_add(amount).ok_or_else(|| {
                ChainError::InvalidTransaction(format!("Input total overflows in transaction {}", tx.id_hex()))
            })?;
        }

        if !tx.is_issuance() {
            let produced = tx.total_output()?;
            if produced > consumed {
                return Err(ChainError::InvalidTransaction(format!(
                    "Transaction {} creates {} from inputs worth {}",
                    tx.id_hex(),
                    produced,
                    consumed
                )));
            }
        }

        for (index, output) in (0u32..).zip(&tx.outputs) {
            self.create(tx.id, index, output)?;
        }
        Ok(())
    }

    /// Writes every touched UTXO and address set into `batch`.
    pub(crate) fn flush(self, batch: &mut WriteBatch) -> Result<(), ChainError> {
        for utxo in self.utxos.values() {
            batch.put(utxo.key(), codec::encode(utxo)?);
        }
        for (address, set) in &self.sets {
            batch.put(keys::addr_utxo_key(address), codec::encode(set)?);
        }
        Ok(())
    }
}

impl Blockchain {
    /// UTXOs indexed under `address`, minus those a pending transaction
    /// already spends. `NotFound` when the address has never received funds.
    pub fn get_utxo_list(&self, address: &Address) -> Result<Vec<Utxo>, ChainError> {
        let _tip = self.tip.read();
        let set: AddrUtxoSet = self.fetch(
            &keys::addr_utxo_key(address),
            &format!("utxo index for {}", address_to_hex(address)),
        )?;

        let claimed = self.mempool.claimed_outpoints();
        let mut utxos = Vec::with_capacity(set.len());
        for key in set.iter() {
            let utxo: Utxo = self.fetch(key, "utxo referenced by address index")?;
            if !claimed.contains(&utxo.outpoint()) {
                utxos.push(utxo);
            }
        }
        Ok(utxos)
    }

    pub fn get_balance(&self, address: &Address) -> Result<u64, ChainError> {
        self.get_utxo_list(address)?
            .iter()
            .filter(|utxo| !utxo.spent)
            .try_fold(0u64, |acc, utxo| {
                acc.checked_add(utxo.amount()).ok_or_else(|| {
                    ChainError::CorruptData(format!("Balance of {} overflows", address_to_hex(address)))
                })
            })
    }
}
