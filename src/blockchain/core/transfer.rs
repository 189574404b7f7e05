use crate::crypto::KeyPair;
use crate::error::ChainError;
use crate::primitives::{hash_to_hex, Address, Hash};
use crate::transaction::{output_type, Transaction, TxInput, TxOutput};
use parking_lot::MutexGuard;
use tracing::{debug, warn};

use super::chain::Blockchain;

impl Blockchain {
    /// Unsigned transfer of `amount` from `from` to `to`.
    ///
    /// Spendable UTXOs are taken in index order until they cover `amount`;
    /// any surplus returns to `from` as a second, general-type output.
    pub fn build_transfer(
        &self,
        from: &Address,
        to: &Address,
        amount: u64,
        memo: &str,
        data: Vec<u8>,
        tx_type: u8,
    ) -> Result<Transaction, ChainError> {
        if amount == 0 {
            return Err(ChainError::InvalidTransaction("Transfer amount must be greater than zero".to_string()));
        }

        // an address that never received funds simply has nothing to spend
        let utxos = match self.get_utxo_list(from) {
            Ok(utxos) => utxos,
            Err(ChainError::NotFound(_)) => Vec::new(),
            Err(e) => return Err(e),
        };

        let mut inputs = Vec::new();
        let mut accumulated = 0u64;
        for utxo in utxos.iter().filter(|utxo| !utxo.spent) {
            if accumulated >= amount {
                break;
            }
            accumulated = accumulated.saturating_add(utxo.amount());
            inputs.push(TxInput::unsigned(utxo.tx_id, utxo.output_index));
        }

        if accumulated < amount {
            return Err(ChainError::InsufficientBalance {
                required: amount,
                available: accumulated,
            });
        }

        let mut outputs = vec![TxOutput::new(*to, amount, tx_type)];
        if accumulated > amount {
            outputs.push(TxOutput::new(*from, accumulated - amount, output_type::GENERAL));
        }

        Transaction::new(self.config.version.transaction, inputs, outputs, memo, data)
    }

    /// Admits `tx` to the mempool after checking it against the committed
    /// UTXO set. Returns the transaction id.
    ///
    /// Holds the commit lock across the check and the insert, so a block
    /// spending the same outputs either lands before the check or evicts the
    /// entry after it.
    pub fn submit_transaction(&self, tx: Transaction) -> Result<Hash, ChainError> {
        let _commit = self.commit_lock.lock();
        self.check_spendable(&tx)?;

        let id = tx.id;
        self.mempool.submit(tx)?;
        debug!("Accepted transaction {} into mempool", hash_to_hex(&id));
        Ok(id)
    }

    /// Drops pending transactions that no longer pass admission against the
    /// committed state. Caller holds the commit lock.
    pub(super) fn evict_unspendable(&self, _guard: &MutexGuard<'_, ()>) -> Result<usize, ChainError> {
        let mut evicted = 0;
        for tx in self.mempool.transactions() {
            match self.check_spendable(&tx) {
                Ok(()) => {}
                Err(
                    e @ (ChainError::AlreadySpentOrMissing(_)
                    | ChainError::InvalidTransaction(_)
                    | ChainError::CryptoError(_)),
                ) => {
                    warn!("Dropping pending transaction {}: {}", tx.id_hex(), e);
                    if self.mempool.delete(&tx.id).is_some() {
                        evicted += 1;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(evicted)
    }

    /// Structure, unspent committed inputs, optional signatures and value
    /// conservation.
    fn check_spendable(&self, tx: &Transaction) -> Result<(), ChainError> {
        tx.validate_structure()?;
        if tx.is_issuance() {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction {} has no inputs; only genesis may issue value",
                tx.id_hex()
            )));
        }

        let mut consumed = 0u64;
        for (index, input) in tx.inputs.iter().enumerate() {
            let utxo = match self.get_utxo(&input.tx_id, input.output_index) {
                Ok(utxo) if !utxo.spent => utxo,
                Ok(_) | Err(ChainError::NotFound(_)) => {
                    return Err(ChainError::AlreadySpentOrMissing(format!(
                        "{}:{} is spent or does not exist",
                        hash_to_hex(&input.tx_id),
                        input.output_index
                    )))
                }
                Err(e) => return Err(e),
            };

            if self.config.chain.verify_signatures {
                tx.verify_input_signature(index, utxo.owner())?;
            }
            consumed = consumed.saturating_add(utxo.amount());
        }

        let produced = tx.total_output()?;
        if produced > consumed {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction {} creates {} from inputs worth {}",
                tx.id_hex(),
                produced,
                consumed
            )));
        }
        Ok(())
    }

    /// `build_transfer` followed by `submit_transaction`. Inputs stay unsigned.
    pub fn transfer(
        &self,
        from: &Address,
        to: &Address,
        amount: u64,
        memo: &str,
        data: Vec<u8>,
        tx_type: u8,
    ) -> Result<Transaction, ChainError> {
        let tx = self.build_transfer(from, to, amount, memo, data, tx_type)?;
        self.submit_transaction(tx.clone())?;
        Ok(tx)
    }

    /// Transfer from the address of `keypair`, signed before submission.
    pub fn transfer_signed(
        &self,
        keypair: &KeyPair,
        to: &Address,
        amount: u64,
        memo: &str,
        data: Vec<u8>,
        tx_type: u8,
    ) -> Result<Transaction, ChainError> {
        let mut tx = self.build_transfer(&keypair.address(), to, amount, memo, data, tx_type)?;
        tx.sign(keypair)?;
        self.submit_transaction(tx.clone())?;
        Ok(tx)
    }
}
