use crate::error::ChainError;
use crate::primitives::ZERO_HASH;
use crate::transaction::{output_type, Transaction, TxOutput};
use tracing::info;

use super::chain::{Block, Blockchain};

pub const GENESIS_MEMO: &str = "Ledger Genesis Block";

impl Blockchain {
    /// Height-0 block seeding the configured balances: one input-less
    /// transaction with an output per genesis account, in configured order.
    /// No accounts means a genesis block without transactions.
    pub fn build_genesis(&self) -> Result<Block, ChainError> {
        let accounts = self.config.genesis_accounts()?;

        let transactions = if accounts.is_empty() {
            Vec::new()
        } else {
            let outputs = accounts
                .iter()
                .map(|(address, balance)| TxOutput::new(*address, *balance, output_type::GENERAL))
                .collect();
            vec![Transaction::new(
                self.config.version.transaction,
                Vec::new(),
                outputs,
                GENESIS_MEMO,
                Vec::new(),
            )?]
        };

        let block = self.assemble_block(ZERO_HASH, 0, transactions)?;
        info!(
            "Created genesis block {} with {} accounts",
            block.hash_hex(),
            accounts.len()
        );
        Ok(block)
    }
}
