//! JSON views of ledger entities with hashes and addresses rendered as hex.

use crate::blockchain::{Block, ChainStatus};
use crate::primitives::{address_to_hex, hash_to_hex, Address};
use crate::transaction::{Transaction, TxInput, TxOutput};
use crate::utxo::Utxo;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub height: u64,
    pub hash: String,
    pub initialized: bool,
    pub mempool_size: usize,
}

impl StatusResponse {
    pub fn new(status: &ChainStatus, mempool_size: usize) -> Self {
        Self {
            height: status.height,
            hash: hash_to_hex(&status.hash),
            initialized: status.is_initialized(),
            mempool_size,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BlockView {
    pub hash: String,
    pub version: String,
    pub height: u64,
    pub prev_hash: String,
    pub merkle_root: String,
    pub timestamp: i64,
    pub transactions: Vec<TransactionView>,
}

impl From<&Block> for BlockView {
    fn from(block: &Block) -> Self {
        Self {
            hash: block.hash_hex(),
            version: block.header.version.clone(),
            height: block.header.height,
            prev_hash: hash_to_hex(&block.header.prev_hash),
            merkle_root: hash_to_hex(&block.header.merkle_root),
            timestamp: block.header.timestamp,
            transactions: block.transactions.iter().map(TransactionView::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionView {
    pub id: String,
    pub version: u32,
    pub timestamp: i64,
    pub inputs: Vec<InputView>,
    pub outputs: Vec<OutputView>,
    pub memo: String,
    pub data: String,
}

impl From<&Transaction> for TransactionView {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id_hex(),
            version: tx.version,
            timestamp: tx.timestamp,
            inputs: tx.inputs.iter().map(InputView::from).collect(),
            outputs: tx.outputs.iter().map(OutputView::from).collect(),
            memo: tx.memo.clone(),
            data: hex::encode(&tx.data),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InputView {
    pub tx_id: String,
    pub output_index: u32,
    /// Empty when unsigned.
    pub signature: String,
    pub public_key: String,
}

impl From<&TxInput> for InputView {
    fn from(input: &TxInput) -> Self {
        let signature = if input.signature.is_empty() {
            String::new()
        } else {
            hex::encode(input.signature.as_bytes())
        };
        Self {
            tx_id: hash_to_hex(&input.tx_id),
            output_index: input.output_index,
            signature,
            public_key: hex::encode(&input.public_key),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OutputView {
    pub address: String,
    pub amount: u64,
    pub tx_type: u8,
}

impl From<&TxOutput> for OutputView {
    fn from(output: &TxOutput) -> Self {
        Self {
            address: address_to_hex(&output.address),
            amount: output.amount,
            tx_type: output.tx_type,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UtxoView {
    pub tx_id: String,
    pub output_index: u32,
    pub address: String,
    pub amount: u64,
    pub tx_type: u8,
    pub height: u64,
    pub spent: bool,
    pub spent_height: u64,
}

impl From<&Utxo> for UtxoView {
    fn from(utxo: &Utxo) -> Self {
        Self {
            tx_id: hash_to_hex(&utxo.tx_id),
            output_index: utxo.output_index,
            address: address_to_hex(utxo.owner()),
            amount: utxo.amount(),
            tx_type: utxo.output.tx_type,
            height: utxo.height,
            spent: utxo.spent,
            spent_height: utxo.spent_height,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: u64,
}

impl BalanceResponse {
    pub fn new(address: &Address, balance: u64) -> Self {
        Self {
            address: address_to_hex(address),
            balance,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionLocation {
    pub transaction: TransactionView,
    pub block_hash: String,
}

#[derive(Debug, Serialize)]
pub struct KeyPairResponse {
    pub address: String,
    pub public_key: String,
    pub secret_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::output_type;

    #[test]
    fn test_transaction_view_renders_hex() {
        let tx = Transaction::new(
            1,
            vec![TxInput::unsigned([0xab; 32], 3)],
            vec![TxOutput::new([0x01; 20], 9, output_type::GENERAL)],
            "memo",
            vec![0xde, 0xad],
        )
        .unwrap();
        let json = serde_json::to_value(TransactionView::from(&tx)).unwrap();

        assert_eq!(json["id"], tx.id_hex());
        assert_eq!(json["data"], "dead");
        assert_eq!(json["inputs"][0]["tx_id"], "ab".repeat(32));
        assert_eq!(json["inputs"][0]["signature"], "");
        assert_eq!(json["outputs"][0]["address"], "01".repeat(20));
    }
}
