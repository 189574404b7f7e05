use crate::error::ChainError;
use crate::primitives::hash_to_hex;
use crate::utxo::OutPoint;
use std::collections::HashMap;

use super::chain::{merkle_root, Block, ChainStatus};

/// The stored hash and merkle root must match what the content hashes to.
pub fn validate_block_integrity(block: &Block) -> Result<(), ChainError> {
    let expected_hash = block.compute_hash()?;
    if expected_hash != block.hash {
        return Err(ChainError::InvalidBlock(format!(
            "Block hash mismatch. Expected {}, but got {}.",
            hash_to_hex(&expected_hash),
            block.hash_hex()
        )));
    }

    let expected_merkle_root = merkle_root(&block.transactions)?;
    if expected_merkle_root != block.header.merkle_root {
        return Err(ChainError::InvalidBlock(format!(
            "Merkle root mismatch. Expected {}, but got {}.",
            hash_to_hex(&expected_merkle_root),
            hash_to_hex(&block.header.merkle_root)
        )));
    }
    Ok(())
}

/// `block` must extend `tip`: genesis on an uninitialized chain, otherwise the
/// next height on top of the tip hash.
pub fn validate_linkage(block: &Block, tip: &ChainStatus) -> Result<(), ChainError> {
    if !tip.is_initialized() {
        if !block.is_genesis() {
            return Err(ChainError::InvalidBlock(format!(
                "Chain is empty; expected a genesis block, but got height {}.",
                block.header.height
            )));
        }
        return Ok(());
    }

    let expected_height = tip.height + 1;
    if block.header.height != expected_height {
        return Err(ChainError::InvalidBlock(format!(
            "Invalid block height. Expected {}, but got {}.",
            expected_height, block.header.height
        )));
    }

    if block.header.prev_hash != tip.hash {
        return Err(ChainError::InvalidBlock(format!(
            "Invalid previous block hash. Expected {}, but got {}.",
            hash_to_hex(&tip.hash),
            hash_to_hex(&block.header.prev_hash)
        )));
    }
    Ok(())
}

pub fn validate_no_double_spend(block: &Block) -> Result<(), ChainError> {
    let mut seen_inputs = HashMap::new();
    for tx in &block.transactions {
        for input in &tx.inputs {
            let outpoint = OutPoint::new(input.tx_id, input.output_index);
            if let Some(conflicting_tx) = seen_inputs.insert(outpoint, tx.id) {
                return Err(ChainError::AlreadySpentOrMissing(format!(
                    "Double spend detected in block. UTXO {}:{} is spent by both {} and {}",
                    hash_to_hex(&input.tx_id),
                    input.output_index,
                    hash_to_hex(&conflicting_tx),
                    tx.id_hex()
                )));
            }
        }
    }
    Ok(())
}

/// Stateless per-transaction checks. Only genesis may carry transactions
/// without inputs.
pub fn validate_transactions(block: &Block) -> Result<(), ChainError> {
    let genesis = block.is_genesis();
    for tx in &block.transactions {
        tx.validate_structure()?;
        if tx.is_issuance() && !genesis {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction {} has no inputs outside the genesis block",
                tx.id_hex()
            )));
        }
        if !tx.is_issuance() && genesis {
            return Err(ChainError::InvalidTransaction(format!(
                "Genesis transaction {} spends inputs",
                tx.id_hex()
            )));
        }
    }
    Ok(())
}
