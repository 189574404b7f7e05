/// Validation logic for transactions separated from type definitions
use crate::codec;
use crate::crypto;
use crate::error::ChainError;
use crate::primitives::{address_to_hex, Address};
use crate::transaction::types::{Transaction, MAX_TRANSACTION_SIZE};
use std::collections::HashSet;

impl Transaction {
    /// Maximum memo length (256 characters)
    pub const MAX_MEMO_LENGTH: usize = 256;
    /// Maximum opaque data payload (64KB)
    pub const MAX_DATA_SIZE: usize = 65_536;

    /// Stateless checks: shape, sizes and id integrity. Does not touch the UTXO set.
    pub fn validate_structure(&self) -> Result<(), ChainError> {
        if self.outputs.is_empty() {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction {} has no outputs",
                self.id_hex()
            )));
        }

        if let Some(index) = self.outputs.iter().position(|out| out.amount == 0) {
            return Err(ChainError::InvalidTransaction(format!(
                "Output {} of transaction {} has zero amount",
                index,
                self.id_hex()
            )));
        }

        if self.memo.len() > Self::MAX_MEMO_LENGTH {
            return Err(ChainError::InvalidTransaction(format!(
                "Memo exceeds maximum length of {} characters",
                Self::MAX_MEMO_LENGTH
            )));
        }

        if self.data.len() > Self::MAX_DATA_SIZE {
            return Err(ChainError::InvalidTransaction(format!(
                "Data payload too large: {} bytes (max: {})",
                self.data.len(),
                Self::MAX_DATA_SIZE
            )));
        }

        let mut seen = HashSet::new();
        for input in &self.inputs {
            if !seen.insert((input.tx_id, input.output_index)) {
                return Err(ChainError::InvalidTransaction(format!(
                    "Transaction {} spends {}:{} twice",
                    self.id_hex(),
                    hex::encode(input.tx_id),
                    input.output_index
                )));
            }
        }

        self.total_output()?;
        self.validate_size()?;
        self.validate_id()
    }

    pub fn validate_size(&self) -> Result<(), ChainError> {
        let size = codec::encode(self)?.len();
        if size > MAX_TRANSACTION_SIZE {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction too large: {} bytes (max: {})",
                size, MAX_TRANSACTION_SIZE
            )));
        }
        Ok(())
    }

    pub fn validate_id(&self) -> Result<(), ChainError> {
        let expected = self.compute_id()?;
        if expected != self.id {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction id {} does not match its content (expected {})",
                self.id_hex(),
                hex::encode(expected)
            )));
        }
        Ok(())
    }

    /// Checks that input `index` is signed by the key that owns `owner`.
    pub fn verify_input_signature(&self, index: usize, owner: &Address) -> Result<(), ChainError> {
        let input = self.inputs.get(index).ok_or_else(|| {
            ChainError::InvalidTransaction(format!("Input {} out of range", index))
        })?;

        if !input.is_signed() {
            return Err(ChainError::InvalidTransaction(format!(
                "Input {} of transaction {} is not signed",
                index,
                self.id_hex()
            )));
        }

        let digest = self.signing_digest()?;
        crypto::verify_signature(&input.public_key, &digest, &input.signature)?;

        let signer = crypto::address_from_public_key(&input.public_key);
        if &signer != owner {
            return Err(ChainError::CryptoError(format!(
                "Input {} signed by {} but the output belongs to {}",
                index,
                address_to_hex(&signer),
                address_to_hex(owner)
            )));
        }
        Ok(())
    }
}
