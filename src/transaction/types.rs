/// Transaction types for the ledger
use crate::codec;
use crate::crypto::{sha256, KeyPair};
use crate::error::ChainError;
use crate::primitives::{hash_to_hex, Address, Hash, Signature, ZERO_HASH};
use serde::{Deserialize, Serialize};

/// Maximum encoded transaction size in bytes (100KB) to prevent DoS
pub const MAX_TRANSACTION_SIZE: usize = 100_000;

/// Output-type tags. Only plain transfers carry behavior; the rest are reserved.
pub mod output_type {
    pub const GENERAL: u8 = 0;
    pub const STAKING: u8 = 1;
}

/// A claim on a previously committed output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub tx_id: Hash,
    pub output_index: u32,
    pub signature: Signature,
    pub public_key: Vec<u8>,
}

impl TxInput {
    /// An input with its signature and public key left for the wallet to fill in.
    pub fn unsigned(tx_id: Hash, output_index: u32) -> Self {
        TxInput {
            tx_id,
            output_index,
            signature: Signature::empty(),
            public_key: Vec::new(),
        }
    }

    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty() && !self.public_key.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: Address,
    pub amount: u64,
    pub tx_type: u8,
}

impl TxOutput {
    pub fn new(address: Address, amount: u64, tx_type: u8) -> Self {
        TxOutput { address, amount, tx_type }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    /// Hash of every other field. Stale as soon as any of them changes.
    pub id: Hash,
    pub timestamp: i64,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub memo: String,
    pub data: Vec<u8>,
}

#[derive(Serialize)]
struct IdPreimage<'a> {
    version: u32,
    timestamp: i64,
    inputs: &'a [TxInput],
    outputs: &'a [TxOutput],
    memo: &'a str,
    data: &'a [u8],
}

#[derive(Serialize)]
struct OutpointRef<'a> {
    tx_id: &'a Hash,
    output_index: u32,
}

#[derive(Serialize)]
struct SigningPreimage<'a> {
    domain: &'static str,
    version: u32,
    timestamp: i64,
    inputs: Vec<OutpointRef<'a>>,
    outputs: &'a [TxOutput],
    memo: &'a str,
    data: &'a [u8],
}

impl Transaction {
    /// Builds a transaction stamped with the current time and a finalized id.
    pub fn new(
        version: u32,
        inputs: Vec<TxInput>,
        outputs: Vec<TxOutput>,
        memo: impl Into<String>,
        data: Vec<u8>,
    ) -> Result<Self, ChainError> {
        let mut tx = Transaction {
            version,
            id: ZERO_HASH,
            timestamp: chrono::Utc::now().timestamp(),
            inputs,
            outputs,
            memo: memo.into(),
            data,
        };
        tx.finalize_id()?;
        Ok(tx)
    }

    pub fn id_hex(&self) -> String {
        hash_to_hex(&self.id)
    }

    /// Hash over every field except `id`.
    pub fn compute_id(&self) -> Result<Hash, ChainError> {
        let preimage = IdPreimage {
            version: self.version,
            timestamp: self.timestamp,
            inputs: &self.inputs,
            outputs: &self.outputs,
            memo: &self.memo,
            data: &self.data,
        };
        Ok(sha256(&codec::encode(&preimage)?))
    }

    pub fn finalize_id(&mut self) -> Result<(), ChainError> {
        self.id = self.compute_id()?;
        Ok(())
    }

    /// Digest each input signs: the id preimage with signatures and public keys left out.
    pub fn signing_digest(&self) -> Result<Hash, ChainError> {
        let preimage = SigningPreimage {
            domain: "utxo-ledger/tx-sign",
            version: self.version,
            timestamp: self.timestamp,
            inputs: self
                .inputs
                .iter()
                .map(|input| OutpointRef {
                    tx_id: &input.tx_id,
                    output_index: input.output_index,
                })
                .collect(),
            outputs: &self.outputs,
            memo: &self.memo,
            data: &self.data,
        };
        Ok(sha256(&codec::encode(&preimage)?))
    }

    /// Hash of the full canonical encoding, id included. Used as the merkle leaf.
    pub fn hash(&self) -> Result<Hash, ChainError> {
        Ok(sha256(&codec::encode(self)?))
    }

    /// Signs every input with `keypair` and refreshes the id.
    pub fn sign(&mut self, keypair: &KeyPair) -> Result<(), ChainError> {
        let digest = self.signing_digest()?;
        let signature = keypair.sign_digest(&digest)?;
        let public_key = keypair.public_key_bytes().to_vec();
        for input in &mut self.inputs {
            input.signature = signature;
            input.public_key = public_key.clone();
        }
        self.finalize_id()
    }

    pub fn total_output(&self) -> Result<u64, ChainError> {
        self.outputs.iter().try_fold(0u64, |acc, out| {
            acc.checked_add(out.amount).ok_or_else(|| {
                ChainError::InvalidTransaction(format!(
                    "Output total overflows in transaction {}",
                    self.id_hex()
                ))
            })
        })
    }

    /// True for transactions with no inputs; only genesis may carry them.
    pub fn is_issuance(&self) -> bool {
        self.inputs.is_empty()
    }
}
