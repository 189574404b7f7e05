//! Error types for the ledger core

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// Key absent. Expected for new addresses and unmined transactions.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An input references a UTXO that does not exist or was already spent.
    #[error("UTXO already spent or missing: {0}")]
    AlreadySpentOrMissing(String),

    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u64, available: u64 },

    /// Stored bytes failed to decode. Not retryable.
    #[error("Corrupt data: {0}")]
    CorruptData(String),

    #[error("Encoding failure: {0}")]
    EncodingFailure(String),

    /// The atomic batch was rejected; nothing from it was persisted.
    #[error("Store write failure: {0}")]
    StoreWriteFailure(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Cryptographic error: {0}")]
    CryptoError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<rusqlite::Error> for ChainError {
    fn from(err: rusqlite::Error) -> Self {
        ChainError::DatabaseError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
