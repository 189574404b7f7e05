use crate::blockchain::Blockchain;
use crate::config::{Config, DatabaseConfig};
use crate::error::ChainError;
use crate::persistence::{Database, InMemoryStore, KvStore};
use crate::primitives::Address;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Consensus participant. Only the record exists; no validator role runs yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validator {
    pub address: Address,
    pub public_key: Vec<u8>,
    pub voting_power: u64,
    pub active: bool,
}

pub struct Node {
    pub config: Config,
    pub blockchain: Arc<Blockchain>,
}

impl Node {
    /// Store, then chain (committing genesis on first start).
    pub fn init(config: Config) -> Result<Self, ChainError> {
        info!(
            "Starting ledger node (protocol {}, db {})",
            config.version.protocol, config.database.path
        );

        let store = open_store(&config.database)?;
        let blockchain = Arc::new(Blockchain::open(store, config.clone())?);

        let status = blockchain.status();
        info!("Chain ready at height {}", status.height);
        Ok(Self { config, blockchain })
    }

    pub fn run_validator(&self, _validator: &Validator) -> Result<(), ChainError> {
        Err(ChainError::NotImplemented(
            "validator role is not available on this node".to_string(),
        ))
    }
}

/// Opens the SQLite store at `database.path`, creating its directory. When the
/// database cannot be opened this is a `DatabaseError`, unless
/// `allow_in_memory_fallback` is set, in which case the node runs on an
/// in-memory store instead.
pub fn open_store(database: &DatabaseConfig) -> Result<Arc<dyn KvStore>, ChainError> {
    let db_path = Path::new(&database.path);
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                ChainError::IoError(format!("Failed to create data dir {:?}: {}", parent, e))
            })?;
        }
    }

    let store: Arc<dyn KvStore> = match Database::open(db_path) {
        Ok(db) => Arc::new(db),
        Err(e) if !database.allow_in_memory_fallback => return Err(e),
        Err(e) => {
            warn!(
                "Failed to open DB at {}: {}. Falling back to in-memory store.",
                database.path, e
            );
            Arc::new(InMemoryStore::new())
        }
    };
    Ok(store)
}
