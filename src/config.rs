//! Configuration management for the ledger node

use crate::error::ChainError;
use crate::primitives::{address_from_hex, Address};
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub version: VersionConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub mempool: MempoolConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub genesis: GenesisConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionConfig {
    /// Stamped into every block header.
    #[serde(default = "default_protocol_version")]
    pub protocol: String,
    /// Stamped into every transaction this node builds.
    #[serde(default = "default_transaction_version")]
    pub transaction: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Run on a throwaway in-memory store when the database cannot be opened.
    /// Nothing committed in that mode survives a restart.
    #[serde(default)]
    pub allow_in_memory_fallback: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MempoolConfig {
    #[serde(default = "default_max_txs_per_block")]
    pub max_txs_per_block: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// Reject mempool submissions whose inputs are not signed by the UTXO owner.
    #[serde(default)]
    pub verify_signatures: bool,
    #[serde(default = "default_block_cache_size")]
    pub block_cache_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenesisConfig {
    #[serde(default)]
    pub accounts: Vec<GenesisAccount>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenesisAccount {
    /// 20-byte address as hex, `0x` prefix optional.
    pub address: String,
    pub balance: u64,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            protocol: default_protocol_version(),
            transaction: default_transaction_version(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            allow_in_memory_fallback: false,
        }
    }
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_txs_per_block: default_max_txs_per_block(),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            verify_signatures: false,
            block_cache_size: default_block_cache_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

fn default_protocol_version() -> String {
    "1.0.0".to_string()
}

fn default_transaction_version() -> u32 {
    1
}

fn default_db_path() -> String {
    "./data/ledger.db".to_string()
}

fn default_max_txs_per_block() -> usize {
    crate::mempool::DEFAULT_MAX_TXS_PER_BLOCK
}

fn default_block_cache_size() -> usize {
    crate::cache::BlockCache::DEFAULT_CAPACITY
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ChainError> {
        let config: Config = toml::from_str(s)
            .map_err(|e| ChainError::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        if self.database.path.is_empty() {
            return Err(ChainError::ConfigError("database.path must be set".to_string()));
        }

        if self.mempool.max_txs_per_block == 0 {
            return Err(ChainError::ConfigError(
                "mempool.max_txs_per_block must be greater than zero".to_string(),
            ));
        }

        let accounts = self.genesis_accounts()?;
        if let Some((address, _)) = accounts.iter().find(|(_, balance)| *balance == 0) {
            return Err(ChainError::ConfigError(format!(
                "genesis account {} has zero balance",
                crate::primitives::address_to_hex(address)
            )));
        }
        accounts.iter().try_fold(0u64, |acc, (_, balance)| {
            acc.checked_add(*balance).ok_or_else(|| {
                ChainError::ConfigError("genesis balances overflow u64".to_string())
            })
        })?;

        self.log_level()?;
        Ok(())
    }

    /// Parsed (address, balance) pairs, in file order.
    pub fn genesis_accounts(&self) -> Result<Vec<(Address, u64)>, ChainError> {
        self.genesis
            .accounts
            .iter()
            .map(|account| {
                let address = address_from_hex(&account.address).map_err(|e| {
                    ChainError::ConfigError(format!(
                        "genesis account {:?}: {}",
                        account.address, e
                    ))
                })?;
                Ok((address, account.balance))
            })
            .collect()
    }

    pub fn log_level(&self) -> Result<tracing::Level, ChainError> {
        self.logging.level.parse::<tracing::Level>().map_err(|_| {
            ChainError::ConfigError(format!("unknown logging.level {:?}", self.logging.level))
        })
    }
}

/// Loads `path` (or `config.toml`). A missing file yields defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config, ChainError> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
    let config_str = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(e) => {
            return Err(ChainError::ConfigError(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };
    Config::from_toml_str(&config_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[version]
protocol = "2.1.0"

[database]
path = "/tmp/ledger.db"

[mempool]
max_txs_per_block = 50

[[genesis.accounts]]
address = "0x00000000000000000000000000000000000000a1"
balance = 10000

[[genesis.accounts]]
address = "00000000000000000000000000000000000000b2"
balance = 3300000
"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.version.protocol, "2.1.0");
        assert_eq!(config.version.transaction, 1);
        assert_eq!(config.mempool.max_txs_per_block, 50);
        assert!(!config.database.allow_in_memory_fallback);
        assert!(!config.chain.verify_signatures);

        let accounts = config.genesis_accounts().unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].0[19], 0xa1);
        assert_eq!(accounts[1].1, 3_300_000);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.database.path, "./data/ledger.db");
        assert_eq!(config.log_level().unwrap(), tracing::Level::INFO);
        assert!(config.genesis.accounts.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.database.path, "/tmp/ledger.db");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_addr = "[[genesis.accounts]]\naddress = \"abcd\"\nbalance = 1\n";
        assert!(matches!(Config::from_toml_str(bad_addr), Err(ChainError::ConfigError(_))));

        let zero_cap = "[mempool]\nmax_txs_per_block = 0\n";
        assert!(Config::from_toml_str(zero_cap).is_err());

        let account = format!(
            "[[genesis.accounts]]\naddress = \"{}\"\nbalance = {}\n",
            "11".repeat(20),
            i64::MAX
        );
        let overflow = account.repeat(3);
        assert!(Config::from_toml_str(&overflow).is_err());

        let level = "[logging]\nlevel = \"loud\"\n";
        assert!(Config::from_toml_str(level).is_err());

        assert!(Config::from_toml_str("not = [valid").is_err());
    }
}
