#![forbid(unsafe_code)]
//! Command-line front end for a single ledger node

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use utxo_ledger::config::load_config;
use utxo_ledger::crypto::KeyPair;
use utxo_ledger::error::ChainError;
use utxo_ledger::node::{Node, Validator};
use utxo_ledger::primitives::{address_from_hex, address_to_hex, hash_from_hex};
use utxo_ledger::transaction::output_type;
use utxo_ledger::views::{
    BalanceResponse, BlockView, KeyPairResponse, StatusResponse, TransactionLocation,
    TransactionView, UtxoView,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shows the chain tip
    Status,
    /// Shows a block by height or by hash
    Block {
        #[arg(long, conflicts_with = "hash", required_unless_present = "hash")]
        height: Option<u64>,
        #[arg(long)]
        hash: Option<String>,
    },
    /// Shows a committed transaction and its block
    Tx { id: String },
    /// Lists spendable UTXOs of an address
    Utxos { address: String },
    /// Shows the balance of an address
    Balance { address: String },
    /// Builds a transfer, submits it and commits it in a new block
    Transfer {
        /// Sender address; implied by --secret-key when that is given
        #[arg(long, required_unless_present = "secret_key")]
        from: Option<String>,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: u64,
        #[arg(long, default_value = "")]
        memo: String,
        /// Hex secret key used to sign every input
        #[arg(long)]
        secret_key: Option<String>,
    },
    /// Generates a new key pair
    Keygen,
    /// Runs the consensus validator role
    Validator {
        #[arg(long)]
        address: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level()?)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Keygen = cli.command {
        let keypair = KeyPair::generate();
        return print_json(&KeyPairResponse {
            address: address_to_hex(&keypair.address()),
            public_key: hex::encode(keypair.public_key_bytes()),
            secret_key: hex::encode(keypair.secret_key.secret_bytes()),
        });
    }

    let node = Node::init(config)?;
    let chain = &node.blockchain;

    match cli.command {
        Commands::Status => {
            print_json(&StatusResponse::new(&chain.status(), chain.mempool().len()))?;
        }
        Commands::Block { height, hash } => {
            let block = match (height, hash) {
                (Some(height), _) => chain.get_block_by_height(height)?,
                (None, Some(hash)) => chain.get_block_by_hash(&hash_from_hex(&hash)?)?,
                (None, None) => return Err("either --height or --hash is required".into()),
            };
            print_json(&BlockView::from(&block))?;
        }
        Commands::Tx { id } => {
            let id = hash_from_hex(&id)?;
            let tx = chain.get_transaction(&id)?;
            let block_hash = chain.get_tx_block_hash(&id)?;
            print_json(&TransactionLocation {
                transaction: TransactionView::from(&tx),
                block_hash: hex::encode(block_hash),
            })?;
        }
        Commands::Utxos { address } => {
            let utxos = chain.get_utxo_list(&address_from_hex(&address)?)?;
            let views: Vec<UtxoView> = utxos.iter().filter(|u| !u.spent).map(UtxoView::from).collect();
            print_json(&views)?;
        }
        Commands::Balance { address } => {
            let address = address_from_hex(&address)?;
            let balance = match chain.get_balance(&address) {
                Ok(balance) => balance,
                Err(ChainError::NotFound(_)) => 0,
                Err(e) => return Err(e.into()),
            };
            print_json(&BalanceResponse::new(&address, balance))?;
        }
        Commands::Transfer {
            from,
            to,
            amount,
            memo,
            secret_key,
        } => {
            let to = address_from_hex(&to)?;
            let tx = match (secret_key, from) {
                (Some(secret), _) => {
                    let keypair = KeyPair::from_secret_bytes(&hex::decode(secret.trim_start_matches("0x"))?)?;
                    chain.transfer_signed(&keypair, &to, amount, &memo, Vec::new(), output_type::GENERAL)?
                }
                (None, Some(from)) => chain.transfer(
                    &address_from_hex(&from)?,
                    &to,
                    amount,
                    &memo,
                    Vec::new(),
                    output_type::GENERAL,
                )?,
                (None, None) => return Err("either --from or --secret-key is required".into()),
            };
            let block = chain.produce_block()?;
            print_json(&TransactionLocation {
                transaction: TransactionView::from(&tx),
                block_hash: block.hash_hex(),
            })?;
        }
        Commands::Validator { address } => {
            let validator = Validator {
                address: address_from_hex(&address)?,
                public_key: Vec::new(),
                voting_power: 0,
                active: false,
            };
            node.run_validator(&validator)?;
        }
        Commands::Keygen => {}
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
