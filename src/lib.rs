//! utxo-ledger - single-node ledger core for a UTXO-style blockchain
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Chain state machine, genesis, UTXO index updates, transfers
//! - [`transaction`] - Transaction types and validation
//! - [`utxo`] - Unspent outputs and per-address indexes
//! - [`mempool`] - Pending transactions
//!
//! ## Encoding
//! - [`primitives`] - Fixed-width hashes, addresses and signatures
//! - [`keys`] - Storage key families
//! - [`codec`] - Canonical binary encoding of stored values
//!
//! ## Cryptography
//! - [`crypto`] - SHA-256 and secp256k1 key pairs
//!
//! ## State Management
//! - [`persistence`] - Key-value store boundary (SQLite, in-memory)
//! - [`cache`] - Block cache
//!
//! ## Integration
//! - [`node`] - Node bootstrap
//! - [`views`] - JSON views for callers outside the core
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod mempool;
pub mod transaction;
pub mod utxo;

// ============================================================================
// Encoding
// ============================================================================
pub mod codec;
pub mod keys;
pub mod primitives;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// State Management
// ============================================================================
pub mod cache;
pub mod persistence;

// ============================================================================
// Integration
// ============================================================================
pub mod node;
pub mod views;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
