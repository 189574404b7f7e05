// Thin re-export module: implementation is in `blockchain/core.rs`, split by
// responsibility (chain state, genesis, UTXO index, transfers, validation).

pub mod core;
pub use core::*;
