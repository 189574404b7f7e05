// core.rs splits responsibilities into submodules for easier maintenance.
pub mod chain;
pub mod genesis;
pub mod state;
pub mod transfer;
pub mod validation;

pub use chain::*;
pub use genesis::*;
pub use validation::*;
