//! Blocks, the chain that links them, UTXO state and block-level
//! validation.

pub mod block;
pub mod chain;
pub mod state;
pub mod validation;

pub use block::*;
pub use chain::*;
pub use state::*;
pub use validation::*;
