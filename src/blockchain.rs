// Thin re-export module: the ledger is split into `blockchain/chain.rs`
// (stores, genesis, slot clock) and `blockchain/validation.rs` (acceptance
// rules and the apply phase).

pub mod chain;
pub mod validation;

pub use chain::*;
pub use validation::*;
