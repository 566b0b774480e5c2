// Thin re-export module: the registry proper lives in
// `validators/registry.rs`, the deterministic election and shard rebalance
// logic in `validators/election.rs`.

pub mod election;
pub mod registry;

pub use election::*;
pub use registry::*;
