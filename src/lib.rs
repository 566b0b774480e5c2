//! QuorumChain - a sharded proof-of-stake ledger core
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Ledger stores, block/transaction acceptance rules and
//!   the apply phase
//! - [`types`] - Consensus-critical wire records
//!
//! ## Consensus
//! - [`validators`] - Validator registry, dynasty gating, stake-weighted
//!   leader election and epoch shard rebalance
//!
//! ## Cryptography
//! - [`wallet`] - Wallet keys, ECDSA signatures and the sharded address
//!   codec (secp256k1)
//! - [`schnorr`] - Aggregatable Schnorr signatures for block headers and
//!   cross-shard merkle roots (ristretto255)
//!
//! ## State Management
//! - [`persistence`] - Key-value store backends (SQLite, in-memory)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod types;

// ============================================================================
// Consensus
// ============================================================================
pub mod validators;

// ============================================================================
// Cryptography
// ============================================================================
pub mod schnorr;
pub mod wallet;

// ============================================================================
// State Management
// ============================================================================
pub mod persistence;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
