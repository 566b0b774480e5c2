//! Error types for QuorumChain

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    InvalidSignature,
    InvalidRecipient(String),
    InsufficientBalance { required: u64, available: u64 },
    InvalidNonce { expected: u32, got: u32 },
    ArithmeticOverflow,
    UnknownValidator(String),
    NotAValidator(String),
    NotEnoughStake(u32),
    ChoiceFailed,
    InvalidBlock { tx_index: usize, reason: Box<ChainError> },
    Storage(String),
    Crypto(String),
    Encoding(String),
    Config(String),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChainError::InvalidSignature => write!(f, "Invalid signature"),
            ChainError::InvalidRecipient(addr) => write!(f, "Invalid recipient: {}", addr),
            ChainError::InsufficientBalance {
                required,
                available,
            } => write!(
                f,
                "Insufficient balance: required {}, available {}",
                required, available
            ),
            ChainError::InvalidNonce { expected, got } => {
                write!(f, "Invalid nonce: expected {}, got {}", expected, got)
            }
            ChainError::ArithmeticOverflow => write!(f, "Arithmetic overflow"),
            ChainError::UnknownValidator(wallet) => {
                write!(f, "Validator {} not found", wallet)
            }
            ChainError::NotAValidator(wallet) => {
                write!(f, "{} is not a validator", wallet)
            }
            ChainError::NotEnoughStake(shard) => {
                write!(f, "Not enough stake in shard {}", shard)
            }
            ChainError::ChoiceFailed => write!(f, "Validator could not be chosen"),
            ChainError::InvalidBlock { tx_index, reason } => {
                write!(f, "Invalid block at transaction {}: {}", tx_index, reason)
            }
            ChainError::Storage(msg) => write!(f, "Storage error: {}", msg),
            ChainError::Crypto(msg) => write!(f, "Cryptographic error: {}", msg),
            ChainError::Encoding(msg) => write!(f, "Encoding error: {}", msg),
            ChainError::Config(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for ChainError {}

impl From<rusqlite::Error> for ChainError {
    fn from(err: rusqlite::Error) -> Self {
        ChainError::Storage(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for ChainError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        ChainError::Encoding(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
