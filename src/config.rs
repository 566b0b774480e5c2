//! Configuration management for QuorumChain

use serde::Deserialize;
use std::fs;

use crate::error::{ChainError, Result};
use crate::wallet::SHARD_COUNT;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub chain: ChainConfig,
}

#[derive(Debug, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_network_id")]
    pub network_id: String,
    /// Shard this node is interested in.
    #[serde(default = "default_shard")]
    pub shard: u32,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_data_dir")]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct ChainConfig {
    /// Unix timestamp of the genesis block; the 5-second slot clock counts
    /// from here.
    #[serde(default = "default_genesis_timestamp")]
    pub genesis_timestamp: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network_id: default_network_id(),
            shard: default_shard(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_data_dir(),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            genesis_timestamp: default_genesis_timestamp(),
        }
    }
}

fn default_network_id() -> String {
    "devnet".to_string()
}

fn default_shard() -> u32 {
    1
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_genesis_timestamp() -> u64 {
    1_538_634_622
}

/// Parses and validates a configuration document.
pub fn parse_config(config_str: &str) -> Result<Config> {
    let config: Config = if config_str.is_empty() {
        Config {
            node: NodeConfig::default(),
            database: DatabaseConfig::default(),
            chain: ChainConfig::default(),
        }
    } else {
        toml::from_str(config_str).map_err(|e| ChainError::Config(e.to_string()))?
    };

    if config.database.path.is_empty() {
        return Err(ChainError::Config(
            "database.path must be set in config.toml".to_string(),
        ));
    }
    if config.node.shard == 0 || config.node.shard > SHARD_COUNT {
        return Err(ChainError::Config(format!(
            "node.shard must be in 1..={}",
            SHARD_COUNT
        )));
    }

    Ok(config)
}

/// Loads `config.toml` from the working directory, falling back to sane
/// defaults when the file is absent.
pub fn load_config() -> Result<Config> {
    let config_str = fs::read_to_string("config.toml").unwrap_or_default();
    parse_config(&config_str)
}
