//! Ledger stores, genesis bootstrap and the network slot clock.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{ChainError, Result};
use crate::persistence::{KvStore, MemoryStore, SqliteStore};
use crate::types::{self, AccountState, Block, MerkleRootsSigned};
use crate::wallet::{Address, SHARD_COUNT};

/// Fixed slot length of the network clock.
pub const SLOT_SECONDS: i64 = 5;

/// One shard's ledger: account states keyed by address string, blocks keyed
/// by decimal index.
pub struct Blockchain {
    balances: Box<dyn KvStore>,
    blocks: Box<dyn KvStore>,
    pub genesis_timestamp: u64,
    pub current_block: u64,
}

impl Blockchain {
    /// Creates a ledger over in-memory stores.
    pub fn in_memory(genesis_timestamp: u64) -> Self {
        Blockchain {
            balances: Box::new(MemoryStore::new()),
            blocks: Box::new(MemoryStore::new()),
            genesis_timestamp,
            current_block: 0,
        }
    }

    /// Opens (or creates) a ledger under `data_dir`, one SQLite file per
    /// store.
    pub fn open<P: AsRef<Path>>(data_dir: P, genesis_timestamp: u64) -> Result<Self> {
        let dir = data_dir.as_ref();
        fs::create_dir_all(dir)
            .map_err(|e| ChainError::Storage(format!("Failed to create {:?}: {}", dir, e)))?;

        Ok(Blockchain {
            balances: Box::new(SqliteStore::open(dir.join("balances.db"))?),
            blocks: Box::new(SqliteStore::open(dir.join("blocks.db"))?),
            genesis_timestamp,
            current_block: 0,
        })
    }

    /// Returns the state of a wallet, or `None` for an account the ledger
    /// has never seen.
    pub fn get_wallet_state(&self, wallet: &str) -> Result<Option<AccountState>> {
        match self.balances.get(wallet.as_bytes())? {
            Some(raw) => Ok(Some(types::decode(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn set_wallet_state(&self, wallet: &str, state: &AccountState) -> Result<()> {
        self.balances.put(wallet.as_bytes(), &types::encode(state)?)
    }

    /// Persists a block under its decimal index.
    pub fn save_block(&self, block: &Block) -> Result<()> {
        let key = block.index.to_string();
        self.blocks.put(key.as_bytes(), &types::encode(block)?)
    }

    pub fn get_block(&self, index: u64) -> Result<Option<Block>> {
        match self.blocks.get(index.to_string().as_bytes())? {
            Some(raw) => Ok(Some(types::decode(&raw)?)),
            None => Ok(None),
        }
    }

    /// Writes the genesis block for `shard` if no block 0 exists yet and
    /// returns it.
    pub fn bootstrap(&self, miner: Address, shard: u32) -> Result<Block> {
        if let Some(existing) = self.get_block(0)? {
            return Ok(existing);
        }
        let genesis = Block {
            index: 0,
            timestamp: self.genesis_timestamp,
            miner,
            shard,
            transactions: Vec::new(),
        };
        self.save_block(&genesis)?;
        Ok(genesis)
    }

    /// Current block index implied by the wall clock: one slot every
    /// [`SLOT_SECONDS`] since genesis.
    pub fn network_index(&self) -> i64 {
        self.network_index_at(chrono::Utc::now().timestamp())
    }

    /// [`network_index`](Self::network_index) against an explicit clock,
    /// for callers and tests that inject time.
    pub fn network_index_at(&self, now_unix: i64) -> i64 {
        (now_unix - self.genesis_timestamp as i64).div_euclid(SLOT_SECONDS)
    }
}

/// The beacon chain: per-shard stores of signed cross-shard merkle roots.
pub struct BeaconChain {
    merkle_roots: HashMap<u32, Box<dyn KvStore>>,
    pub current_block: HashMap<u32, u64>,
}

impl BeaconChain {
    pub fn in_memory() -> Self {
        let mut merkle_roots: HashMap<u32, Box<dyn KvStore>> = HashMap::new();
        for shard in 1..=SHARD_COUNT {
            merkle_roots.insert(shard, Box::new(MemoryStore::new()));
        }
        BeaconChain {
            merkle_roots,
            current_block: HashMap::new(),
        }
    }

    /// Opens (or creates) the per-shard root stores under `data_dir`.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let dir = data_dir.as_ref();
        fs::create_dir_all(dir)
            .map_err(|e| ChainError::Storage(format!("Failed to create {:?}: {}", dir, e)))?;

        let mut merkle_roots: HashMap<u32, Box<dyn KvStore>> = HashMap::new();
        for shard in 1..=SHARD_COUNT {
            let store = SqliteStore::open(dir.join(format!("merkleroots{}.db", shard)))?;
            merkle_roots.insert(shard, Box::new(store));
        }
        Ok(BeaconChain {
            merkle_roots,
            current_block: HashMap::new(),
        })
    }

    fn shard_store(&self, shard: u32) -> Result<&dyn KvStore> {
        self.merkle_roots
            .get(&shard)
            .map(|b| b.as_ref())
            .ok_or_else(|| ChainError::Storage(format!("No merkle root store for shard {}", shard)))
    }

    /// Persists a signed root at that shard's current index.
    pub fn save_merkle_roots(&self, roots: &MerkleRootsSigned) -> Result<()> {
        let index = self.current_block.get(&roots.shard).copied().unwrap_or(0);
        self.save_merkle_roots_at(roots, index)
    }

    /// Persists a signed root at an explicit index.
    pub fn save_merkle_roots_at(&self, roots: &MerkleRootsSigned, index: u64) -> Result<()> {
        let store = self.shard_store(roots.shard)?;
        debug!(
            shard = roots.shard,
            index,
            root = %hex::encode(&roots.root),
            "saving merkle roots"
        );
        store.put(index.to_string().as_bytes(), &types::encode(roots)?)
    }

    pub fn get_merkle_roots(&self, index: u64, shard: u32) -> Result<Option<MerkleRootsSigned>> {
        let store = self.shard_store(shard)?;
        match store.get(index.to_string().as_bytes())? {
            Some(raw) => Ok(Some(types::decode(&raw)?)),
            None => Ok(None),
        }
    }
}
