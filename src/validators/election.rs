//! Deterministic leader election and epoch shard rebalance.
//!
//! Every node must reproduce an identical draw from the same inputs, so the
//! generator is pinned: a fresh `ChaCha8Rng` seeded from the block index (or
//! epoch seed) per call, threaded as a value. All draws are integer draws;
//! there is no floating point anywhere in the election path.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::error::{ChainError, Result};
use crate::wallet::{Address, SHARD_COUNT};

use super::registry::ValidatorRegistry;

/// Roulette-wheel walk: the first entry whose cumulative stake reaches
/// `level` wins. `entries` must already be in the canonical order (stake
/// descending, wallet ascending on ties).
fn pick_by_stake(entries: &[(Address, u64)], level: u128) -> Option<&Address> {
    let mut cumulative: u128 = 0;
    for (wallet, stake) in entries {
        cumulative += *stake as u128;
        if cumulative >= level {
            return Some(wallet);
        }
    }
    None
}

impl ValidatorRegistry {
    /// Selects the proposer for `block_index` on `shard`, randomly but
    /// proportionally to stake.
    ///
    /// Candidates are the dynasty-eligible validators of the shard, ordered
    /// by stake descending with the wallet string breaking ties. The winner
    /// is drawn with a single uniform level in `[0, total_stake)` against
    /// the cumulative stakes. Deterministic: the same registry contents and
    /// block index select the same wallet on every node.
    pub fn choose_validator(&self, block_index: u64, shard: u32) -> Result<Address> {
        let mut rng = ChaCha8Rng::seed_from_u64(block_index);

        let mut candidates: Vec<(Address, u64)> = self
            .inner
            .lock()
            .values()
            .filter(|v| v.eligible_at(block_index) && v.shard == shard)
            .map(|v| (v.wallet.clone(), v.stake))
            .collect();

        let total_stake: u128 = candidates.iter().map(|(_, stake)| *stake as u128).sum();
        if total_stake < 1 {
            return Err(ChainError::NotEnoughStake(shard));
        }

        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let level = rng.gen_range(0..total_stake);
        let winner = pick_by_stake(&candidates, level)
            .cloned()
            .ok_or(ChainError::ChoiceFailed)?;

        debug!(block_index, shard, %winner, "chose validator");
        Ok(winner)
    }

    /// Reassigns a shard to every dynasty-eligible validator for this epoch
    /// seed and returns the full assignment map.
    ///
    /// This is the epoch rebalance, not a lookup: the whole registry is
    /// rewritten under a single lock acquisition, so no election can read a
    /// half-rebalanced shard layout. The eligible set is shuffled from the
    /// seeded stream and each validator then draws a shard in
    /// `1..=SHARD_COUNT` in permuted order.
    pub fn rebalance_shards(
        &self,
        seed: u64,
        current_block: u64,
    ) -> Result<HashMap<Address, u32>> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut inner = self.inner.lock();

        let mut eligible: Vec<Address> = inner
            .values()
            .filter(|v| v.eligible_at(current_block))
            .map(|v| v.wallet.clone())
            .collect();

        // Canonical order first: map iteration order must not leak into the
        // permutation.
        eligible.sort();
        eligible.shuffle(&mut rng);

        let mut assignment = HashMap::with_capacity(eligible.len());
        for wallet in eligible {
            let shard = rng.gen_range(1..=SHARD_COUNT);
            if let Some(validator) = inner.get_mut(&wallet) {
                validator.shard = shard;
            }
            assignment.insert(wallet, shard);
        }

        debug!(seed, reassigned = assignment.len(), "rebalanced shards");
        Ok(assignment)
    }

    /// The shard `wallet` lands on for this epoch seed.
    ///
    /// Derived from [`rebalance_shards`](Self::rebalance_shards), so calling
    /// it reassigns every eligible validator as a side effect; that is the
    /// load-balancing contract, not an accident.
    pub fn choose_shard(&self, seed: u64, current_block: u64, wallet: &str) -> Result<u32> {
        let assignment = self.rebalance_shards(seed, current_block)?;
        assignment
            .get(wallet)
            .copied()
            .ok_or_else(|| ChainError::NotAValidator(wallet.to_string()))
    }
}
