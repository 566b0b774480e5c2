//! The validator registry: every staked validator the node knows about,
//! with its dynasty window, shard assignment and Schnorr public key.
//!
//! All mutation funnels through the registry's methods; the backing map sits
//! behind a mutex and is never handed out. Concurrent elections take their
//! snapshot under the same lock, so a shard rebalance (which rewrites every
//! entry) can never interleave with a read.

use std::collections::HashMap;

use curve25519_dalek::ristretto::RistrettoPoint;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{ChainError, Result};
use crate::schnorr;
use crate::wallet::{self, Address};

/// Activation/deactivation delay in blocks. A validator joining (or
/// leaving) only affects elections this many blocks later, so stake moved
/// at the last moment cannot influence an imminent draw.
pub const DYNASTY_DELAY: i64 = 200;

/// `end_dynasty` value of a validator that has not announced withdrawal.
pub const OPEN_DYNASTY: i64 = -1;

#[derive(Debug, Clone)]
pub(crate) struct Validator {
    pub wallet: Address,
    pub stake: u64,
    pub start_dynasty: i64,
    pub end_dynasty: i64,
    pub shard: u32,
    pub public_key: RistrettoPoint,
}

impl Validator {
    /// Dynasty gate: active strictly after the activation delay and, once
    /// withdrawn, strictly before the deactivation delay runs out.
    pub(crate) fn eligible_at(&self, current_block: u64) -> bool {
        let current = current_block as i64;
        self.start_dynasty + DYNASTY_DELAY < current
            && (self.end_dynasty == OPEN_DYNASTY || current < self.end_dynasty + DYNASTY_DELAY)
    }
}

#[derive(Default)]
pub struct ValidatorRegistry {
    pub(crate) inner: Mutex<HashMap<Address, Validator>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_validator(&self, wallet: &str) -> bool {
        self.inner.lock().contains_key(wallet)
    }

    /// Registers a validator. Returns `Ok(true)` if the wallet was already
    /// registered (a no-op, registration is idempotent), `Ok(false)` on a
    /// fresh insert.
    ///
    /// The wallet address must validate and carry parsable shard digits,
    /// and `public_key_bytes` must decode to a group element.
    pub fn add_validator(
        &self,
        wallet: &str,
        stake: u64,
        start_dynasty: i64,
        public_key_bytes: &[u8],
    ) -> Result<bool> {
        let mut inner = self.inner.lock();
        if inner.contains_key(wallet) {
            return Ok(true);
        }

        let public_key = schnorr::point_from_bytes(public_key_bytes)?;

        if !wallet::is_valid_address(wallet) {
            return Err(ChainError::InvalidRecipient(wallet.to_string()));
        }
        let shard = wallet::address_shard(wallet)?;

        debug!(wallet, stake, shard, "registering validator");
        inner.insert(
            wallet.to_string(),
            Validator {
                wallet: wallet.to_string(),
                stake,
                start_dynasty,
                end_dynasty: OPEN_DYNASTY,
                shard,
                public_key,
            },
        );
        Ok(false)
    }

    /// Removes a validator that leaves its job outright.
    pub fn remove_validator(&self, wallet: &str) -> Result<()> {
        match self.inner.lock().remove(wallet) {
            Some(_) => Ok(()),
            None => Err(ChainError::UnknownValidator(wallet.to_string())),
        }
    }

    /// Marks a validator as withdrawing: it stays eligible for
    /// [`DYNASTY_DELAY`] more blocks and then drops out of elections.
    pub fn withdraw_validator(&self, wallet: &str, current_block: i64) -> Result<()> {
        self.with_validator_mut(wallet, |v| v.end_dynasty = current_block)
    }

    /// Adds `delta` to a validator's stake (stake changes arrive as
    /// deposits, so the update is additive).
    pub fn set_stake(&self, wallet: &str, delta: u64) -> Result<()> {
        self.with_validator_mut(wallet, |v| v.stake = v.stake.saturating_add(delta))
    }

    pub fn get_stake(&self, wallet: &str) -> Result<u64> {
        self.with_validator(wallet, |v| v.stake)
    }

    pub fn set_shard(&self, wallet: &str, shard: u32) -> Result<()> {
        self.with_validator_mut(wallet, |v| v.shard = shard)
    }

    pub fn get_shard(&self, wallet: &str) -> Result<u32> {
        self.with_validator(wallet, |v| v.shard)
    }

    pub fn get_schnorr_public_key(&self, wallet: &str) -> Result<RistrettoPoint> {
        self.with_validator(wallet, |v| v.public_key)
    }

    /// Dynasty eligibility of one wallet at `current_block`. Unknown
    /// wallets are simply ineligible.
    pub fn check_dynasty(&self, wallet: &str, current_block: u64) -> bool {
        self.inner
            .lock()
            .get(wallet)
            .map(|v| v.eligible_at(current_block))
            .unwrap_or(false)
    }

    /// Raw count of registered validators on a shard, dynasty gate not
    /// applied.
    pub fn len_validators(&self, shard: u32) -> usize {
        self.inner
            .lock()
            .values()
            .filter(|v| v.shard == shard)
            .count()
    }

    fn with_validator<T>(&self, wallet: &str, f: impl FnOnce(&Validator) -> T) -> Result<T> {
        match self.inner.lock().get(wallet) {
            Some(validator) => Ok(f(validator)),
            None => Err(ChainError::UnknownValidator(wallet.to_string())),
        }
    }

    fn with_validator_mut(
        &self,
        wallet: &str,
        f: impl FnOnce(&mut Validator),
    ) -> Result<()> {
        match self.inner.lock().get_mut(wallet) {
            Some(validator) => {
                f(validator);
                Ok(())
            }
            None => Err(ChainError::UnknownValidator(wallet.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schnorr::SchnorrKeyPair;
    use crate::wallet::KeyPair;

    pub(crate) fn test_validator(shard: u32) -> (Address, [u8; 32]) {
        let wallet = KeyPair::generate().address(shard).unwrap();
        let key = SchnorrKeyPair::generate().public_key_bytes();
        (wallet, key)
    }

    #[test]
    fn test_add_is_idempotent() {
        let registry = ValidatorRegistry::new();
        let (wallet, key) = test_validator(1);

        assert!(!registry.add_validator(&wallet, 50, 0, &key).unwrap());
        assert!(registry.add_validator(&wallet, 999, 0, &key).unwrap());
        // The second registration did not overwrite the stake
        assert_eq!(registry.get_stake(&wallet).unwrap(), 50);
    }

    #[test]
    fn test_shard_read_from_address() {
        let registry = ValidatorRegistry::new();
        let (wallet, key) = test_validator(7);
        registry.add_validator(&wallet, 10, 0, &key).unwrap();
        assert_eq!(registry.get_shard(&wallet).unwrap(), 7);
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let registry = ValidatorRegistry::new();
        let (wallet, key) = test_validator(1);

        // Bytes that are not a group element
        let err = registry
            .add_validator(&wallet, 10, 0, &[0xFFu8; 32])
            .unwrap_err();
        assert!(matches!(err, ChainError::Crypto(_)));

        // An invalid wallet address
        let err = registry
            .add_validator("definitely-not-an-address-of-len34", 10, 0, &key)
            .unwrap_err();
        assert!(matches!(err, ChainError::InvalidRecipient(_)));
    }

    #[test]
    fn test_unknown_validator_errors() {
        let registry = ValidatorRegistry::new();
        let missing = "QrumMissing";

        assert!(matches!(
            registry.get_stake(missing).unwrap_err(),
            ChainError::UnknownValidator(_)
        ));
        assert!(matches!(
            registry.set_stake(missing, 1).unwrap_err(),
            ChainError::UnknownValidator(_)
        ));
        assert!(matches!(
            registry.remove_validator(missing).unwrap_err(),
            ChainError::UnknownValidator(_)
        ));
        assert!(!registry.check_dynasty(missing, 1_000));
    }

    #[test]
    fn test_dynasty_activation_window() {
        let registry = ValidatorRegistry::new();
        let (wallet, key) = test_validator(1);
        registry.add_validator(&wallet, 10, 100, &key).unwrap();

        assert!(!registry.check_dynasty(&wallet, 250));
        assert!(!registry.check_dynasty(&wallet, 300));
        assert!(registry.check_dynasty(&wallet, 301));
    }

    #[test]
    fn test_dynasty_withdrawal_window() {
        let registry = ValidatorRegistry::new();
        let (wallet, key) = test_validator(1);
        registry.add_validator(&wallet, 10, 100, &key).unwrap();
        registry.withdraw_validator(&wallet, 500).unwrap();

        assert!(registry.check_dynasty(&wallet, 650));
        assert!(!registry.check_dynasty(&wallet, 700));
        assert!(!registry.check_dynasty(&wallet, 701));
    }

    #[test]
    fn test_stake_is_additive() {
        let registry = ValidatorRegistry::new();
        let (wallet, key) = test_validator(1);
        registry.add_validator(&wallet, 10, 0, &key).unwrap();

        registry.set_stake(&wallet, 15).unwrap();
        assert_eq!(registry.get_stake(&wallet).unwrap(), 25);
    }

    #[test]
    fn test_len_validators_counts_per_shard() {
        let registry = ValidatorRegistry::new();
        for _ in 0..3 {
            let (wallet, key) = test_validator(2);
            registry.add_validator(&wallet, 1, 0, &key).unwrap();
        }
        let (wallet, key) = test_validator(5);
        registry.add_validator(&wallet, 1, 0, &key).unwrap();

        assert_eq!(registry.len_validators(2), 3);
        assert_eq!(registry.len_validators(5), 1);
        assert_eq!(registry.len_validators(9), 0);
    }

    #[test]
    fn test_schnorr_key_round_trip() {
        let registry = ValidatorRegistry::new();
        let wallet = KeyPair::generate().address(4).unwrap();
        let schnorr_key = SchnorrKeyPair::generate();

        registry
            .add_validator(&wallet, 10, 0, &schnorr_key.public_key_bytes())
            .unwrap();
        let stored = registry.get_schnorr_public_key(&wallet).unwrap();
        assert_eq!(stored.compress(), schnorr_key.public.compress());
    }
}
