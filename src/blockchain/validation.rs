//! Transaction and block acceptance rules.
//!
//! Validation is a pure check: it never writes to the ledger. Accepting a
//! block produces a [`BlockOverlay`] of pending sender debits which the
//! separate apply phase persists (and only the apply phase credits
//! recipients — funds received in a block are spendable from the next one).

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::error::{ChainError, Result};
use crate::types::{AccountState, Block, Transaction};
use crate::wallet::{self, Address};

use super::chain::Blockchain;

/// Pending account states produced while validating one block: every sender
/// debited so far, keyed by address. Consumed by
/// [`Blockchain::apply_block`].
pub type BlockOverlay = HashMap<Address, AccountState>;

fn verify_tx_signature(tx: &Transaction) -> Result<()> {
    let message = tx.signing_bytes()?;
    wallet::verify_signature(&tx.sender, &tx.r, &tx.s, &message)
}

/// Applies the balance and nonce rules to `state` and returns the debited
/// account state on success.
///
/// Required balance is `amount + gas`; if that sum overflows the
/// transaction can never be afforded, so the failure is reported as an
/// insufficient balance with the requirement saturated.
fn debit(tx: &Transaction, state: &AccountState) -> Result<AccountState> {
    let required = tx
        .required_balance()
        .ok_or(ChainError::InsufficientBalance {
            required: u64::MAX,
            available: state.balance,
        })?;
    if required > state.balance {
        return Err(ChainError::InsufficientBalance {
            required,
            available: state.balance,
        });
    }

    let expected_nonce = state.nonce.checked_add(1).ok_or(ChainError::InvalidNonce {
        expected: u32::MAX,
        got: tx.nonce,
    })?;
    if tx.nonce != expected_nonce {
        return Err(ChainError::InvalidNonce {
            expected: expected_nonce,
            got: tx.nonce,
        });
    }

    Ok(AccountState {
        balance: state.balance - required,
        nonce: expected_nonce,
    })
}

/// Validates a single transaction against a provided account state.
///
/// Pure: the caller supplies the state (normally straight from the ledger)
/// and no side effects occur. Checks recipient validity, the signature over
/// [`Transaction::signing_bytes`], balance sufficiency with overflow
/// detection and the strict `nonce + 1` sequence.
pub fn validate_transaction_against(tx: &Transaction, state: &AccountState) -> Result<()> {
    if !wallet::is_valid_address(&tx.recipient) {
        return Err(ChainError::InvalidRecipient(tx.recipient.clone()));
    }
    verify_tx_signature(tx)?;
    debit(tx, state)?;
    Ok(())
}

impl Blockchain {
    /// Standalone transaction check against the current ledger state.
    ///
    /// An account the ledger has never seen validates as an empty account,
    /// so its first outgoing transaction needs nonce 1 and funds it does
    /// not have.
    pub fn validate_transaction(&self, tx: &Transaction) -> Result<()> {
        let sender = tx.sender_address()?;
        let state = self.get_wallet_state(&sender)?.unwrap_or_default();
        validate_transaction_against(tx, &state)
    }

    /// Validates a candidate block and returns the pending sender debits.
    ///
    /// Transactions are walked strictly in list order; a sender debited
    /// earlier in the block is tainted and later transactions read its
    /// balance from the overlay instead of the ledger, which is what makes
    /// an in-block double spend fail at the second transaction. Any single
    /// failure rejects the whole block, carrying the failing transaction's
    /// index. Block 0 is the genesis block and is always valid.
    pub fn validate_block(&self, block: &Block) -> Result<BlockOverlay> {
        let mut overlay = BlockOverlay::new();
        if block.index == 0 {
            return Ok(overlay);
        }

        let mut tainted: HashSet<Address> = HashSet::new();

        for (i, tx) in block.transactions.iter().enumerate() {
            match self.validate_block_transaction(tx, &tainted, &mut overlay) {
                // The sender's balance changed while processing this block;
                // later transactions must read the overlay copy.
                Ok(sender) => {
                    tainted.insert(sender);
                }
                Err(reason) => {
                    warn!(
                        block = block.index,
                        tx_index = i,
                        %reason,
                        "rejecting block"
                    );
                    return Err(ChainError::InvalidBlock {
                        tx_index: i,
                        reason: Box::new(reason),
                    });
                }
            }
        }

        Ok(overlay)
    }

    fn validate_block_transaction(
        &self,
        tx: &Transaction,
        tainted: &HashSet<Address>,
        overlay: &mut BlockOverlay,
    ) -> Result<Address> {
        let sender = tx.sender_address()?;

        verify_tx_signature(tx)?;

        let state = if tainted.contains(&sender) {
            overlay
                .get(&sender)
                .cloned()
                .unwrap_or_default()
        } else {
            self.get_wallet_state(&sender)?.unwrap_or_default()
        };

        let debited = debit(tx, &state)?;
        overlay.insert(sender.clone(), debited);
        Ok(sender)
    }

    /// Commits a validated block: persists the sender debits, credits every
    /// recipient and stores the block.
    ///
    /// Deliberately separate from [`validate_block`](Self::validate_block):
    /// validation must stay a pure check that every node reproduces, while
    /// application mutates the ledger exactly once, after finalization.
    pub fn apply_block(&mut self, block: &Block, overlay: BlockOverlay) -> Result<()> {
        for (wallet, state) in &overlay {
            self.set_wallet_state(wallet, state)?;
        }

        for tx in &block.transactions {
            let mut state = self.get_wallet_state(&tx.recipient)?.unwrap_or_default();
            state.balance = state
                .balance
                .checked_add(tx.amount)
                .ok_or(ChainError::ArithmeticOverflow)?;
            self.set_wallet_state(&tx.recipient, &state)?;
        }

        self.save_block(block)?;
        self.current_block = block.index;
        Ok(())
    }
}
