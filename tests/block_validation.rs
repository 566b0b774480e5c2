//! Integration tests for the ledger acceptance rules and the apply phase.

use quorumchain::blockchain::Blockchain;
use quorumchain::error::ChainError;
use quorumchain::types::{AccountState, Block, Transaction};
use quorumchain::wallet::KeyPair;

const SHARD: u32 = 2;
const GENESIS_TS: u64 = 1_700_000_000;

/// Builds a signed transfer from `keypair` on the test shard.
fn transfer(
    keypair: &KeyPair,
    recipient: &str,
    amount: u64,
    gas: u64,
    nonce: u32,
) -> Transaction {
    let mut tx = Transaction::new(
        keypair.public_key_bytes().to_vec(),
        recipient.to_string(),
        SHARD,
        amount,
        gas,
        nonce,
    );
    tx.sign(keypair).unwrap();
    tx
}

fn fund(chain: &Blockchain, wallet: &str, balance: u64) {
    chain
        .set_wallet_state(
            wallet,
            &AccountState {
                balance,
                nonce: 0,
            },
        )
        .unwrap();
}

fn block_at(index: u64, miner: &str, transactions: Vec<Transaction>) -> Block {
    Block {
        index,
        timestamp: GENESIS_TS + index * 5,
        miner: miner.to_string(),
        shard: SHARD,
        transactions,
    }
}

fn failing_index(err: ChainError) -> (usize, ChainError) {
    match err {
        ChainError::InvalidBlock { tx_index, reason } => (tx_index, *reason),
        other => panic!("expected InvalidBlock, got {:?}", other),
    }
}

#[test]
fn genesis_block_is_always_valid() {
    let chain = Blockchain::in_memory(GENESIS_TS);
    let miner = KeyPair::generate().address(SHARD).unwrap();

    // Even nonsense transactions are fine at index 0
    let keypair = KeyPair::generate();
    let junk = transfer(&keypair, "not-even-an-address", u64::MAX, 1, 99);
    let genesis = block_at(0, &miner, vec![junk]);

    let overlay = chain.validate_block(&genesis).unwrap();
    assert!(overlay.is_empty());
}

#[test]
fn valid_block_produces_debit_overlay_only() {
    let chain = Blockchain::in_memory(GENESIS_TS);
    let alice = KeyPair::generate();
    let alice_addr = alice.address(SHARD).unwrap();
    let bob_addr = KeyPair::generate().address(SHARD).unwrap();
    let miner = KeyPair::generate().address(SHARD).unwrap();

    fund(&chain, &alice_addr, 1_000);

    let block = block_at(1, &miner, vec![transfer(&alice, &bob_addr, 300, 20, 1)]);
    let overlay = chain.validate_block(&block).unwrap();

    assert_eq!(
        overlay[&alice_addr],
        AccountState {
            balance: 680,
            nonce: 1
        }
    );

    // Validation is pure: neither side of the transfer moved on the ledger
    assert_eq!(
        chain.get_wallet_state(&alice_addr).unwrap().unwrap().balance,
        1_000
    );
    assert_eq!(chain.get_wallet_state(&bob_addr).unwrap(), None);
}

#[test]
fn apply_block_credits_recipients_and_stores_block() {
    let mut chain = Blockchain::in_memory(GENESIS_TS);
    let alice = KeyPair::generate();
    let alice_addr = alice.address(SHARD).unwrap();
    let bob_addr = KeyPair::generate().address(SHARD).unwrap();
    let miner = KeyPair::generate().address(SHARD).unwrap();

    fund(&chain, &alice_addr, 500);

    let block = block_at(1, &miner, vec![transfer(&alice, &bob_addr, 200, 10, 1)]);
    let overlay = chain.validate_block(&block).unwrap();
    chain.apply_block(&block, overlay).unwrap();

    assert_eq!(
        chain.get_wallet_state(&alice_addr).unwrap().unwrap(),
        AccountState {
            balance: 290,
            nonce: 1
        }
    );
    assert_eq!(
        chain.get_wallet_state(&bob_addr).unwrap().unwrap(),
        AccountState {
            balance: 200,
            nonce: 0
        }
    );
    assert_eq!(chain.get_block(1).unwrap().unwrap(), block);
    assert_eq!(chain.current_block, 1);
}

#[test]
fn exact_balance_drains_to_zero() {
    let mut chain = Blockchain::in_memory(GENESIS_TS);
    let alice = KeyPair::generate();
    let alice_addr = alice.address(SHARD).unwrap();
    let bob_addr = KeyPair::generate().address(SHARD).unwrap();
    let miner = KeyPair::generate().address(SHARD).unwrap();

    fund(&chain, &alice_addr, 100);

    let block = block_at(1, &miner, vec![transfer(&alice, &bob_addr, 90, 10, 1)]);
    let overlay = chain.validate_block(&block).unwrap();
    assert_eq!(overlay[&alice_addr].balance, 0);

    chain.apply_block(&block, overlay).unwrap();
    assert_eq!(
        chain.get_wallet_state(&alice_addr).unwrap().unwrap().balance,
        0
    );
}

#[test]
fn in_block_double_spend_fails_at_second_transaction() {
    let chain = Blockchain::in_memory(GENESIS_TS);
    let alice = KeyPair::generate();
    let alice_addr = alice.address(SHARD).unwrap();
    let bob_addr = KeyPair::generate().address(SHARD).unwrap();
    let miner = KeyPair::generate().address(SHARD).unwrap();

    fund(&chain, &alice_addr, 100);

    // The second spend is only covered by the balance as it was before the
    // first debit.
    let block = block_at(
        1,
        &miner,
        vec![
            transfer(&alice, &bob_addr, 60, 0, 1),
            transfer(&alice, &bob_addr, 60, 0, 2),
        ],
    );

    let (tx_index, reason) = failing_index(chain.validate_block(&block).unwrap_err());
    assert_eq!(tx_index, 1);
    assert_eq!(
        reason,
        ChainError::InsufficientBalance {
            required: 60,
            available: 40
        }
    );
}

#[test]
fn sequential_spends_within_funds_are_accepted() {
    let chain = Blockchain::in_memory(GENESIS_TS);
    let alice = KeyPair::generate();
    let alice_addr = alice.address(SHARD).unwrap();
    let bob_addr = KeyPair::generate().address(SHARD).unwrap();
    let miner = KeyPair::generate().address(SHARD).unwrap();

    fund(&chain, &alice_addr, 100);

    let block = block_at(
        1,
        &miner,
        vec![
            transfer(&alice, &bob_addr, 40, 0, 1),
            transfer(&alice, &bob_addr, 40, 0, 2),
        ],
    );

    let overlay = chain.validate_block(&block).unwrap();
    assert_eq!(
        overlay[&alice_addr],
        AccountState {
            balance: 20,
            nonce: 2
        }
    );
}

#[test]
fn wrong_nonce_rejects_block_with_index() {
    let chain = Blockchain::in_memory(GENESIS_TS);
    let alice = KeyPair::generate();
    let alice_addr = alice.address(SHARD).unwrap();
    let bob_addr = KeyPair::generate().address(SHARD).unwrap();
    let miner = KeyPair::generate().address(SHARD).unwrap();

    fund(&chain, &alice_addr, 100);

    // Nonce must be exactly previous + 1
    let block = block_at(1, &miner, vec![transfer(&alice, &bob_addr, 10, 0, 2)]);
    let (tx_index, reason) = failing_index(chain.validate_block(&block).unwrap_err());
    assert_eq!(tx_index, 0);
    assert_eq!(
        reason,
        ChainError::InvalidNonce {
            expected: 1,
            got: 2
        }
    );
}

#[test]
fn tampered_transaction_rejects_block() {
    let chain = Blockchain::in_memory(GENESIS_TS);
    let alice = KeyPair::generate();
    let alice_addr = alice.address(SHARD).unwrap();
    let bob_addr = KeyPair::generate().address(SHARD).unwrap();
    let miner = KeyPair::generate().address(SHARD).unwrap();

    fund(&chain, &alice_addr, 100);

    let mut tx = transfer(&alice, &bob_addr, 10, 0, 1);
    tx.amount = 90;
    let block = block_at(1, &miner, vec![tx]);

    let (tx_index, reason) = failing_index(chain.validate_block(&block).unwrap_err());
    assert_eq!(tx_index, 0);
    assert_eq!(reason, ChainError::InvalidSignature);
}

#[test]
fn overflowing_required_balance_rejects_block() {
    let chain = Blockchain::in_memory(GENESIS_TS);
    let alice = KeyPair::generate();
    let alice_addr = alice.address(SHARD).unwrap();
    let bob_addr = KeyPair::generate().address(SHARD).unwrap();
    let miner = KeyPair::generate().address(SHARD).unwrap();

    fund(&chain, &alice_addr, u64::MAX);

    let block = block_at(1, &miner, vec![transfer(&alice, &bob_addr, u64::MAX, 1, 1)]);
    let (tx_index, reason) = failing_index(chain.validate_block(&block).unwrap_err());
    assert_eq!(tx_index, 0);
    assert!(matches!(reason, ChainError::InsufficientBalance { .. }));
}

#[test]
fn standalone_transaction_validation_reads_ledger() {
    let chain = Blockchain::in_memory(GENESIS_TS);
    let alice = KeyPair::generate();
    let alice_addr = alice.address(SHARD).unwrap();
    let bob_addr = KeyPair::generate().address(SHARD).unwrap();

    fund(&chain, &alice_addr, 50);

    assert!(chain
        .validate_transaction(&transfer(&alice, &bob_addr, 30, 5, 1))
        .is_ok());

    // An account the ledger has never seen has nothing to spend
    let stranger = KeyPair::generate();
    let err = chain
        .validate_transaction(&transfer(&stranger, &bob_addr, 1, 0, 1))
        .unwrap_err();
    assert!(matches!(err, ChainError::InsufficientBalance { .. }));
}

#[test]
fn ledger_round_trips_through_sqlite() {
    let dir = tempfile::TempDir::new().unwrap();
    let alice = KeyPair::generate();
    let alice_addr = alice.address(SHARD).unwrap();
    let bob_addr = KeyPair::generate().address(SHARD).unwrap();
    let miner = KeyPair::generate().address(SHARD).unwrap();

    let block = {
        let mut chain = Blockchain::open(dir.path(), GENESIS_TS).unwrap();
        fund(&chain, &alice_addr, 400);

        let block = block_at(1, &miner, vec![transfer(&alice, &bob_addr, 100, 0, 1)]);
        let overlay = chain.validate_block(&block).unwrap();
        chain.apply_block(&block, overlay).unwrap();
        block
    };

    // Reopen from disk and observe the committed state
    let chain = Blockchain::open(dir.path(), GENESIS_TS).unwrap();
    assert_eq!(chain.get_block(1).unwrap().unwrap(), block);
    assert_eq!(
        chain.get_wallet_state(&alice_addr).unwrap().unwrap(),
        AccountState {
            balance: 300,
            nonce: 1
        }
    );
    assert_eq!(
        chain.get_wallet_state(&bob_addr).unwrap().unwrap().balance,
        100
    );
}
