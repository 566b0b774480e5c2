//! Base wallet scheme for QuorumChain: secp256k1 keys, ECDSA transaction
//! signatures and the sharded address codec.
//!
//! Addresses are fixed-width strings carrying their shard in clear text:
//! a 4-character prefix, two zero-padded decimal shard digits, a 24-character
//! body derived from the public key hash and a 4-character checksum. Body and
//! checksum characters come from a Base58-style alphabet (no `0`, `O`, `I`,
//! `l`); the shard digits are plain decimal so they can be read back without
//! decoding the rest of the address.

use crate::error::{ChainError, Result};
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{
    constants::{COMPACT_SIGNATURE_SIZE, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE},
    ecdsa::Signature,
    All, Message, PublicKey, Secp256k1, SecretKey,
};
use sha2::{Digest, Sha256};

/// A thread-safe, lazily initialized Secp256k1 context.
/// This prevents repeated, unnecessary context creation.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Alphabet for the address body and checksum characters.
pub const ADDRESS_ALPHABET: &[u8; 58] =
    b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Number of shards the ledger is partitioned into. Shard identifiers
/// run from 1 to this value inclusive; 0 is never a valid shard.
pub const SHARD_COUNT: u32 = 10;

const ADDRESS_PREFIX: &str = "Qrum";
/// Offset of the two zero-padded decimal shard digits inside an address.
pub const SHARD_OFFSET: usize = 4;
const SHARD_DIGITS: usize = 2;
const BODY_LEN: usize = 24;
const CHECKSUM_LEN: usize = 4;
/// Total fixed length of every address string.
pub const ADDRESS_LEN: usize = SHARD_OFFSET + SHARD_DIGITS + BODY_LEN + CHECKSUM_LEN;

/// Addresses are opaque fixed-encoding strings; the codec below is the only
/// code that looks inside them.
pub type Address = String;

fn alphabet_char(byte: u8) -> char {
    ADDRESS_ALPHABET[(byte as usize) % ADDRESS_ALPHABET.len()] as char
}

fn checksum_chars(partial: &str) -> String {
    let digest = Sha256::digest(partial.as_bytes());
    digest[..CHECKSUM_LEN].iter().map(|b| alphabet_char(*b)).collect()
}

/// Derives the address for a public key on a given shard.
///
/// The same key produces a different address on every shard, which is what
/// lets a transaction carry its shard implicitly through the sender address.
pub fn derive_address(public_key_bytes: &[u8], shard: u32) -> Result<Address> {
    if shard == 0 || shard > SHARD_COUNT {
        return Err(ChainError::InvalidRecipient(format!(
            "shard {} out of range 1..={}",
            shard, SHARD_COUNT
        )));
    }

    let digest = Sha256::digest(public_key_bytes);
    let body: String = digest[..BODY_LEN].iter().map(|b| alphabet_char(*b)).collect();

    let partial = format!("{}{:02}{}", ADDRESS_PREFIX, shard, body);
    let checksum = checksum_chars(&partial);

    Ok(format!("{}{}", partial, checksum))
}

/// Reads the shard identifier embedded in an address.
pub fn address_shard(address: &str) -> Result<u32> {
    if address.len() != ADDRESS_LEN || !address.is_ascii() {
        return Err(ChainError::InvalidRecipient(address.to_string()));
    }
    let digits = &address[SHARD_OFFSET..SHARD_OFFSET + SHARD_DIGITS];
    let shard: u32 = digits
        .parse()
        .map_err(|_| ChainError::InvalidRecipient(address.to_string()))?;
    if shard == 0 || shard > SHARD_COUNT {
        return Err(ChainError::InvalidRecipient(address.to_string()));
    }
    Ok(shard)
}

/// Checks prefix, length, shard digits, alphabet membership and checksum.
pub fn is_valid_address(address: &str) -> bool {
    if address.len() != ADDRESS_LEN || !address.is_ascii() {
        return false;
    }
    if !address.starts_with(ADDRESS_PREFIX) {
        return false;
    }
    if address_shard(address).is_err() {
        return false;
    }

    let body_and_checksum = &address[SHARD_OFFSET + SHARD_DIGITS..];
    if !body_and_checksum
        .bytes()
        .all(|b| ADDRESS_ALPHABET.contains(&b))
    {
        return false;
    }

    let split = ADDRESS_LEN - CHECKSUM_LEN;
    checksum_chars(&address[..split]) == address[split..]
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new random KeyPair using the OS random number generator.
    pub fn generate() -> Self {
        let secret_key = SecretKey::new(&mut OsRng);
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        KeyPair {
            secret_key,
            public_key,
        }
    }

    /// Creates a KeyPair from raw secret key bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        let secret_key = SecretKey::from_slice(bytes).map_err(|e| {
            if bytes.len() != SECRET_KEY_SIZE {
                ChainError::Crypto(format!(
                    "Secret key must be {} bytes, got {}",
                    SECRET_KEY_SIZE,
                    bytes.len()
                ))
            } else {
                ChainError::Crypto(format!("Invalid secret key bytes: {}", e))
            }
        })?;
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        Ok(KeyPair {
            secret_key,
            public_key,
        })
    }

    /// Returns the KeyPair's public key as a compressed byte array.
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.public_key.serialize()
    }

    /// Computes the address of this key on the given shard.
    pub fn address(&self, shard: u32) -> Result<Address> {
        derive_address(&self.public_key_bytes(), shard)
    }

    /// Signs a message (hashed with SHA-256 first) and returns the signature
    /// split into its `r` and `s` halves, as carried on the wire.
    pub fn sign(&self, message: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
        let digest = Sha256::digest(message);
        let message = Message::from_digest_slice(&digest)
            .map_err(|e| ChainError::Crypto(format!("Failed to create message: {}", e)))?;

        let signature = SECP256K1_CONTEXT.sign_ecdsa(&message, &self.secret_key);
        let compact: [u8; COMPACT_SIGNATURE_SIZE] = signature.serialize_compact();

        Ok((compact[..32].to_vec(), compact[32..].to_vec()))
    }
}

/// Verifies an ECDSA signature given the raw public key bytes, the `r` and
/// `s` signature halves and the message.
///
/// Malformed keys or signature encodings surface as [`ChainError::Crypto`];
/// a well-formed signature that does not match fails with
/// [`ChainError::InvalidSignature`]. Callers treat both as a rejection.
pub fn verify_signature(
    public_key_bytes: &[u8],
    r: &[u8],
    s: &[u8],
    message: &[u8],
) -> Result<()> {
    if public_key_bytes.len() != PUBLIC_KEY_SIZE {
        return Err(ChainError::Crypto(format!(
            "Public key must be exactly {} bytes (compressed), got {}",
            PUBLIC_KEY_SIZE,
            public_key_bytes.len()
        )));
    }
    if r.len() != 32 || s.len() != 32 {
        return Err(ChainError::Crypto(format!(
            "Signature halves must be 32 bytes each, got {} and {}",
            r.len(),
            s.len()
        )));
    }

    let public_key = PublicKey::from_slice(public_key_bytes)
        .map_err(|e| ChainError::Crypto(format!("Invalid public key: {}", e)))?;

    let mut compact = [0u8; COMPACT_SIGNATURE_SIZE];
    compact[..32].copy_from_slice(r);
    compact[32..].copy_from_slice(s);
    let signature = Signature::from_compact(&compact)
        .map_err(|e| ChainError::Crypto(format!("Invalid signature: {}", e)))?;

    let digest = Sha256::digest(message);
    let message = Message::from_digest_slice(&digest)
        .map_err(|e| ChainError::Crypto(format!("Failed to create message: {}", e)))?;

    SECP256K1_CONTEXT
        .verify_ecdsa(&message, &signature, &public_key)
        .map_err(|_| ChainError::InvalidSignature)
}
