//! Aggregatable Schnorr signatures over the ristretto255 group.
//!
//! Validators co-sign block headers and cross-shard merkle roots with an
//! n-of-n scheme: each party contributes a commitment `R_i = k_i * G` and a
//! partial scalar `s_i = k_i - e * x_i`, and the coordinator sums both into a
//! single `(R, S)` pair that verifies against the summed public key.
//!
//! The summation itself lives behind the [`Aggregation`] seam. The default
//! [`NaiveSum`] adds raw keys and commitments without per-key hashing, which
//! is open to rogue-key attacks when signers are not mutually trusted. Keep
//! that in mind before pointing this at an open validator set; a key-prefixed
//! scheme can replace `NaiveSum` without touching any caller.

use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::error::{ChainError, Result};

/// Length of a compressed group element or a canonical scalar on the wire.
pub const ELEMENT_SIZE: usize = 32;

/// SHA-256 digest of `msg`, reduced into the scalar field.
pub fn hash_to_scalar(msg: &[u8]) -> Scalar {
    let digest: [u8; 32] = Sha256::digest(msg).into();
    Scalar::from_bytes_mod_order(digest)
}

/// Challenge scalar `e = H(msg || P || R)` over compressed encodings.
fn challenge(msg: &[u8], public: &RistrettoPoint, commitment: &RistrettoPoint) -> Scalar {
    let mut preimage = Vec::with_capacity(msg.len() + 2 * ELEMENT_SIZE);
    preimage.extend_from_slice(msg);
    preimage.extend_from_slice(public.compress().as_bytes());
    preimage.extend_from_slice(commitment.compress().as_bytes());
    hash_to_scalar(&preimage)
}

/// How individual public keys and commitments are folded into the group
/// values the signature is checked against.
pub trait Aggregation {
    fn combine_keys(&self, keys: &[RistrettoPoint]) -> RistrettoPoint;
    fn combine_commitments(&self, commitments: &[RistrettoPoint]) -> RistrettoPoint;
}

/// Plain n-of-n summation. Vulnerable to rogue-key attacks: a signer who
/// picks its key after seeing the others can cancel them out. Acceptable
/// only while every co-signer is operated by the same organization.
pub struct NaiveSum;

impl Aggregation for NaiveSum {
    fn combine_keys(&self, keys: &[RistrettoPoint]) -> RistrettoPoint {
        keys.iter().sum()
    }

    fn combine_commitments(&self, commitments: &[RistrettoPoint]) -> RistrettoPoint {
        commitments.iter().sum()
    }
}

#[derive(Debug, Clone)]
pub struct SchnorrKeyPair {
    pub secret: Scalar,
    pub public: RistrettoPoint,
}

impl SchnorrKeyPair {
    /// Generates a fresh keypair: `x` random, `P = x * G`.
    pub fn generate() -> Self {
        let secret = Scalar::random(&mut OsRng);
        let public = RISTRETTO_BASEPOINT_POINT * secret;
        SchnorrKeyPair { secret, public }
    }

    pub fn public_key_bytes(&self) -> [u8; ELEMENT_SIZE] {
        self.public.compress().to_bytes()
    }
}

/// A one-shot signing nonce `(k, R = k * G)`.
///
/// The nonce scalar is private and the struct is consumed by
/// [`partial_sign`], so a commitment cannot be used for two messages.
/// Reusing `k` across messages leaks the private key.
pub struct Commitment {
    nonce: Scalar,
    point: RistrettoPoint,
}

impl Commitment {
    pub fn generate() -> Self {
        let nonce = Scalar::random(&mut OsRng);
        let point = RISTRETTO_BASEPOINT_POINT * nonce;
        Commitment { nonce, point }
    }

    /// The public half `R_i`, shared with the other signers.
    pub fn point(&self) -> RistrettoPoint {
        self.point
    }
}

/// Produces this party's partial scalar for `msg`.
///
/// `other_commitments` and `other_keys` are the `R_i` / `P_i` of every other
/// participant; the aggregate challenge binds all of them. Consumes the
/// commitment.
pub fn partial_sign(
    msg: &[u8],
    keypair: &SchnorrKeyPair,
    commitment: Commitment,
    other_commitments: &[RistrettoPoint],
    other_keys: &[RistrettoPoint],
) -> Scalar {
    partial_sign_with(&NaiveSum, msg, keypair, commitment, other_commitments, other_keys)
}

/// [`partial_sign`] with an explicit aggregation scheme.
pub fn partial_sign_with<A: Aggregation>(
    agg: &A,
    msg: &[u8],
    keypair: &SchnorrKeyPair,
    commitment: Commitment,
    other_commitments: &[RistrettoPoint],
    other_keys: &[RistrettoPoint],
) -> Scalar {
    let mut all_r = Vec::with_capacity(other_commitments.len() + 1);
    all_r.push(commitment.point);
    all_r.extend_from_slice(other_commitments);

    let mut all_p = Vec::with_capacity(other_keys.len() + 1);
    all_p.push(keypair.public);
    all_p.extend_from_slice(other_keys);

    let r = agg.combine_commitments(&all_r);
    let p = agg.combine_keys(&all_p);

    let e = challenge(msg, &p, &r);
    commitment.nonce - e * keypair.secret
}

/// Sums the collected commitments and partial scalars into the final
/// signature. Works with however many shares actually arrived; a coordinator
/// that abandons a round simply aggregates fewer of them (the result then
/// verifies against the matching subset key).
pub fn aggregate(commitments: &[RistrettoPoint], partials: &[Scalar]) -> (RistrettoPoint, Scalar) {
    let r = NaiveSum.combine_commitments(commitments);
    let s: Scalar = partials.iter().sum();
    (r, s)
}

/// Verifies `(R, S)` for `msg` against the aggregate public key `P`:
/// accept iff `R == S * G + H(msg || P || R) * P`.
pub fn verify(msg: &[u8], r: &RistrettoPoint, s: &Scalar, public: &RistrettoPoint) -> bool {
    let e = challenge(msg, public, r);
    *r == RISTRETTO_BASEPOINT_POINT * s + public * e
}

/// Recovers the public key from a signature whose challenge omitted the key:
/// `e = H(msg || R)`, `P = (R - S * G) * e^-1`.
///
/// This is a distinct operation from [`verify`], used when the key is not
/// otherwise known. Returns `None` when the challenge reduces to zero.
pub fn recover_public_key(
    msg: &[u8],
    r: &RistrettoPoint,
    s: &Scalar,
) -> Option<RistrettoPoint> {
    let mut preimage = Vec::with_capacity(msg.len() + ELEMENT_SIZE);
    preimage.extend_from_slice(msg);
    preimage.extend_from_slice(r.compress().as_bytes());
    let e = hash_to_scalar(&preimage);

    if e == Scalar::ZERO {
        return None;
    }
    Some((r - RISTRETTO_BASEPOINT_POINT * s) * e.invert())
}

pub fn point_to_bytes(point: &RistrettoPoint) -> [u8; ELEMENT_SIZE] {
    point.compress().to_bytes()
}

pub fn point_from_bytes(bytes: &[u8]) -> Result<RistrettoPoint> {
    let compressed = CompressedRistretto::from_slice(bytes)
        .map_err(|_| ChainError::Crypto(format!("point must be {} bytes", ELEMENT_SIZE)))?;
    compressed
        .decompress()
        .ok_or_else(|| ChainError::Crypto("bytes do not encode a group element".to_string()))
}

pub fn scalar_to_bytes(scalar: &Scalar) -> [u8; ELEMENT_SIZE] {
    scalar.to_bytes()
}

pub fn scalar_from_bytes(bytes: &[u8]) -> Result<Scalar> {
    let arr: [u8; ELEMENT_SIZE] = bytes
        .try_into()
        .map_err(|_| ChainError::Crypto(format!("scalar must be {} bytes", ELEMENT_SIZE)))?;
    Option::<Scalar>::from(Scalar::from_canonical_bytes(arr))
        .ok_or_else(|| ChainError::Crypto("scalar is not canonical".to_string()))
}
