//! # Hashing Utilities
//!
//! Hash functions used throughout SHADE. Two families, no more:
//!
//! - **SHA-256** for anything that leaves the process: transaction IDs
//!   (double SHA-256 over the canonical encoding), notary record IDs,
//!   and the PSI element encoding. Every ledger and every auditor already
//!   speaks SHA-256.
//!
//! - **BLAKE3** in `derive_key` mode for the Schnorr PSI hash-to-point
//!   input, where only SHADE peers need to reproduce the value.
//!
//! Hash-to-scalar for Fiat-Shamir challenges lives in
//! [`crate::rangeproof::utils`] because it must be shared byte-for-byte by
//! every range-proof backend.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use shade_protocol::crypto::sha256;
///
/// let hash = sha256(b"SHADE protocol");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Compute the SHA-256 hash and return a fixed-size array.
pub fn sha256_array(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Compute the double-SHA-256 hash: `SHA-256(SHA-256(data))`.
///
/// Transaction IDs are the hex encoding of this over the canonical
/// transaction bytes. Two conforming implementations must agree on it to
/// the bit, so we stay with the most widely deployed construction.
///
/// ```
/// use shade_protocol::crypto::double_sha256;
///
/// let tx_id = double_sha256(b"canonical transaction bytes");
/// assert_eq!(tx_id.len(), 32);
/// ```
pub fn double_sha256(data: &[u8]) -> Vec<u8> {
    sha256(&sha256(data))
}

/// Compute a domain-separated hash using BLAKE3's `derive_key` mode.
///
/// `domain_separated_hash("a", x)` and `domain_separated_hash("b", x)`
/// never collide: the context string selects a different internal IV.
/// Prefer this over manually prepending tags.
pub fn domain_separated_hash(context: &str, data: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}
