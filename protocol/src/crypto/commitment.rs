//! # Pedersen Commitments over Ristretto
//!
//! A Pedersen commitment to value `v` with blinding factor `r` is
//!
//! ```text
//! C = v * G + r * H
//! ```
//!
//! where `G` is the Ristretto basepoint and `H` is a second generator
//! obtained by hashing a fixed label into the group. Because `H` comes out
//! of a hash, nobody knows `log_G(H)`, which is exactly what binding needs:
//! opening `C` to a different `(v', r')` would solve that discrete log.
//! Hiding is perfect: for uniformly random `r`, `C` is a uniformly random
//! group element no matter what `v` is.
//!
//! The same `(G, H)` pair is used by every range-proof backend, so a
//! commitment produced here is the one a proof is bound to.
//!
//! ## Blinding hygiene
//!
//! Reusing `r` across two commitments to different values leaks `v1 - v2`
//! (`C1 - C2 = (v1 - v2) * G`). [`create_commitment`] therefore draws a
//! fresh 512-bit-reduced scalar from `OsRng` unless the caller hands one in,
//! and callers only do that for deterministic tests or when the opening must
//! match an existing proof.

use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use rand::rngs::OsRng;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha512;
use std::fmt;
use subtle::ConstantTimeEq;

use crate::error::{ProtocolError, Result};

/// Domain label hashed into the group to obtain `H`.
pub const PEDERSEN_H_LABEL: &[u8] = b"SHADE/PedersenH/v1";

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// The generator pair `(G, H)` shared by commitments and range proofs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PedersenGenerators {
    /// Value generator, the Ristretto basepoint.
    pub g: RistrettoPoint,
    /// Blinding generator, hash-derived.
    pub h: RistrettoPoint,
}

impl PedersenGenerators {
    /// The protocol's standard generators.
    pub fn standard() -> Self {
        Self {
            g: RISTRETTO_BASEPOINT_POINT,
            h: hash_to_point(PEDERSEN_H_LABEL),
        }
    }

    /// `value * G + blinding * H`.
    pub fn commit(&self, value: Scalar, blinding: &Scalar) -> RistrettoPoint {
        value * self.g + blinding * self.h
    }
}

impl Default for PedersenGenerators {
    fn default() -> Self {
        Self::standard()
    }
}

/// Hash arbitrary bytes to a Ristretto point (SHA-512, Elligator map).
///
/// Used for the `H` generator and for PSI element blinding.
pub fn hash_to_point(data: &[u8]) -> RistrettoPoint {
    RistrettoPoint::hash_from_bytes::<Sha512>(data)
}

/// Draw a uniformly random scalar: 64 random bytes reduced mod `l`.
///
/// `Scalar::from(rng.next_u64())` would only give 64 bits of entropy,
/// which is nowhere near enough for a blinding factor.
pub fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    let mut bytes = [0u8; 64];
    rng.fill_bytes(&mut bytes);
    Scalar::from_bytes_mod_order_wide(&bytes)
}

// ---------------------------------------------------------------------------
// Commitment
// ---------------------------------------------------------------------------

/// A Pedersen commitment, stored as its 32-byte compressed encoding.
///
/// Serializes as hex in human-readable formats (JSON, TOML) and as raw
/// bytes in binary ones (bincode).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Commitment {
    bytes: [u8; 32],
}

impl Commitment {
    pub fn from_point(point: &RistrettoPoint) -> Self {
        Self {
            bytes: point.compress().to_bytes(),
        }
    }

    /// Parse a commitment, rejecting byte strings that are not a valid
    /// Ristretto encoding.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let bytes: [u8; 32] = data.try_into().map_err(|_| {
            ProtocolError::InvalidValue(format!("commitment must be 32 bytes, got {}", data.len()))
        })?;
        let commitment = Self { bytes };
        commitment.decompress()?;
        Ok(commitment)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.bytes
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Recover the group element.
    pub fn decompress(&self) -> Result<RistrettoPoint> {
        CompressedRistretto(self.bytes)
            .decompress()
            .ok_or_else(|| ProtocolError::InvalidValue("commitment is not a valid point".into()))
    }
}

impl Serialize for Commitment {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            self.bytes.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Commitment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        use serde::de::Error;
        let bytes = if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            hex::decode(s).map_err(D::Error::custom)?
        } else {
            <[u8; 32]>::deserialize(deserializer)?.to_vec()
        };
        Commitment::from_bytes(&bytes).map_err(D::Error::custom)
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", &self.to_hex()[..16])
    }
}

// ---------------------------------------------------------------------------
// Commit / Verify
// ---------------------------------------------------------------------------

/// `C = value * G + blinding * H` with the standard generators.
pub fn commit(value: u64, blinding: &Scalar) -> Commitment {
    let gens = PedersenGenerators::standard();
    Commitment::from_point(&gens.commit(Scalar::from(value), blinding))
}

/// Commit to a non-negative amount.
///
/// Returns the commitment together with the blinding actually used, which
/// the caller must keep private. Negative values are rejected with
/// `InvalidValue`; every non-negative `i64` fits the group order with room
/// to spare.
pub fn create_commitment(value: i64, blinding: Option<Scalar>) -> Result<(Commitment, Scalar)> {
    let value = u64::try_from(value).map_err(|_| {
        ProtocolError::InvalidValue(format!("cannot commit to negative value {}", value))
    })?;
    let blinding = blinding.unwrap_or_else(|| random_scalar(&mut OsRng));
    Ok((commit(value, &blinding), blinding))
}

/// Check that `commitment` opens to `(value, blinding)`.
///
/// Recomputes the commitment and compares the compressed encodings in
/// constant time, so a near-miss opening takes as long as a far one.
pub fn verify_commitment(commitment: &Commitment, value: i64, blinding: &Scalar) -> bool {
    let Ok(value) = u64::try_from(value) else {
        return false;
    };
    let expected = commit(value, blinding);
    expected.bytes[..].ct_eq(&commitment.bytes[..]).into()
}

// ---------------------------------------------------------------------------
// Secondary addresses
// ---------------------------------------------------------------------------

/// A one-time blinded address `s * G + r * H`.
///
/// The point is public. The two secrets that produced it are returned
/// separately by [`create_secondary_address`] and never stored here.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryAddress {
    point: Commitment,
}

impl SecondaryAddress {
    pub fn to_hex(&self) -> String {
        self.point.to_hex()
    }

    pub fn decompress(&self) -> Result<RistrettoPoint> {
        self.point.decompress()
    }
}

impl fmt::Debug for SecondaryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecondaryAddress({})", &self.to_hex()[..16])
    }
}

/// Derive a one-time address from two independently drawn secrets.
pub fn create_secondary_address(gens: &PedersenGenerators) -> (SecondaryAddress, Scalar, Scalar) {
    let secret_s = random_scalar(&mut OsRng);
    let secret_r = random_scalar(&mut OsRng);
    let point = secret_s * gens.g + secret_r * gens.h;
    (
        SecondaryAddress {
            point: Commitment::from_point(&point),
        },
        secret_s,
        secret_r,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
