//! Emulated backend: the "proof" is the opening itself.
//!
//! A proof is `value (u64 LE) || blinding (32) || checksum (32)` where the
//! checksum is a challenge over the statement and the value. Verification
//! re-opens the commitment and compares against the bounds. It reveals the
//! amount to anyone holding the proof, which is fine for local demos and
//! fixtures and nowhere else.
//!
//! Unlike the other two backends, creation does **not** refuse an
//! out-of-range value. You get a proof that fails verification, which is
//! what the validation tests need to exercise the rejection path.
//!
//! [`RangeProofEngine::from_kind`](super::RangeProofEngine::from_kind)
//! refuses to build this backend when `production` is set.

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use subtle::ConstantTimeEq;

use super::utils::{challenge_scalar, statement_bytes};
use super::{RangeProofBackend, RangeProofBackendKind};
use crate::crypto::commitment::PedersenGenerators;
use crate::error::Result;

const CHECKSUM_LABEL: &[u8] = b"emulated";
const PROOF_LEN: usize = 8 + 32 + 32;

#[derive(Debug, Clone, Default)]
pub struct EmulatedBackend {
    gens: PedersenGenerators,
}

impl EmulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn checksum(commitment: &RistrettoPoint, value: u64, min: u64, max: u64) -> Scalar {
        let statement = statement_bytes(commitment, min, max);
        challenge_scalar(CHECKSUM_LABEL, &[&statement, &value.to_le_bytes()])
    }
}

impl RangeProofBackend for EmulatedBackend {
    fn kind(&self) -> RangeProofBackendKind {
        RangeProofBackendKind::Emulated
    }

    fn prove(&self, value: u64, min: u64, max: u64, blinding: &Scalar) -> Result<Vec<u8>> {
        let commitment = self.gens.commit(Scalar::from(value), blinding);
        let checksum = Self::checksum(&commitment, value, min, max);

        let mut out = Vec::with_capacity(PROOF_LEN);
        out.extend_from_slice(&value.to_le_bytes());
        out.extend_from_slice(blinding.as_bytes());
        out.extend_from_slice(checksum.as_bytes());
        Ok(out)
    }

    fn verify(&self, commitment: &RistrettoPoint, proof: &[u8], min: u64, max: u64) -> bool {
        if proof.len() != PROOF_LEN {
            return false;
        }
        let (value_bytes, rest) = proof.split_at(8);
        let (blinding_bytes, checksum_bytes) = rest.split_at(32);

        let Ok(value_bytes) = <[u8; 8]>::try_from(value_bytes) else {
            return false;
        };
        let value = u64::from_le_bytes(value_bytes);
        let Ok(blinding_bytes) = <[u8; 32]>::try_from(blinding_bytes) else {
            return false;
        };
        let Some(blinding) = Option::<Scalar>::from(Scalar::from_canonical_bytes(blinding_bytes)) else {
            return false;
        };

        if self.gens.commit(Scalar::from(value), &blinding) != *commitment {
            return false;
        }
        let checksum = Self::checksum(commitment, value, min, max);
        if !bool::from(checksum.as_bytes()[..].ct_eq(checksum_bytes)) {
            return false;
        }
        min <= value && value <= max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::commitment::{commit, random_scalar};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn opening_inside_bounds_verifies() {
        let backend = EmulatedBackend::new();
        let r = random_scalar(&mut StdRng::seed_from_u64(21));
        let proof = backend.prove(1000, 0, 5000, &r).unwrap();
        let c = commit(1000, &r).decompress().unwrap();
        assert!(backend.verify(&c, &proof, 0, 5000));
    }

    #[test]
    fn out_of_range_is_produced_but_rejected() {
        let backend = EmulatedBackend::new();
        let r = random_scalar(&mut StdRng::seed_from_u64(22));
        let proof = backend.prove(1000, 0, 500, &r).unwrap();
        let c = commit(1000, &r).decompress().unwrap();
        assert!(!backend.verify(&c, &proof, 0, 500));
    }

    #[test]
    fn wrong_commitment_or_edited_value_rejected() {
        let backend = EmulatedBackend::new();
        let r = random_scalar(&mut StdRng::seed_from_u64(23));
        let mut proof = backend.prove(40, 0, 100, &r).unwrap();
        let other = commit(41, &r).decompress().unwrap();
        assert!(!backend.verify(&other, &proof, 0, 100));

        let c = commit(40, &r).decompress().unwrap();
        proof[0] = 41;
        assert!(!backend.verify(&c, &proof, 0, 100));
    }
}
