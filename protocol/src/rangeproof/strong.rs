//! Bulletproofs range proofs, the production backend.
//!
//! `min <= v <= max` is split into two 64-bit non-negativity statements,
//! `v - min >= 0` and `max - v >= 0`, proven together as one aggregated
//! Bulletproof (m = 2). The verifier never receives the two sub-commitments.
//! It rebuilds them from `C` with [`range_commitments`], so a proof cannot
//! be replayed against any other commitment or bound pair.
//!
//! The `bulletproofs` crate runs on the `-ng` fork of curve25519-dalek.
//! Points and scalars cross over through their canonical 32-byte encodings,
//! which both forks share.

use bulletproofs::{BulletproofGens, PedersenGens, RangeProof as Bulletproof};
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek_ng as dalek_ng;
use merlin::Transcript;

use super::utils::{pedersen_generators, range_commitments, statement_bytes};
use super::{RangeProofBackend, RangeProofBackendKind};
use crate::config::RANGE_PROOF_BITS;
use crate::crypto::commitment::PedersenGenerators;
use crate::error::{ProtocolError, Result};

const TRANSCRIPT_LABEL: &[u8] = b"SHADE/bulletproof-range/v1";

/// Number of aggregated sub-range statements per proof.
const PARTIES: usize = 2;

pub struct StrongBackend {
    gens: PedersenGenerators,
    pc_gens: PedersenGens,
    bp_gens: BulletproofGens,
}

impl StrongBackend {
    pub fn new() -> Result<Self> {
        let gens = pedersen_generators();
        let pc_gens = PedersenGens {
            B: to_ng_point(&gens.g)?,
            B_blinding: to_ng_point(&gens.h)?,
        };
        Ok(Self {
            gens,
            pc_gens,
            bp_gens: BulletproofGens::new(RANGE_PROOF_BITS, PARTIES),
        })
    }

    fn transcript(statement: &[u8]) -> Transcript {
        let mut t = Transcript::new(TRANSCRIPT_LABEL);
        t.append_message(b"statement", statement);
        t
    }
}

impl std::fmt::Debug for StrongBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrongBackend")
            .field("bits", &RANGE_PROOF_BITS)
            .field("parties", &PARTIES)
            .finish()
    }
}

impl RangeProofBackend for StrongBackend {
    fn kind(&self) -> RangeProofBackendKind {
        RangeProofBackendKind::Strong
    }

    fn prove(&self, value: u64, min: u64, max: u64, blinding: &Scalar) -> Result<Vec<u8>> {
        if value < min || value > max {
            return Err(ProtocolError::OutOfRange { min, max });
        }

        let commitment = self.gens.commit(Scalar::from(value), blinding);
        let mut transcript = Self::transcript(&statement_bytes(&commitment, min, max));

        let r = to_ng_scalar(blinding);
        let values = [value - min, max - value];
        let blindings = [r, -r];

        let (proof, _) = Bulletproof::prove_multiple(
            &self.bp_gens,
            &self.pc_gens,
            &mut transcript,
            &values,
            &blindings,
            RANGE_PROOF_BITS,
        )
        .map_err(|e| ProtocolError::ProofInvalid(format!("bulletproof generation failed: {e:?}")))?;

        Ok(proof.to_bytes())
    }

    fn verify(&self, commitment: &RistrettoPoint, proof: &[u8], min: u64, max: u64) -> bool {
        if min > max {
            return false;
        }
        let Ok(proof) = Bulletproof::from_bytes(proof) else {
            return false;
        };

        let (lower, upper) = range_commitments(commitment, min, max, &self.gens);
        let sub_commitments = [to_ng_compressed(&lower), to_ng_compressed(&upper)];
        let mut transcript = Self::transcript(&statement_bytes(commitment, min, max));

        proof
            .verify_multiple(
                &self.bp_gens,
                &self.pc_gens,
                &mut transcript,
                &sub_commitments,
                RANGE_PROOF_BITS,
            )
            .is_ok()
    }
}

fn to_ng_point(point: &RistrettoPoint) -> Result<dalek_ng::ristretto::RistrettoPoint> {
    dalek_ng::ristretto::CompressedRistretto(point.compress().to_bytes())
        .decompress()
        .ok_or_else(|| ProtocolError::InvalidValue("generator does not decode on -ng".into()))
}

fn to_ng_compressed(point: &RistrettoPoint) -> dalek_ng::ristretto::CompressedRistretto {
    dalek_ng::ristretto::CompressedRistretto(point.compress().to_bytes())
}

fn to_ng_scalar(scalar: &Scalar) -> dalek_ng::scalar::Scalar {
    dalek_ng::scalar::Scalar::from_bytes_mod_order(scalar.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::commitment::{commit, random_scalar};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn setup() -> (StrongBackend, Scalar) {
        let r = random_scalar(&mut StdRng::seed_from_u64(42));
        (StrongBackend::new().unwrap(), r)
    }

    #[test]
    fn in_range_value_verifies() {
        let (backend, r) = setup();
        let proof = backend.prove(1000, 0, 5000, &r).unwrap();
        let c = commit(1000, &r).decompress().unwrap();
        assert!(backend.verify(&c, &proof, 0, 5000));
    }

    #[test]
    fn boundary_values_verify() {
        let (backend, r) = setup();
        for v in [10u64, 20] {
            let proof = backend.prove(v, 10, 20, &r).unwrap();
            let c = commit(v, &r).decompress().unwrap();
            assert!(backend.verify(&c, &proof, 10, 20), "boundary {v}");
        }
    }

    #[test]
    fn out_of_range_is_refused_at_creation() {
        let (backend, r) = setup();
        assert!(matches!(
            backend.prove(1000, 0, 500, &r),
            Err(ProtocolError::OutOfRange { min: 0, max: 500 })
        ));
        assert!(backend.prove(5, 10, 20, &r).is_err());
    }

    #[test]
    fn proof_is_bound_to_bounds_and_commitment() {
        let (backend, r) = setup();
        let proof = backend.prove(1000, 0, 5000, &r).unwrap();
        let c = commit(1000, &r).decompress().unwrap();
        assert!(!backend.verify(&c, &proof, 0, 4999));
        assert!(!backend.verify(&c, &proof, 1, 5000));

        let other = commit(1000, &random_scalar(&mut StdRng::seed_from_u64(1)))
            .decompress()
            .unwrap();
        assert!(!backend.verify(&other, &proof, 0, 5000));
    }

    #[test]
    fn tampered_or_garbage_proof_is_false() {
        let (backend, r) = setup();
        let mut proof = backend.prove(77, 0, 100, &r).unwrap();
        let c = commit(77, &r).decompress().unwrap();
        proof[40] ^= 0x01;
        assert!(!backend.verify(&c, &proof, 0, 100));
        assert!(!backend.verify(&c, &[0u8; 12], 0, 100));
    }
}
