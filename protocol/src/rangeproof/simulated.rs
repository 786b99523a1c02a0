//! Curve-arithmetic simulation backend.
//!
//! **Not zero-knowledge and not sound.** It exists to cross-check the
//! commitment algebra that the strong backend relies on, with proofs that
//! are cheap to build and easy to inspect in a debugger.
//!
//! A proof is `A || B || e`:
//!
//! ```text
//! A = (v - min)*G + r*H        (must equal C - min*G)
//! B = (max - v)*G - r*H        (must equal max*G - C)
//! e = challenge(statement, A, B)
//! ```
//!
//! Verification recomputes `A` and `B` from `C` with the shared multiscalar
//! routine, checks `A + B == (max - min)*G`, and checks the challenge. A
//! hash-bound proof for the wrong commitment or bounds is rejected, but
//! nothing here stops a dishonest prover from claiming an out-of-range
//! value. Creation does refuse out-of-range values, matching the strong
//! backend's contract for honest callers.

use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use subtle::ConstantTimeEq;

use super::utils::{challenge_scalar, multiscalar_mul, range_commitments, statement_bytes};
use super::{RangeProofBackend, RangeProofBackendKind};
use crate::crypto::commitment::PedersenGenerators;
use crate::error::{ProtocolError, Result};

const CHALLENGE_LABEL: &[u8] = b"simulated";
const PROOF_LEN: usize = 96;

#[derive(Debug, Clone, Default)]
pub struct SimulatedBackend {
    gens: PedersenGenerators,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn challenge(&self, commitment: &RistrettoPoint, a: &[u8], b: &[u8], min: u64, max: u64) -> Scalar {
        let statement = statement_bytes(commitment, min, max);
        challenge_scalar(CHALLENGE_LABEL, &[&statement, a, b])
    }
}

impl RangeProofBackend for SimulatedBackend {
    fn kind(&self) -> RangeProofBackendKind {
        RangeProofBackendKind::Simulated
    }

    fn prove(&self, value: u64, min: u64, max: u64, blinding: &Scalar) -> Result<Vec<u8>> {
        if value < min || value > max {
            return Err(ProtocolError::OutOfRange { min, max });
        }
        let commitment = self.gens.commit(Scalar::from(value), blinding);
        let a = self.gens.commit(Scalar::from(value - min), blinding).compress();
        let b = self.gens.commit(Scalar::from(max - value), &(-blinding)).compress();
        let e = self.challenge(&commitment, a.as_bytes(), b.as_bytes(), min, max);

        let mut out = Vec::with_capacity(PROOF_LEN);
        out.extend_from_slice(a.as_bytes());
        out.extend_from_slice(b.as_bytes());
        out.extend_from_slice(e.as_bytes());
        Ok(out)
    }

    fn verify(&self, commitment: &RistrettoPoint, proof: &[u8], min: u64, max: u64) -> bool {
        if min > max || proof.len() != PROOF_LEN {
            return false;
        }
        let (a_bytes, rest) = proof.split_at(32);
        let (b_bytes, e_bytes) = rest.split_at(32);

        let decode = |bytes: &[u8]| -> Option<RistrettoPoint> {
            CompressedRistretto::from_slice(bytes).ok()?.decompress()
        };
        let (Some(a), Some(b)) = (decode(a_bytes), decode(b_bytes)) else {
            return false;
        };

        let (lower, upper) = range_commitments(commitment, min, max, &self.gens);
        let span = multiscalar_mul(&[Scalar::from(max - min)], &[self.gens.g]);
        if a != lower || b != upper || a + b != span {
            return false;
        }

        let e = self.challenge(commitment, a_bytes, b_bytes, min, max);
        e.as_bytes()[..].ct_eq(e_bytes).into()
    }
}
