//! Shared proof math.
//!
//! Every backend derives challenges, statement bytes and the two shifted
//! range commitments through these functions, so a statement means the
//! same thing to the strong prover as it does to the simulator.

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::VartimeMultiscalarMul;
use sha2::{Digest, Sha512};

use crate::crypto::commitment::PedersenGenerators;

/// Domain tag mixed into every range-proof challenge and transcript.
pub const RANGE_PROOF_DOMAIN: &[u8] = b"SHADE/rangeproof/v1";

/// The generator pair every backend commits against.
pub fn pedersen_generators() -> PedersenGenerators {
    PedersenGenerators::standard()
}

/// Hash-to-scalar for Fiat-Shamir challenges.
///
/// SHA-512 over the domain tag, the label and each part, every item
/// length-prefixed so `("ab", "c")` and `("a", "bc")` cannot collide. The
/// 64-byte digest is reduced mod `l`.
pub fn challenge_scalar(label: &[u8], parts: &[&[u8]]) -> Scalar {
    let mut hasher = Sha512::new();
    hasher.update(RANGE_PROOF_DOMAIN);
    hasher.update((label.len() as u64).to_le_bytes());
    hasher.update(label);
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    Scalar::from_hash(hasher)
}

/// `Σ scalars[i] * points[i]`.
///
/// Variable time. Only ever called on public data (commitments, bounds,
/// proof elements) during verification.
pub fn multiscalar_mul(scalars: &[Scalar], points: &[RistrettoPoint]) -> RistrettoPoint {
    debug_assert_eq!(scalars.len(), points.len());
    RistrettoPoint::vartime_multiscalar_mul(scalars, points)
}

/// Canonical bytes of the statement "`commitment` opens to a value in
/// `[min, max]`": compressed point, then both bounds little-endian.
pub fn statement_bytes(commitment: &RistrettoPoint, min: u64, max: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(48);
    out.extend_from_slice(commitment.compress().as_bytes());
    out.extend_from_slice(&min.to_le_bytes());
    out.extend_from_slice(&max.to_le_bytes());
    out
}

/// The two commitments whose non-negativity is equivalent to
/// `min <= v <= max`:
///
/// ```text
/// lower = C - min*G   = (v - min)*G + r*H
/// upper = max*G - C   = (max - v)*G - r*H
/// ```
///
/// Anyone holding `C` can recompute them, so proofs never carry them.
pub fn range_commitments(
    commitment: &RistrettoPoint,
    min: u64,
    max: u64,
    gens: &PedersenGenerators,
) -> (RistrettoPoint, RistrettoPoint) {
    let lower = multiscalar_mul(&[Scalar::ONE, -Scalar::from(min)], &[*commitment, gens.g]);
    let upper = multiscalar_mul(&[Scalar::from(max), -Scalar::ONE], &[gens.g, *commitment]);
    (lower, upper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::commitment::{commit, random_scalar};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn challenge_is_deterministic_and_length_prefixed() {
        let a = challenge_scalar(b"label", &[b"ab", b"c"]);
        let b = challenge_scalar(b"label", &[b"ab", b"c"]);
        let c = challenge_scalar(b"label", &[b"a", b"bc"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, challenge_scalar(b"other", &[b"ab", b"c"]));
    }

    #[test]
    fn multiscalar_matches_naive_sum() {
        let gens = pedersen_generators();
        let mut rng = StdRng::seed_from_u64(5);
        let x = random_scalar(&mut rng);
        let y = random_scalar(&mut rng);
        assert_eq!(multiscalar_mul(&[x, y], &[gens.g, gens.h]), x * gens.g + y * gens.h);
    }

    #[test]
    fn range_commitments_open_to_shifted_values() {
        let gens = pedersen_generators();
        let r = random_scalar(&mut StdRng::seed_from_u64(9));
        let c = commit(1000, &r).decompress().unwrap();
        let (lower, upper) = range_commitments(&c, 0, 5000, &gens);
        assert_eq!(lower, gens.commit(Scalar::from(1000u64), &r));
        assert_eq!(upper, gens.commit(Scalar::from(4000u64), &(-r)));
        assert_eq!(lower + upper, Scalar::from(5000u64) * gens.g);
    }
}
