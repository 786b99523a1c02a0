//! Schnorr-style PSI over Ristretto.
//!
//! The authority holds a secret scalar `k` and publishes `K = k*G`. An
//! address becomes the token
//!
//! ```text
//! P = HashToPoint(addr)
//! T = k * P
//! ```
//!
//! Tokens are deterministic, so two tokens for the same address are the
//! same point, but without `k` nobody can compute `T` for a guessed address.
//! Each token also carries a Schnorr signature under `K` over `T`, so a
//! token that the authority did not issue (or one issued under a different
//! key) never matches anything.
//!
//! Membership compares the query against every candidate with
//! `subtle::ConstantTimeEq` and ORs the results into one `Choice`. The loop
//! never exits early, so timing does not reveal where in a list a match sat.

use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use rand::rngs::OsRng;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use std::fmt;
use subtle::{Choice, ConstantTimeEq};

use crate::crypto::commitment::{hash_to_point, random_scalar};
use crate::crypto::hash::domain_separated_hash;

const ELEMENT_CONTEXT: &str = "SHADE psi schnorr element v1";
const SIGNATURE_DOMAIN: &[u8] = b"SHADE/psi/schnorr-sig/v1";

/// An issued token: `T = k * HashToPoint(addr)` plus the issuer's
/// signature `(R, s)` over it.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchnorrToken {
    point: CompressedRistretto,
    nonce_commitment: CompressedRistretto,
    response: Scalar,
}

impl SchnorrToken {
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.point.as_bytes()
    }
}

impl fmt::Debug for SchnorrToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchnorrToken({})", &hex::encode(self.point.as_bytes())[..16])
    }
}

#[derive(Clone)]
pub struct SchnorrPsi {
    secret: Scalar,
    public: RistrettoPoint,
}

impl SchnorrPsi {
    pub fn generate() -> Self {
        Self::generate_with_rng(&mut OsRng)
    }

    pub fn generate_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let secret = random_scalar(rng);
        Self {
            secret,
            public: secret * RISTRETTO_BASEPOINT_POINT,
        }
    }

    /// The authority's public key `K`.
    pub fn public_key(&self) -> CompressedRistretto {
        self.public.compress()
    }

    fn element_point(item: &str) -> RistrettoPoint {
        hash_to_point(&domain_separated_hash(ELEMENT_CONTEXT, item.as_bytes()))
    }

    fn challenge(&self, nonce_commitment: &CompressedRistretto, point: &CompressedRistretto) -> Scalar {
        let mut hasher = Sha512::new();
        hasher.update(SIGNATURE_DOMAIN);
        hasher.update(self.public.compress().as_bytes());
        hasher.update(nonce_commitment.as_bytes());
        hasher.update(point.as_bytes());
        Scalar::from_hash(hasher)
    }

    pub fn token(&self, item: &str) -> SchnorrToken {
        let point = (self.secret * Self::element_point(item)).compress();
        let nonce = random_scalar(&mut OsRng);
        let nonce_commitment = (nonce * RISTRETTO_BASEPOINT_POINT).compress();
        let c = self.challenge(&nonce_commitment, &point);
        SchnorrToken {
            point,
            nonce_commitment,
            response: nonce + c * self.secret,
        }
    }

    /// `s*G == R + c*K`. Issued tokens pass, forged or foreign ones don't.
    pub fn verify_token(&self, token: &SchnorrToken) -> bool {
        let Some(r) = token.nonce_commitment.decompress() else {
            return false;
        };
        let c = self.challenge(&token.nonce_commitment, &token.point);
        token.response * RISTRETTO_BASEPOINT_POINT == r + c * self.public
    }

    /// Whether `query` equals some valid token in `reference`.
    pub fn contains(&self, query: &SchnorrToken, reference: &[SchnorrToken]) -> bool {
        let query_valid = Choice::from(self.verify_token(query) as u8);
        let mut found = Choice::from(0u8);
        for candidate in reference {
            let valid = Choice::from(self.verify_token(candidate) as u8);
            found |= valid & query.point.as_bytes()[..].ct_eq(&candidate.point.as_bytes()[..]);
        }
        (query_valid & found).into()
    }
}

impl fmt::Debug for SchnorrPsi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SchnorrPsi(K={}, <secret redacted>)",
            &hex::encode(self.public.compress().as_bytes())[..16]
        )
    }
}
