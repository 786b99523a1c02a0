//! # Range Proofs
//!
//! A range proof convinces a verifier that a Pedersen commitment `C` opens
//! to some value in `[min, max]` without saying which. SHADE uses one on
//! every transfer, over `[0, max_transaction_amount]`, so a sender cannot
//! mint value by committing to a negative amount that wraps mod `l`.
//!
//! ## Backends
//!
//! | Backend | Sound | Zero-knowledge | Use |
//! |---|---|---|---|
//! | [`StrongBackend`] | yes | yes | production (Bulletproofs) |
//! | [`SimulatedBackend`] | no | no | cross-checking the algebra |
//! | [`EmulatedBackend`] | no | no | protocol-logic tests, refused in production |
//!
//! The backend is picked once when the [`RangeProofEngine`] is built, and
//! every [`RangeProof`] records which backend produced it. Validating a
//! proof under a different backend is simply `false`: there is no fallback
//! and no global switch.

pub mod emulated;
pub mod simulated;
pub mod strong;
pub mod utils;

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::{ConfigError, ProtocolConfig};
use crate::crypto::commitment::{commit, Commitment};
use crate::error::{ProtocolError, Result};

pub use emulated::EmulatedBackend;
pub use simulated::SimulatedBackend;
pub use strong::StrongBackend;

// ---------------------------------------------------------------------------
// Backend kind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeProofBackendKind {
    Strong,
    Simulated,
    Emulated,
}

impl RangeProofBackendKind {
    /// Wire tag used in the canonical transaction encoding.
    pub fn tag(&self) -> u8 {
        match self {
            RangeProofBackendKind::Strong => 1,
            RangeProofBackendKind::Simulated => 2,
            RangeProofBackendKind::Emulated => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RangeProofBackendKind::Strong => "strong",
            RangeProofBackendKind::Simulated => "simulated",
            RangeProofBackendKind::Emulated => "emulated",
        }
    }
}

impl fmt::Display for RangeProofBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Proof
// ---------------------------------------------------------------------------

/// An opaque range proof, bound to one commitment and one `[min, max]`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeProof {
    pub backend: RangeProofBackendKind,
    pub min: u64,
    pub max: u64,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for RangeProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangeProof")
            .field("backend", &self.backend)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("len", &self.bytes.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

/// A range-proof system.
///
/// `prove` may assume `min <= max`; the engine checks that. `verify` must
/// return `false` rather than panic on any input, including garbage bytes.
pub trait RangeProofBackend: Send + Sync + fmt::Debug {
    fn kind(&self) -> RangeProofBackendKind;

    fn prove(&self, value: u64, min: u64, max: u64, blinding: &Scalar) -> Result<Vec<u8>>;

    fn verify(&self, commitment: &RistrettoPoint, proof: &[u8], min: u64, max: u64) -> bool;

    /// Verify several proofs over the same bounds. All must pass.
    fn verify_batch(&self, items: &[(RistrettoPoint, &[u8])], min: u64, max: u64) -> bool {
        items
            .iter()
            .all(|(commitment, proof)| self.verify(commitment, proof, min, max))
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Creates and validates range proofs with one fixed backend.
#[derive(Debug, Clone)]
pub struct RangeProofEngine {
    backend: Arc<dyn RangeProofBackend>,
}

impl RangeProofEngine {
    pub fn new(backend: Box<dyn RangeProofBackend>) -> Self {
        Self {
            backend: Arc::from(backend),
        }
    }

    /// Build the engine for `kind`. The emulated backend is refused when
    /// `production` is set.
    pub fn from_kind(kind: RangeProofBackendKind, production: bool) -> Result<Self> {
        let backend: Box<dyn RangeProofBackend> = match kind {
            RangeProofBackendKind::Strong => Box::new(StrongBackend::new()?),
            RangeProofBackendKind::Simulated => Box::new(SimulatedBackend::new()),
            RangeProofBackendKind::Emulated => {
                if production {
                    return Err(ConfigError::EmulatedInProduction.into());
                }
                tracing::warn!("emulated range proofs reveal amounts; never use outside tests");
                Box::new(EmulatedBackend::new())
            }
        };
        tracing::debug!(backend = %kind, "range proof engine ready");
        Ok(Self::new(backend))
    }

    pub fn from_config(config: &ProtocolConfig) -> Result<Self> {
        Self::from_kind(config.range_proof_backend, config.production)
    }

    pub fn kind(&self) -> RangeProofBackendKind {
        self.backend.kind()
    }

    /// Commit to `value` and prove it lies in `[min, max]`.
    ///
    /// The returned commitment is exactly `commit(value, blinding)`.
    pub fn create_range_proof(
        &self,
        value: u64,
        min: u64,
        max: u64,
        blinding: &Scalar,
    ) -> Result<(Commitment, RangeProof)> {
        if min > max {
            return Err(ProtocolError::InvalidValue(format!(
                "empty range [{}, {}]",
                min, max
            )));
        }
        let bytes = self.backend.prove(value, min, max, blinding)?;
        let commitment = commit(value, blinding);
        tracing::debug!(backend = %self.kind(), min, max, len = bytes.len(), "range proof created");
        Ok((
            commitment,
            RangeProof {
                backend: self.kind(),
                min,
                max,
                bytes,
            },
        ))
    }

    /// `true` iff `proof` was made by this engine's backend for `commitment`
    /// and exactly `[min, max]`, and checks out.
    pub fn validate_range_proof(
        &self,
        commitment: &Commitment,
        proof: &RangeProof,
        min: u64,
        max: u64,
    ) -> bool {
        if !self.accepts(proof, min, max) {
            return false;
        }
        let Ok(point) = commitment.decompress() else {
            return false;
        };
        self.backend.verify(&point, &proof.bytes, min, max)
    }

    /// Validate many proofs over the same bounds.
    pub fn validate_batch(&self, items: &[(Commitment, RangeProof)], min: u64, max: u64) -> bool {
        let mut decoded = Vec::with_capacity(items.len());
        for (commitment, proof) in items {
            if !self.accepts(proof, min, max) {
                return false;
            }
            let Ok(point) = commitment.decompress() else {
                return false;
            };
            decoded.push((point, proof.bytes.as_slice()));
        }
        self.backend.verify_batch(&decoded, min, max)
    }

    fn accepts(&self, proof: &RangeProof, min: u64, max: u64) -> bool {
        proof.backend == self.kind() && proof.min == min && proof.max == max && min <= max
    }
}
