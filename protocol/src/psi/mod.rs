//! # Private Set Intersection
//!
//! Compliance needs to ask "is this address on the list?" without the
//! checker learning addresses that are *not* on it. Both sides turn their
//! addresses into scheme tokens, and the engine compares tokens, never
//! plaintext.
//!
//! Two schemes, picked once at construction:
//!
//! - [`PsiScheme::Paillier`]: randomized ciphertexts, equality tested via a
//!   masked homomorphic difference. Slow, but it composes with the
//!   Paillier amount layer.
//! - [`PsiScheme::Schnorr`]: deterministic `k * HashToPoint(addr)` tokens
//!   with a per-token issuer signature. Fast, and the default for large
//!   lists.
//!
//! Sets from different schemes never compare: mixing them is an
//! `InvalidValue`, not a silent empty intersection.

pub mod paillier;
pub mod schnorr;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::config::ProtocolConfig;
use crate::crypto::paillier::Ciphertext;
use crate::error::{ProtocolError, Result};

pub use self::paillier::PaillierPsi;
pub use self::schnorr::{SchnorrPsi, SchnorrToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PsiScheme {
    Paillier,
    Schnorr,
}

impl PsiScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            PsiScheme::Paillier => "paillier",
            PsiScheme::Schnorr => "schnorr",
        }
    }
}

impl fmt::Display for PsiScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One token per input element, in input order. Duplicates are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PsiEncryptedSet {
    Paillier(Vec<Ciphertext>),
    Schnorr(Vec<SchnorrToken>),
}

impl PsiEncryptedSet {
    pub fn scheme(&self) -> PsiScheme {
        match self {
            PsiEncryptedSet::Paillier(_) => PsiScheme::Paillier,
            PsiEncryptedSet::Schnorr(_) => PsiScheme::Schnorr,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PsiEncryptedSet::Paillier(items) => items.len(),
            PsiEncryptedSet::Schnorr(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub enum PsiEngine {
    Paillier(PaillierPsi),
    Schnorr(SchnorrPsi),
}

impl PsiEngine {
    /// Build an engine with fresh authority keys. `paillier_bits` is ignored
    /// by the Schnorr scheme.
    pub fn new(scheme: PsiScheme, paillier_bits: u64) -> Result<Self> {
        let engine = match scheme {
            PsiScheme::Paillier => PsiEngine::Paillier(PaillierPsi::generate(paillier_bits)?),
            PsiScheme::Schnorr => PsiEngine::Schnorr(SchnorrPsi::generate()),
        };
        tracing::debug!(scheme = %scheme, "psi engine ready");
        Ok(engine)
    }

    pub fn from_config(config: &ProtocolConfig) -> Result<Self> {
        Self::new(config.psi_scheme, config.paillier_key_bits)
    }

    pub fn scheme(&self) -> PsiScheme {
        match self {
            PsiEngine::Paillier(_) => PsiScheme::Paillier,
            PsiEngine::Schnorr(_) => PsiScheme::Schnorr,
        }
    }

    pub fn encrypt_set<S: AsRef<str>>(&self, elements: &[S]) -> Result<PsiEncryptedSet> {
        match self {
            PsiEngine::Paillier(psi) => {
                let items = elements
                    .iter()
                    .map(|e| psi.encrypt(e.as_ref()))
                    .collect::<Result<Vec<_>>>()?;
                Ok(PsiEncryptedSet::Paillier(items))
            }
            PsiEngine::Schnorr(psi) => Ok(PsiEncryptedSet::Schnorr(
                elements.iter().map(|e| psi.token(e.as_ref())).collect(),
            )),
        }
    }

    /// Indices into `encrypted` whose element also appears in `reference`.
    pub fn compute_intersection(
        &self,
        encrypted: &PsiEncryptedSet,
        reference: &PsiEncryptedSet,
    ) -> Result<BTreeSet<usize>> {
        let mut hits = BTreeSet::new();
        match (self, encrypted, reference) {
            (PsiEngine::Paillier(psi), PsiEncryptedSet::Paillier(items), PsiEncryptedSet::Paillier(refs)) => {
                for (i, item) in items.iter().enumerate() {
                    if psi.contains(item, refs)? {
                        hits.insert(i);
                    }
                }
            }
            (PsiEngine::Schnorr(psi), PsiEncryptedSet::Schnorr(items), PsiEncryptedSet::Schnorr(refs)) => {
                for (i, item) in items.iter().enumerate() {
                    if psi.contains(item, refs) {
                        hits.insert(i);
                    }
                }
            }
            _ => return Err(self.mismatch(encrypted, reference)),
        }
        Ok(hits)
    }

    /// Whether a single plaintext item appears in `reference`.
    pub fn verify_item(&self, item: &str, reference: &PsiEncryptedSet) -> Result<bool> {
        match (self, reference) {
            (PsiEngine::Paillier(psi), PsiEncryptedSet::Paillier(refs)) => {
                psi.contains(&psi.encrypt(item)?, refs)
            }
            (PsiEngine::Schnorr(psi), PsiEncryptedSet::Schnorr(refs)) => {
                Ok(psi.contains(&psi.token(item), refs))
            }
            _ => Err(ProtocolError::InvalidValue(format!(
                "{} engine cannot query a {} set",
                self.scheme(),
                reference.scheme()
            ))),
        }
    }

    fn mismatch(&self, a: &PsiEncryptedSet, b: &PsiEncryptedSet) -> ProtocolError {
        ProtocolError::InvalidValue(format!(
            "psi scheme mismatch: engine={}, encrypted={}, reference={}",
            self.scheme(),
            a.scheme(),
            b.scheme()
        ))
    }
}
