//! Error taxonomy for the protocol core.
//!
//! Two kinds of failure flow through [`ProtocolError`]:
//!
//! - **Hard failures**: a negative amount, a malformed transaction, a
//!   ciphertext under the wrong key. The caller made a mistake and gets an
//!   `Err` immediately.
//! - **Verification outcomes**: a bad signature, a forged proof, a blacklist
//!   hit, a closed cancellation window. These are expected negatives. The
//!   boolean APIs (`validate_range_proof`, `validate_and_anchor_transaction`)
//!   report them as `false`. The variants below exist for callers who ask for
//!   the reason, and for the anchor state machine, where a losing racer must
//!   learn *why* it lost.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::anchor::AnchorStatus;
use crate::config::ConfigError;
use crate::crypto::keys::KeyError;
use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Malformed or out-of-policy input: negative amount, missing field,
    /// `tx_id` that does not match the content, mismatched key moduli.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Key mismatch or corrupt ciphertext. Never a silently wrong plaintext.
    #[error("decryption failed: {0}")]
    DecryptionError(String),

    /// The committed value lies outside the requested proof bounds.
    /// The value itself is deliberately not part of the message.
    #[error("value outside range [{min}, {max}]")]
    OutOfRange { min: u64, max: u64 },

    #[error("proof invalid: {0}")]
    ProofInvalid(String),

    #[error("transaction {tx_id} is already anchored")]
    AlreadyAnchored { tx_id: String },

    #[error("cancellation window for {tx_id} closed at {deadline}")]
    WindowExpired {
        tx_id: String,
        deadline: DateTime<Utc>,
    },

    #[error("anchor {tx_id} is already {status}")]
    AlreadyFinal { tx_id: String, status: AnchorStatus },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Blacklist hit, or a required whitelist entry is absent.
    #[error("compliance rejected: {0}")]
    ComplianceRejected(String),

    #[error("signature invalid for transaction {tx_id}")]
    SignatureInvalid { tx_id: String },

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ProtocolError {
    /// `true` for the expected-negative outcomes that boolean APIs fold into
    /// `Ok(false)` instead of propagating.
    pub fn is_policy_rejection(&self) -> bool {
        matches!(
            self,
            ProtocolError::ProofInvalid(_)
                | ProtocolError::AlreadyAnchored { .. }
                | ProtocolError::WindowExpired { .. }
                | ProtocolError::AlreadyFinal { .. }
                | ProtocolError::ComplianceRejected(_)
                | ProtocolError::SignatureInvalid { .. }
        )
    }

    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        ProtocolError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
