//! The transaction record and its canonical encoding.

use curve25519_dalek::scalar::Scalar;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{CANONICAL_ENCODING_VERSION, TX_FAMILIES};
use crate::crypto::commitment::{verify_commitment, Commitment};
use crate::crypto::hash::double_sha256;
use crate::crypto::paillier::Ciphertext;
use crate::error::{ProtocolError, Result};
use crate::rangeproof::RangeProof;

/// A confidential transfer.
///
/// The amount appears three times, never in the clear: as a Pedersen
/// commitment (binding, for the range proof), as a Paillier ciphertext
/// (recoverable by the key holder, summable), and implicitly in the range
/// proof. The blinding factor that opens the commitment is *not* here; it
/// stays with the sender in a [`TransactionOpening`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// `hex(double_sha256(signable_bytes))`.
    pub tx_id: String,
    pub tx_family: String,
    pub sender: String,
    pub recipient: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub commitment: Commitment,
    pub encrypted_amount: Ciphertext,
    pub range_proof: RangeProof,
    /// Sender's signature over `signable_bytes`.
    pub signature: Vec<u8>,
}

impl Transaction {
    /// Canonical bytes covered by the id and the signature.
    ///
    /// Layout: version byte, then `tx_family`, `sender`, `recipient` each
    /// followed by `0x00`, then timestamp (i64 LE), commitment (32 bytes),
    /// ciphertext and modulus (each u32 LE length + big-endian bytes),
    /// backend tag, `min` and `max` (u64 LE), proof (u32 LE length + bytes).
    ///
    /// `tx_id` and `signature` are excluded.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let value = self.encrypted_amount.value_bytes();
        let modulus = self.encrypted_amount.modulus_bytes();
        let proof = &self.range_proof.bytes;

        let mut buf = Vec::with_capacity(
            64 + self.tx_family.len()
                + self.sender.len()
                + self.recipient.len()
                + value.len()
                + modulus.len()
                + proof.len(),
        );

        buf.push(CANONICAL_ENCODING_VERSION);

        buf.extend_from_slice(self.tx_family.as_bytes());
        buf.push(0x00);
        buf.extend_from_slice(self.sender.as_bytes());
        buf.push(0x00);
        buf.extend_from_slice(self.recipient.as_bytes());
        buf.push(0x00);

        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(self.commitment.as_bytes());

        put_length_prefixed(&mut buf, &value);
        put_length_prefixed(&mut buf, &modulus);

        buf.push(self.range_proof.backend.tag());
        buf.extend_from_slice(&self.range_proof.min.to_le_bytes());
        buf.extend_from_slice(&self.range_proof.max.to_le_bytes());
        put_length_prefixed(&mut buf, proof);

        buf
    }

    pub fn compute_id(&self) -> String {
        hex::encode(double_sha256(&self.signable_bytes()))
    }

    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }

    /// Cheap checks that need no keys: required fields are present, the
    /// family is known, and `tx_id` matches the content.
    pub fn validate_structure(&self) -> Result<()> {
        let invalid = |reason: String| Err(ProtocolError::InvalidValue(reason));

        if !TX_FAMILIES.contains(&self.tx_family.as_str()) {
            return invalid(format!("unknown transaction family {:?}", self.tx_family));
        }
        for (name, value) in [("sender", &self.sender), ("recipient", &self.recipient)] {
            if value.is_empty() {
                return invalid(format!("{} is empty", name));
            }
            if value.contains('\0') {
                return invalid(format!("{} contains a NUL byte", name));
            }
        }
        if self.range_proof.bytes.is_empty() {
            return invalid("range proof is empty".into());
        }
        if !self.is_signed() {
            return invalid("transaction is unsigned".into());
        }
        let expected = self.compute_id();
        if self.tx_id != expected {
            return invalid(format!(
                "transaction id mismatch: expected {}, got {}",
                expected, self.tx_id
            ));
        }
        Ok(())
    }
}

fn put_length_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

/// The sender's private opening of a transaction's commitment.
///
/// Returned next to the [`Transaction`] at creation. It is not serializable
/// and is never written to the ledger.
#[derive(Clone, PartialEq, Eq)]
pub struct TransactionOpening {
    pub tx_id: String,
    pub amount: u64,
    pub blinding: Scalar,
}

impl TransactionOpening {
    /// Whether this opening matches `tx`'s commitment.
    pub fn opens(&self, tx: &Transaction) -> bool {
        let Ok(amount) = i64::try_from(self.amount) else {
            return false;
        };
        self.tx_id == tx.tx_id && verify_commitment(&tx.commitment, amount, &self.blinding)
    }
}

impl fmt::Debug for TransactionOpening {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionOpening")
            .field("tx_id", &self.tx_id)
            .field("amount", &"<redacted>")
            .field("blinding", &"<redacted>")
            .finish()
    }
}
