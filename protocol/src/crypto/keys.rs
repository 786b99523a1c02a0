//! # Signing Keys
//!
//! Ed25519 keypairs used by the default [`Ed25519Signer`](super::signer::Ed25519Signer).
//!
//! The core never persists a private key. Keypairs live with their holder;
//! the protocol only ever sees a borrowed secret for the duration of a
//! `sign` call, and public keys travel as raw 32-byte strings.
//!
//! ## Security considerations
//!
//! - Private keys are zeroized on drop (ed25519-dalek does this for us).
//! - Key generation uses `OsRng`.
//! - Key bytes are never logged, and `Debug` prints only the public half.

use ed25519_dalek::{
    Signature as DalekSignature, Signer as _, SigningKey, VerifyingKey,
    SECRET_KEY_LENGTH,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur during key operations.
///
/// Vague on purpose: error messages must not describe key material.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid secret key bytes: wrong length or not a valid scalar")]
    InvalidSecretKey,

    #[error("invalid public key bytes: not a valid Ed25519 point")]
    InvalidPublicKey,
}

/// An Ed25519 signing keypair.
///
/// Does NOT implement `Serialize`. Exporting a secret should be a deliberate
/// call to [`secret_key_bytes`](Self::secret_key_bytes), never a side effect
/// of serializing some bigger struct.
///
/// ```
/// use shade_protocol::crypto::keys::SigningKeypair;
///
/// let kp = SigningKeypair::generate();
/// let sig = kp.sign(b"transfer 1000 to 0xWhitelistedAddress2");
/// assert!(kp.public_key().verify(b"transfer 1000 to 0xWhitelistedAddress2", &sig));
/// ```
pub struct SigningKeypair {
    signing_key: SigningKey,
}

/// The public half of a [`SigningKeypair`].
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SigningPublicKey {
    bytes: [u8; 32],
}

/// A 64-byte Ed25519 signature.
///
/// Kept as `Vec<u8>` for serde. A signature of any other length simply fails
/// verification.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxSignature {
    bytes: Vec<u8>,
}

impl SigningKeypair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic construction from a 32-byte seed. Tests and key files only.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Reconstruct a keypair from raw secret bytes of any slice length,
    /// rejecting anything that is not exactly 32 bytes.
    pub fn from_secret_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let arr: [u8; SECRET_KEY_LENGTH] =
            bytes.try_into().map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_seed(&arr))
    }

    /// Reconstruct a keypair from a hex-encoded secret key (key files).
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|_| KeyError::InvalidSecretKey)?;
        Self::from_secret_slice(&bytes)
    }

    pub fn public_key(&self) -> SigningPublicKey {
        SigningPublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Sign a message. Ed25519 is deterministic, so no randomness is needed here.
    pub fn sign(&self, message: &[u8]) -> TxSignature {
        TxSignature {
            bytes: self.signing_key.sign(message).to_bytes().to_vec(),
        }
    }

    /// Export the raw 32-byte secret. Handle with care.
    pub fn secret_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key_bytes())
    }
}

impl Clone for SigningKeypair {
    fn clone(&self) -> Self {
        Self::from_seed(&self.signing_key.to_bytes())
    }
}

impl fmt::Debug for SigningKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret key material, not even partially.
        write!(f, "SigningKeypair(pub={})", self.public_key().to_hex())
    }
}

// ---------------------------------------------------------------------------
// SigningPublicKey
// ---------------------------------------------------------------------------

impl SigningPublicKey {
    /// Parse a public key from a slice, validating the length and that the
    /// bytes decode to an Ed25519 point.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; 32] = slice.try_into().map_err(|_| KeyError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Returns `false` for any malformed key or signature; never panics.
    pub fn verify(&self, message: &[u8], signature: &TxSignature) -> bool {
        verify_bytes(&self.bytes, message, signature.as_bytes())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidPublicKey)?;
        Self::try_from_slice(&bytes)
    }
}

impl fmt::Display for SigningPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for SigningPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningPublicKey({})", &self.to_hex()[..16])
    }
}

// ---------------------------------------------------------------------------
// TxSignature
// ---------------------------------------------------------------------------

impl TxSignature {
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Debug for TxSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = self.to_hex();
        if hex_str.len() >= 128 {
            write!(f, "TxSignature({}...{})", &hex_str[..8], &hex_str[120..])
        } else {
            write!(f, "TxSignature({})", hex_str)
        }
    }
}

/// Verify a signature from raw byte components.
///
/// The "bytes straight off the ledger" path: wrong lengths, invalid points
/// and bad signatures all collapse to `false`.
pub(crate) fn verify_bytes(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let Ok(pk_bytes) = <[u8; 32]>::try_from(public_key) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&pk_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = <[u8; 64]>::try_from(signature) else {
        return false;
    };
    verifying_key
        .verify_strict(message, &DalekSignature::from_bytes(&sig_bytes))
        .is_ok()
}
