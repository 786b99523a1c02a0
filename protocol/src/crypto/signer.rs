//! # Signing Capability
//!
//! The protocol core never does signature math itself. It consumes a
//! [`Signer`]: `sign`, `verify` and `derive_address` over opaque byte
//! strings. That keeps the orchestrator independent of the curve, and lets a
//! deployment swap in an HSM-backed or ECDSA signer without touching the
//! transaction logic.
//!
//! [`Ed25519Signer`] is the implementation shipped with the crate.
//!
//! ## Strictness
//!
//! Verification uses ed25519-dalek's `verify_strict`, which rejects
//! small-order keys and malleable signatures that lenient verifiers accept.

use super::hash::sha256_array;
use super::keys::{verify_bytes, KeyError, SigningKeypair, SigningPublicKey};

/// Opaque signing capability consumed by the orchestrator.
pub trait Signer: Send + Sync {
    /// Sign `message` with the raw private key bytes.
    fn sign(&self, message: &[u8], private_key: &[u8]) -> Result<Vec<u8>, KeyError>;

    /// `true` iff `signature` is valid for `message` under `public_key`.
    /// Malformed inputs are a `false`, not an error.
    fn verify(&self, message: &[u8], public_key: &[u8], signature: &[u8]) -> bool;

    /// Map a public key to the address string used in transactions.
    fn derive_address(&self, public_key: &[u8]) -> Result<String, KeyError>;
}

/// Ed25519 signer. Addresses are `0x` followed by the hex of the first 20
/// bytes of `SHA-256(public_key)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Signer;

/// Number of digest bytes kept in a derived address.
const ADDRESS_BYTES: usize = 20;

impl Signer for Ed25519Signer {
    fn sign(&self, message: &[u8], private_key: &[u8]) -> Result<Vec<u8>, KeyError> {
        let keypair = SigningKeypair::from_secret_slice(private_key)?;
        Ok(keypair.sign(message).as_bytes().to_vec())
    }

    fn verify(&self, message: &[u8], public_key: &[u8], signature: &[u8]) -> bool {
        verify_bytes(public_key, message, signature)
    }

    fn derive_address(&self, public_key: &[u8]) -> Result<String, KeyError> {
        let pk = SigningPublicKey::try_from_slice(public_key)?;
        let digest = sha256_array(pk.as_bytes());
        Ok(format!("0x{}", hex::encode(&digest[..ADDRESS_BYTES])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let kp = SigningKeypair::generate();
        let signer = Ed25519Signer;
        let sig = signer.sign(b"hello", &kp.secret_key_bytes()).unwrap();
        assert_eq!(sig.len(), 64);
        assert!(signer.verify(b"hello", &kp.public_key_bytes(), &sig));
        assert!(!signer.verify(b"hullo", &kp.public_key_bytes(), &sig));
    }

    #[test]
    fn test_sign_rejects_short_secret() {
        let signer = Ed25519Signer;
        assert_eq!(
            signer.sign(b"m", &[1u8; 31]).unwrap_err(),
            KeyError::InvalidSecretKey
        );
    }

    #[test]
    fn test_verify_with_identity_point_pubkey() {
        // All zeros decodes to a small-order point; strict verification refuses it.
        let signer = Ed25519Signer;
        assert!(!signer.verify(b"doesn't matter", &[0u8; 32], &[0u8; 64]));
    }

    #[test]
    fn test_derive_address_format() {
        let kp = SigningKeypair::from_seed(&[7u8; 32]);
        let signer = Ed25519Signer;
        let addr = signer.derive_address(&kp.public_key_bytes()).unwrap();
        assert!(addr.starts_with("0x"));
        assert_eq!(addr.len(), 2 + ADDRESS_BYTES * 2);
        assert_eq!(addr, signer.derive_address(&kp.public_key_bytes()).unwrap());
    }

    #[test]
    fn test_derive_address_rejects_garbage() {
        assert!(Ed25519Signer.derive_address(b"short").is_err());
    }
}
