//! # Cryptographic Primitives for SHADE
//!
//! Everything that touches a secret lives under here.
//!
//! - **Ed25519** for transaction signatures, behind the [`Signer`] trait.
//! - **Pedersen commitments** over Ristretto for amounts.
//! - **Paillier** for amounts that must stay summable and recoverable.
//! - **SHA-256** for ids that leave the process, **BLAKE3** for internal
//!   derivations.
//!
//! ## A note on "rolling your own crypto"
//!
//! The curve arithmetic, the signatures and the Bulletproofs are audited
//! crates. Paillier is the one scheme implemented here, on top of
//! `num-bigint`, and it is kept small enough to read in one sitting. If you
//! are tempted to optimize it, write the test first.

pub mod commitment;
pub mod hash;
pub mod keys;
pub mod paillier;
pub mod signer;

// Re-export the things people actually need.
pub use commitment::{
    commit, create_commitment, create_secondary_address, verify_commitment, Commitment,
    PedersenGenerators, SecondaryAddress,
};
pub use hash::{domain_separated_hash, double_sha256, sha256};
pub use keys::{KeyError, SigningKeypair, SigningPublicKey, TxSignature};
pub use paillier::{
    add_ciphertexts, decrypt_value, encrypt_value, mul_plaintext, Ciphertext, PaillierKeypair,
    PaillierPrivateKey, PaillierPublicKey,
};
pub use signer::{Ed25519Signer, Signer};
