//! Paillier PSI.
//!
//! Each address is mapped to `H(addr) mod n` and encrypted under the
//! authority's Paillier key. Two ciphertexts hold the same element iff
//!
//! ```text
//! Dec((Enc(a) * Enc(b)^-1)^ρ mod n²) == 0
//! ```
//!
//! for a fresh random unit `ρ`. When `a != b` the decryption is
//! `ρ * (a - b) mod n`, a uniformly random non-zero residue, so a
//! non-match tells the authority nothing about either element. Paillier
//! encryption is randomized, so comparing ciphertext bytes would never
//! work; equality has to go through the key.

use num_bigint::BigUint;
use num_traits::Zero;
use rand::rngs::OsRng;

use crate::crypto::hash::sha256_array;
use crate::crypto::paillier::{Ciphertext, PaillierKeypair, PaillierPublicKey};
use crate::error::Result;

const ELEMENT_DOMAIN: &[u8] = b"SHADE/psi/paillier/v1";

#[derive(Clone, Debug)]
pub struct PaillierPsi {
    keypair: PaillierKeypair,
}

impl PaillierPsi {
    pub fn new(keypair: PaillierKeypair) -> Self {
        Self { keypair }
    }

    pub fn generate(bits: u64) -> Result<Self> {
        Ok(Self::new(PaillierKeypair::generate(bits)?))
    }

    pub fn public_key(&self) -> &PaillierPublicKey {
        &self.keypair.public
    }

    /// `SHA-256(domain || addr)` read big-endian, reduced mod `n`.
    fn element(&self, item: &str) -> BigUint {
        let mut data = Vec::with_capacity(ELEMENT_DOMAIN.len() + item.len());
        data.extend_from_slice(ELEMENT_DOMAIN);
        data.extend_from_slice(item.as_bytes());
        BigUint::from_bytes_be(&sha256_array(&data)) % self.keypair.public.modulus()
    }

    pub fn encrypt(&self, item: &str) -> Result<Ciphertext> {
        self.keypair.public.encrypt_raw(&self.element(item))
    }

    /// Equality test on two ciphertexts under this key.
    pub fn matches(&self, a: &Ciphertext, b: &Ciphertext) -> Result<bool> {
        let public = &self.keypair.public;
        let diff = public.sub(a, b)?;
        let rho = public.random_unit(&mut OsRng);
        let masked = public.mul_plaintext_raw(&diff, &rho)?;
        Ok(self.keypair.private.decrypt_raw(&masked)?.is_zero())
    }

    pub fn contains(&self, query: &Ciphertext, reference: &[Ciphertext]) -> Result<bool> {
        for candidate in reference {
            if self.matches(query, candidate)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
