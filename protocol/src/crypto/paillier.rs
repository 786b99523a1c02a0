//! # Paillier Homomorphic Encryption
//!
//! Additively homomorphic public-key encryption over `Z*_{n²}`, used for
//! transaction amounts (so a recipient or auditor can recover them) and as
//! the arithmetic substrate of the Paillier PSI scheme.
//!
//! ```text
//! keygen:   n = p*q,  g = n + 1,  λ = lcm(p-1, q-1),  μ = λ⁻¹ mod n
//! encrypt:  c = g^m * r^n          mod n²   (r random, gcd(r, n) = 1)
//! decrypt:  m = L(c^λ mod n²) * μ  mod n,   L(u) = (u - 1) / n
//! add:      Enc(a) * Enc(b)        mod n²  = Enc(a + b)
//! scale:    Enc(a)^k               mod n²  = Enc(k * a)
//! ```
//!
//! With `g = n + 1`, `g^m mod n² = 1 + m*n`, which saves one modular
//! exponentiation per encryption.
//!
//! ## Signed amounts
//!
//! Plaintexts live in `Z_n`. Signed integers are encoded as `m mod n`, and
//! anything above `n / 2` decodes as negative. That is what makes
//! `Enc(a) ⊕ Enc(-b)` decrypt to `a - b`.
//!
//! ## Key mismatch detection
//!
//! A [`Ciphertext`] carries the modulus it was produced under. Decrypting
//! with any other key is a `DecryptionError`, never a garbage plaintext.

use num_bigint::{BigInt, BigUint, RandBigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};
use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::MIN_PAILLIER_KEY_BITS;
use crate::error::{ProtocolError, Result};

/// Miller-Rabin rounds per candidate. Error probability below 4^-40.
const MILLER_RABIN_ROUNDS: usize = 40;

/// Small primes for cheap trial division before Miller-Rabin.
const SMALL_PRIMES: [u32; 24] = [
    3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
];

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Paillier public key `(n, n²)`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaillierPublicKey {
    n: BigUint,
    n_squared: BigUint,
}

/// Paillier private key `(λ, μ)` plus the modulus it belongs to.
#[derive(Clone)]
pub struct PaillierPrivateKey {
    n: BigUint,
    n_squared: BigUint,
    lambda: BigUint,
    mu: BigUint,
}

/// A matched Paillier keypair.
#[derive(Clone)]
pub struct PaillierKeypair {
    pub public: PaillierPublicKey,
    pub private: PaillierPrivateKey,
}

/// A Paillier ciphertext together with the modulus it was produced under.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCiphertext")]
pub struct Ciphertext {
    c: BigUint,
    n: BigUint,
}

/// Unchecked wire form of a [`Ciphertext`].
#[derive(Deserialize)]
struct RawCiphertext {
    c: BigUint,
    n: BigUint,
}

impl TryFrom<RawCiphertext> for Ciphertext {
    type Error = ProtocolError;

    fn try_from(raw: RawCiphertext) -> Result<Self> {
        let ct = Ciphertext { c: raw.c, n: raw.n };
        ct.validate()?;
        Ok(ct)
    }
}

impl PaillierKeypair {
    /// Generate a keypair with a modulus of `bits` bits using `OsRng`.
    pub fn generate(bits: u64) -> Result<Self> {
        Self::generate_with_rng(bits, &mut OsRng)
    }

    /// Generate a keypair from a caller-supplied RNG. Deterministic RNGs are
    /// for tests only.
    pub fn generate_with_rng<R: Rng + ?Sized>(bits: u64, rng: &mut R) -> Result<Self> {
        if bits < MIN_PAILLIER_KEY_BITS || bits % 2 != 0 {
            return Err(ProtocolError::InvalidValue(format!(
                "paillier modulus must be an even bit length >= {}, got {}",
                MIN_PAILLIER_KEY_BITS, bits
            )));
        }

        let (p, q) = loop {
            let p = generate_prime(bits / 2, rng);
            let q = generate_prime(bits / 2, rng);
            if p != q {
                break (p, q);
            }
        };

        let n = &p * &q;
        let n_squared = &n * &n;
        let one = BigUint::one();
        let lambda = (&p - &one).lcm(&(&q - &one));
        let mu = mod_inverse(&lambda, &n).ok_or_else(|| {
            ProtocolError::InvalidValue("lambda is not invertible modulo n".into())
        })?;

        tracing::debug!(bits, "generated paillier keypair");

        Ok(Self {
            public: PaillierPublicKey {
                n: n.clone(),
                n_squared: n_squared.clone(),
            },
            private: PaillierPrivateKey {
                n,
                n_squared,
                lambda,
                mu,
            },
        })
    }
}

impl PaillierPublicKey {
    pub fn modulus(&self) -> &BigUint {
        &self.n
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> u64 {
        self.n.bits()
    }

    /// Encrypt a raw plaintext in `[0, n)`.
    pub fn encrypt_raw(&self, m: &BigUint) -> Result<Ciphertext> {
        if m >= &self.n {
            return Err(ProtocolError::InvalidValue(
                "plaintext does not fit the modulus".into(),
            ));
        }
        let r = self.random_unit(&mut OsRng);
        // g^m = (1 + n)^m = 1 + m*n  (mod n²)
        let gm = (BigUint::one() + m * &self.n) % &self.n_squared;
        let rn = r.modpow(&self.n, &self.n_squared);
        Ok(Ciphertext {
            c: (gm * rn) % &self.n_squared,
            n: self.n.clone(),
        })
    }

    /// Encrypt a signed integer.
    pub fn encrypt(&self, value: i64) -> Result<Ciphertext> {
        let m = encode_signed(value, &self.n)?;
        self.encrypt_raw(&m)
    }

    /// Homomorphic addition: `Enc(a) ⊕ Enc(b) = Enc(a + b)`.
    pub fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.check_owned(a)?;
        self.check_owned(b)?;
        Ok(Ciphertext {
            c: (&a.c * &b.c) % &self.n_squared,
            n: self.n.clone(),
        })
    }

    /// Homomorphic subtraction: `Enc(a) ⊖ Enc(b) = Enc(a - b)`.
    pub fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.check_owned(a)?;
        self.check_owned(b)?;
        let b_inv = mod_inverse(&b.c, &self.n_squared).ok_or_else(|| {
            ProtocolError::InvalidValue("ciphertext is not invertible modulo n²".into())
        })?;
        Ok(Ciphertext {
            c: (&a.c * b_inv) % &self.n_squared,
            n: self.n.clone(),
        })
    }

    /// Homomorphic scaling by a non-negative plaintext constant.
    pub fn mul_plaintext_raw(&self, a: &Ciphertext, k: &BigUint) -> Result<Ciphertext> {
        self.check_owned(a)?;
        Ok(Ciphertext {
            c: a.c.modpow(k, &self.n_squared),
            n: self.n.clone(),
        })
    }

    /// Homomorphic scaling by a signed plaintext constant.
    pub fn mul_plaintext(&self, a: &Ciphertext, k: i64) -> Result<Ciphertext> {
        let k = encode_signed(k, &self.n)?;
        self.mul_plaintext_raw(a, &k)
    }

    /// Uniform random element of `Z*_n` (rejection-sampled).
    pub(crate) fn random_unit<R: Rng + ?Sized>(&self, rng: &mut R) -> BigUint {
        let one = BigUint::one();
        loop {
            let r = rng.gen_biguint_range(&one, &self.n);
            if r.gcd(&self.n).is_one() {
                return r;
            }
        }
    }

    fn check_owned(&self, ct: &Ciphertext) -> Result<()> {
        if ct.n != self.n {
            return Err(ProtocolError::InvalidValue(
                "ciphertexts were produced under different keys".into(),
            ));
        }
        Ok(())
    }
}

impl PaillierPrivateKey {
    /// Decrypt to the raw plaintext in `[0, n)`.
    pub fn decrypt_raw(&self, ct: &Ciphertext) -> Result<BigUint> {
        if ct.n != self.n {
            return Err(ProtocolError::DecryptionError(
                "ciphertext was produced under a different key".into(),
            ));
        }
        if ct.c.is_zero() || ct.c >= self.n_squared {
            return Err(ProtocolError::DecryptionError(
                "ciphertext outside Z*_{n^2}".into(),
            ));
        }
        if !ct.c.gcd(&self.n).is_one() {
            return Err(ProtocolError::DecryptionError(
                "ciphertext shares a factor with the modulus".into(),
            ));
        }

        let u = ct.c.modpow(&self.lambda, &self.n_squared);
        let l = (u - BigUint::one()) / &self.n;
        Ok((l * &self.mu) % &self.n)
    }

    /// Decrypt a signed integer.
    pub fn decrypt(&self, ct: &Ciphertext) -> Result<i64> {
        let m = self.decrypt_raw(ct)?;
        decode_signed(&m, &self.n)
    }
}

impl Ciphertext {
    /// Big-endian bytes of the ciphertext value.
    pub fn value_bytes(&self) -> Vec<u8> {
        self.c.to_bytes_be()
    }

    /// Big-endian bytes of the modulus this ciphertext belongs to.
    pub fn modulus_bytes(&self) -> Vec<u8> {
        self.n.to_bytes_be()
    }

    /// Whether this ciphertext was produced under `key`.
    pub fn belongs_to(&self, key: &PaillierPublicKey) -> bool {
        self.n == key.n
    }

    /// Rebuild a ciphertext from its wire parts. The modulus must exceed 1
    /// and the value must lie below `n²`.
    pub fn from_parts(value_be: &[u8], modulus_be: &[u8]) -> Result<Self> {
        let ct = Self {
            c: BigUint::from_bytes_be(value_be),
            n: BigUint::from_bytes_be(modulus_be),
        };
        ct.validate()?;
        Ok(ct)
    }

    fn validate(&self) -> Result<()> {
        if self.n <= BigUint::one() {
            return Err(ProtocolError::InvalidValue(
                "ciphertext modulus must be greater than 1".into(),
            ));
        }
        if self.c >= &self.n * &self.n {
            return Err(ProtocolError::InvalidValue(
                "ciphertext value outside Z_{n^2}".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for PaillierPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PaillierPublicKey({} bits)", self.bits())
    }
}

impl fmt::Debug for PaillierPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PaillierPrivateKey({} bits, <redacted>)", self.n.bits())
    }
}

impl fmt::Debug for PaillierKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PaillierKeypair({:?})", self.public)
    }
}

impl fmt::Debug for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = hex::encode(self.c.to_bytes_be());
        write!(f, "Ciphertext({}..)", &hex_str[..hex_str.len().min(16)])
    }
}

// ---------------------------------------------------------------------------
// Free-function API
// ---------------------------------------------------------------------------

/// Encrypt `value` under `public_key`.
pub fn encrypt_value(value: i64, public_key: &PaillierPublicKey) -> Result<Ciphertext> {
    public_key.encrypt(value)
}

/// Decrypt `ciphertext` with `private_key`.
pub fn decrypt_value(ciphertext: &Ciphertext, private_key: &PaillierPrivateKey) -> Result<i64> {
    private_key.decrypt(ciphertext)
}

/// Homomorphic addition without a key in hand. Both ciphertexts must carry
/// the same modulus.
pub fn add_ciphertexts(a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
    if a.n != b.n {
        return Err(ProtocolError::InvalidValue(
            "ciphertexts were produced under different keys".into(),
        ));
    }
    a.validate()?;
    b.validate()?;
    let n_squared = &a.n * &a.n;
    Ok(Ciphertext {
        c: (&a.c * &b.c) % n_squared,
        n: a.n.clone(),
    })
}

/// Homomorphic scaling by a signed constant, using the modulus carried by
/// the ciphertext.
pub fn mul_plaintext(ciphertext: &Ciphertext, k: i64) -> Result<Ciphertext> {
    ciphertext.validate()?;
    let k = encode_signed(k, &ciphertext.n)?;
    let n_squared = &ciphertext.n * &ciphertext.n;
    Ok(Ciphertext {
        c: ciphertext.c.modpow(&k, &n_squared),
        n: ciphertext.n.clone(),
    })
}

// ---------------------------------------------------------------------------
// Number theory helpers
// ---------------------------------------------------------------------------

fn encode_signed(value: i64, n: &BigUint) -> Result<BigUint> {
    let half = n >> 1usize;
    let magnitude = BigUint::from(value.unsigned_abs());
    if magnitude >= half {
        return Err(ProtocolError::InvalidValue(format!(
            "value {} does not fit a {}-bit modulus",
            value,
            n.bits()
        )));
    }
    if value < 0 {
        Ok(n - magnitude)
    } else {
        Ok(magnitude)
    }
}

fn decode_signed(m: &BigUint, n: &BigUint) -> Result<i64> {
    let half = n >> 1usize;
    let out_of_range = || ProtocolError::DecryptionError("plaintext does not fit i64".into());
    if m > &half {
        let magnitude = (n - m).to_i64().ok_or_else(out_of_range)?;
        Ok(-magnitude)
    } else {
        m.to_i64().ok_or_else(out_of_range)
    }
}

/// `a⁻¹ mod m` via the extended Euclidean algorithm, or `None` when
/// `gcd(a, m) != 1`.
pub(crate) fn mod_inverse(a: &BigUint, m: &BigUint) -> Option<BigUint> {
    let m_int = BigInt::from_biguint(Sign::Plus, m.clone());
    let (mut old_r, mut r) = (BigInt::from_biguint(Sign::Plus, a % m), m_int.clone());
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());

    while !r.is_zero() {
        let q = &old_r / &r;
        let next_r = &old_r - &q * &r;
        old_r = std::mem::replace(&mut r, next_r);
        let next_s = &old_s - &q * &s;
        old_s = std::mem::replace(&mut s, next_s);
    }

    if !old_r.is_one() {
        return None;
    }
    let inv = old_s.mod_floor(&m_int);
    debug_assert!(!inv.is_negative());
    inv.to_biguint()
}

fn generate_prime<R: Rng + ?Sized>(bits: u64, rng: &mut R) -> BigUint {
    let one = BigUint::one();
    loop {
        let mut candidate = rng.gen_biguint(bits);
        // Force the top two bits so p*q has exactly 2*bits bits, and make it odd.
        candidate |= &one << (bits - 1);
        candidate |= &one << (bits - 2);
        candidate |= &one;
        if is_probable_prime(&candidate, MILLER_RABIN_ROUNDS, rng) {
            return candidate;
        }
    }
}

/// Miller-Rabin probabilistic primality test with trial division up front.
pub(crate) fn is_probable_prime<R: Rng + ?Sized>(n: &BigUint, rounds: usize, rng: &mut R) -> bool {
    let one = BigUint::one();
    let two = BigUint::from(2u32);
    if n < &two {
        return false;
    }
    if n == &two {
        return true;
    }
    if n.is_even() {
        return false;
    }
    for p in SMALL_PRIMES {
        let p = BigUint::from(p);
        if n == &p {
            return true;
        }
        if (n % &p).is_zero() {
            return false;
        }
    }

    let n_minus_one = n - &one;
    let mut d = n_minus_one.clone();
    let mut s = 0u32;
    while d.is_even() {
        d >>= 1usize;
        s += 1;
    }

    'witness: for _ in 0..rounds {
        let a = rng.gen_biguint_range(&two, &n_minus_one);
        let mut x = a.modpow(&d, n);
        if x == one || x == n_minus_one {
            continue;
        }
        for _ in 1..s {
            x = x.modpow(&two, n);
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const TEST_BITS: u64 = 512;

    fn keypair() -> PaillierKeypair {
        PaillierKeypair::generate_with_rng(TEST_BITS, &mut StdRng::seed_from_u64(42)).unwrap()
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let kp = keypair();
        for v in [0i64, 1, 1000, -5, i32::MAX as i64] {
            let ct = encrypt_value(v, &kp.public).unwrap();
            assert_eq!(decrypt_value(&ct, &kp.private).unwrap(), v);
        }
    }

    #[test]
    fn encryption_is_randomized() {
        let kp = keypair();
        let a = kp.public.encrypt(7).unwrap();
        let b = kp.public.encrypt(7).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn homomorphic_addition() {
        let kp = keypair();
        let a = kp.public.encrypt(1200).unwrap();
        let b = kp.public.encrypt(-200).unwrap();
        let sum = kp.public.add(&a, &b).unwrap();
        assert_eq!(kp.private.decrypt(&sum).unwrap(), 1000);
    }

    #[test]
    fn homomorphic_subtraction_and_scaling() {
        let kp = keypair();
        let a = kp.public.encrypt(50).unwrap();
        let b = kp.public.encrypt(80).unwrap();
        let diff = kp.public.sub(&a, &b).unwrap();
        assert_eq!(kp.private.decrypt(&diff).unwrap(), -30);

        let scaled = kp.public.mul_plaintext(&a, 3).unwrap();
        assert_eq!(kp.private.decrypt(&scaled).unwrap(), 150);
    }

    #[test]
    fn keyless_helpers_match_key_methods() {
        let kp = keypair();
        let a = encrypt_value(300, &kp.public).unwrap();
        let b = encrypt_value(700, &kp.public).unwrap();
        let sum = add_ciphertexts(&a, &b).unwrap();
        assert_eq!(decrypt_value(&sum, &kp.private).unwrap(), 1000);
        let neg = mul_plaintext(&a, -2).unwrap();
        assert_eq!(decrypt_value(&neg, &kp.private).unwrap(), -600);

        let other =
            PaillierKeypair::generate_with_rng(TEST_BITS, &mut StdRng::seed_from_u64(44)).unwrap();
        let c = encrypt_value(1, &other.public).unwrap();
        assert!(matches!(
            add_ciphertexts(&a, &c),
            Err(ProtocolError::InvalidValue(_))
        ));
    }

    #[test]
    fn wrong_key_is_a_decryption_error() {
        let kp1 = keypair();
        let kp2 =
            PaillierKeypair::generate_with_rng(TEST_BITS, &mut StdRng::seed_from_u64(43)).unwrap();
        let ct = kp1.public.encrypt(10).unwrap();
        assert!(matches!(
            kp2.private.decrypt(&ct),
            Err(ProtocolError::DecryptionError(_))
        ));
    }

    #[test]
    fn corrupt_ciphertext_is_a_decryption_error() {
        let kp = keypair();
        let ct = kp.public.encrypt(10).unwrap();
        let zero = Ciphertext::from_parts(&[0], &ct.modulus_bytes()).unwrap();
        assert!(matches!(
            kp.private.decrypt(&zero),
            Err(ProtocolError::DecryptionError(_))
        ));

        let mut oversized = kp.private.n_squared.to_bytes_be();
        oversized.insert(0, 1);
        assert!(matches!(
            Ciphertext::from_parts(&oversized, &ct.modulus_bytes()),
            Err(ProtocolError::InvalidValue(_))
        ));
    }

    #[test]
    fn degenerate_modulus_is_rejected() {
        for modulus in [&[][..], &[0u8][..], &[1u8][..]] {
            assert!(matches!(
                Ciphertext::from_parts(&[5], modulus),
                Err(ProtocolError::InvalidValue(_))
            ));
        }
        assert!(Ciphertext::from_parts(&[5], &[3]).is_ok());
        assert!(Ciphertext::from_parts(&[9], &[3]).is_err());
    }

    #[test]
    fn deserializing_a_zero_modulus_fails() {
        let kp = keypair();
        let ct = kp.public.encrypt(7).unwrap();
        let mut json: serde_json::Value = serde_json::to_value(&ct).unwrap();
        json["n"] = serde_json::to_value(BigUint::zero()).unwrap();
        assert!(serde_json::from_value::<Ciphertext>(json).is_err());

        let bytes = bincode::serialize(&ct).unwrap();
        let back: Ciphertext = bincode::deserialize(&bytes).unwrap();
        assert_eq!(kp.private.decrypt(&back).unwrap(), 7);

        let forged = bincode::serialize(&(BigUint::from(5u8), BigUint::zero())).unwrap();
        assert!(bincode::deserialize::<Ciphertext>(&forged).is_err());
    }

    #[test]
    fn keyless_helpers_refuse_unchecked_ciphertexts() {
        let forged = Ciphertext {
            c: BigUint::from(5u8),
            n: BigUint::zero(),
        };
        assert!(add_ciphertexts(&forged, &forged).is_err());
        assert!(mul_plaintext(&forged, 3).is_err());
    }

    #[test]
    fn mixing_keys_in_addition_is_rejected() {
        let kp1 = keypair();
        let kp2 =
            PaillierKeypair::generate_with_rng(TEST_BITS, &mut StdRng::seed_from_u64(44)).unwrap();
        let a = kp1.public.encrypt(1).unwrap();
        let b = kp2.public.encrypt(1).unwrap();
        assert!(kp1.public.add(&a, &b).is_err());
    }

    #[test]
    fn undersized_modulus_rejected() {
        assert!(PaillierKeypair::generate(128).is_err());
    }

    #[test]
    fn miller_rabin_known_values() {
        let mut rng = StdRng::seed_from_u64(1);
        for p in [2u32, 3, 101, 7919, 104_729] {
            assert!(is_probable_prime(&BigUint::from(p), 20, &mut rng), "{p}");
        }
        for c in [1u32, 9, 561, 7917, 104_730] {
            assert!(!is_probable_prime(&BigUint::from(c), 20, &mut rng), "{c}");
        }
    }

    #[test]
    fn mod_inverse_matches_definition() {
        let m = BigUint::from(1_000_003u32);
        let a = BigUint::from(12_345u32);
        let inv = mod_inverse(&a, &m).unwrap();
        assert!(((a * inv) % &m).is_one());
        assert!(mod_inverse(&BigUint::from(6u32), &BigUint::from(9u32)).is_none());
    }
}
