//! Key derivation from a password
//!
//! Two schemes are supported:
//! - PBKDF2-HMAC-SHA256 over a random per-envelope salt (the default)
//! - a bare SHA-256 of the password, with no salt
//!
//! The unsalted scheme offers no protection against precomputed dictionary
//! attacks. It exists so envelopes written that way stay readable.

use pbkdf2::pbkdf2_hmac;
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Length of salt in bytes
pub const SALT_LEN: usize = 16;

/// Length of derived key in bytes (AES-256)
pub const KEY_LEN: usize = 32;

/// PBKDF2 iteration count
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// A derived key, wiped from memory on drop.
pub type Key = Zeroizing<[u8; KEY_LEN]>;

/// Key derivation scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kdf {
    /// `PBKDF2-HMAC-SHA256(password, salt, PBKDF2_ITERATIONS, KEY_LEN)`
    Pbkdf2Sha256,
    /// `SHA-256(password)`
    Sha256,
}

impl Kdf {
    /// Number of salt bytes this scheme consumes.
    pub fn salt_len(self) -> usize {
        match self {
            Kdf::Pbkdf2Sha256 => SALT_LEN,
            Kdf::Sha256 => 0,
        }
    }

    /// Derive a key with this scheme. `salt` is ignored by the unsalted scheme.
    pub fn derive(self, password: &[u8], salt: &[u8]) -> Key {
        match self {
            Kdf::Pbkdf2Sha256 => derive(password, Some(salt)),
            Kdf::Sha256 => derive(password, None),
        }
    }
}

/// Derive a 32-byte key from a password and optional salt.
///
/// With a salt this runs PBKDF2-HMAC-SHA256 at [`PBKDF2_ITERATIONS`];
/// without one the key is the SHA-256 digest of the password. Both are
/// deterministic, and an empty password is accepted.
pub fn derive(password: &[u8], salt: Option<&[u8]>) -> Key {
    match salt {
        Some(salt) => derive_with_iterations(password, salt, PBKDF2_ITERATIONS),
        None => {
            let mut key = Zeroizing::new([0u8; KEY_LEN]);
            key.copy_from_slice(&Sha256::digest(password));
            key
        }
    }
}

/// PBKDF2-HMAC-SHA256 with an explicit iteration count.
pub fn derive_with_iterations(password: &[u8], salt: &[u8], iterations: u32) -> Key {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(password, salt, iterations, key.as_mut_slice());
    key
}

/// Fill a fresh salt from a cryptographically secure generator.
pub fn generate_salt<R: RngCore + CryptoRng>(rng: &mut R) -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);
    salt
}
