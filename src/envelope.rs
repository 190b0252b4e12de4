//! Encryption/decryption of in-memory data using a password-derived key
//!
//! This module implements password-based authenticated encryption using:
//! - PBKDF2-HMAC-SHA256 (or bare SHA-256) for key derivation, see [`crate::kdf`]
//! - AES-256-GCM for authenticated encryption, with no associated data
//!
//! The binary formats are:
//! - `Salted`:   tag `0x01` (1) + salt (16) + nonce (12) + sealed box
//! - `Unsalted`: tag `0x02` (1) + nonce (12) + sealed box
//! - `Legacy`:   salt (16) + nonce (12) + sealed box, with no tag byte
//!
//! The sealed box is the ciphertext followed by the 16-byte GCM tag.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

use crate::error::{EnvelockError, ErrorCategory, ErrorKind, Result};
use crate::kdf::{self, Kdf, SALT_LEN};

/// Length of nonce in bytes
pub const NONCE_LEN: usize = 12;

/// Length of the GCM authentication tag in bytes
pub const TAG_LEN: usize = 16;

/// Inputs shorter than this are rejected as truncated regardless of format.
pub const MIN_ENVELOPE_LEN: usize = SALT_LEN + NONCE_LEN;

const SALTED_TAG: u8 = 0x01;
const UNSALTED_TAG: u8 = 0x02;

const AUTH_FAILED_MSG: &str = "corrupt input, tampered-with data, or bad password";

/// Envelope layout written by [`encrypt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Tagged, PBKDF2 key over a fresh random salt.
    #[default]
    Salted,
    /// Tagged, SHA-256 key with no salt.
    Unsalted,
    /// Untagged salted layout of earlier releases. Only readable through
    /// [`decrypt_legacy`].
    Legacy,
}

impl Format {
    fn tag(self) -> Option<u8> {
        match self {
            Format::Salted => Some(SALTED_TAG),
            Format::Unsalted => Some(UNSALTED_TAG),
            Format::Legacy => None,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            SALTED_TAG => Some(Format::Salted),
            UNSALTED_TAG => Some(Format::Unsalted),
            _ => None,
        }
    }

    fn kdf(self) -> Kdf {
        match self {
            Format::Salted | Format::Legacy => Kdf::Pbkdf2Sha256,
            Format::Unsalted => Kdf::Sha256,
        }
    }
}

/// Encrypt plaintext with a password using a random salt and nonce from the OS.
pub fn encrypt(format: Format, password: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    encrypt_with_rng(&mut OsRng, format, password, plaintext)
}

/// Encrypt plaintext drawing the salt and nonce from `rng`.
///
/// Production callers go through [`encrypt`]. Tests pass a seeded generator
/// to get reproducible envelopes.
pub fn encrypt_with_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
    format: Format,
    password: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let kdf = format.kdf();
    let mut salt = [0u8; SALT_LEN];
    if kdf.salt_len() > 0 {
        salt = kdf::generate_salt(rng);
    }
    let salt = &salt[..kdf.salt_len()];

    let key = kdf.derive(password, salt);

    let mut nonce = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce);

    let sealed_box = seal(&key[..], &nonce, plaintext)?;

    let mut output = Vec::with_capacity(1 + salt.len() + NONCE_LEN + sealed_box.len());
    if let Some(tag) = format.tag() {
        output.push(tag);
    }
    output.extend_from_slice(salt);
    output.extend_from_slice(&nonce);
    output.extend_from_slice(&sealed_box);

    Ok(output)
}

/// Decrypt a tagged envelope with a password.
///
/// The format is read from the first byte. Untagged envelopes must go
/// through [`decrypt_legacy`].
pub fn decrypt(password: &[u8], envelope: &[u8]) -> Result<Vec<u8>> {
    check_min_len(envelope)?;

    let format = Format::from_tag(envelope[0]).ok_or_else(|| {
        EnvelockError::with_kind(
            ErrorCategory::User,
            ErrorKind::UnsupportedFormat,
            format!("unrecognized envelope format tag 0x{:02x}", envelope[0]),
        )
    })?;

    open_body(format.kdf(), password, &envelope[1..])
}

/// Decrypt an untagged salted envelope as written by earlier releases.
pub fn decrypt_legacy(password: &[u8], envelope: &[u8]) -> Result<Vec<u8>> {
    check_min_len(envelope)?;
    open_body(Kdf::Pbkdf2Sha256, password, envelope)
}

fn check_min_len(envelope: &[u8]) -> Result<()> {
    if envelope.len() < MIN_ENVELOPE_LEN {
        return Err(truncated("header"));
    }
    Ok(())
}

/// Parse `[salt] ‖ nonce ‖ sealed box` and open it.
fn open_body(kdf: Kdf, password: &[u8], body: &[u8]) -> Result<Vec<u8>> {
    let salt_len = kdf.salt_len();
    if body.len() < salt_len {
        return Err(truncated("salt"));
    }
    let (salt, rest) = body.split_at(salt_len);

    if rest.len() < NONCE_LEN {
        return Err(truncated("nonce"));
    }
    let (nonce, sealed_box) = rest.split_at(NONCE_LEN);

    let key = kdf.derive(password, salt);
    open(&key[..], nonce, sealed_box)
}

fn truncated(component: &str) -> EnvelockError {
    EnvelockError::with_kind(
        ErrorCategory::User,
        ErrorKind::TruncatedEnvelope,
        format!("input likely truncated while reading {}", component),
    )
}

fn cipher(key: &[u8]) -> Result<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key).map_err(|e| {
        EnvelockError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::Configuration,
            format!("failed to construct cipher: {}", e),
        )
    })
}

/// AES-256-GCM seal with no associated data. Returns ciphertext ‖ tag.
pub(crate) fn seal(key: &[u8], nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    if nonce.len() != NONCE_LEN {
        return Err(EnvelockError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::Configuration,
            format!("nonce must be {} bytes, got {}", NONCE_LEN, nonce.len()),
        ));
    }
    cipher(key)?
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| {
            EnvelockError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::Configuration,
                "encryption failed",
            )
        })
}

/// AES-256-GCM open. Every failure maps to the same authentication error.
pub(crate) fn open(key: &[u8], nonce: &[u8], sealed_box: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher(key)?;
    cipher
        .decrypt(Nonce::from_slice(nonce), sealed_box)
        .map_err(|_| {
            EnvelockError::with_kind(
                ErrorCategory::User,
                ErrorKind::AuthenticationFailed,
                AUTH_FAILED_MSG,
            )
        })
}
