//! Authenticated encryption using AES-GCM
//!
//! The binary format is:
//! - nonce: 12 bytes
//! - sealed box: variable length (ciphertext followed by a 16-byte GCM tag)
//!
//! There is no header. The AES variant is selected by the key length
//! (16, 24 or 32 bytes); both key derivation schemes produce 32 bytes.

use crate::error::{CryptfileError, ErrorCategory, ErrorKind, Result};
use crate::kdf::DerivedKey;
use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes192;
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;

/// Length of nonce in bytes
pub const NONCE_LEN: usize = 12;

/// Length of the GCM authentication tag in bytes
pub const TAG_LEN: usize = 16;

/// Smallest well-formed ciphertext: a nonce and the tag of an empty message
pub const MIN_CIPHERTEXT_LEN: usize = NONCE_LEN + TAG_LEN;

type Aes192Gcm = AesGcm<Aes192, U12>;

enum Gcm {
    Aes128(Aes128Gcm),
    Aes192(Aes192Gcm),
    Aes256(Aes256Gcm),
}

impl Gcm {
    fn new(key: &DerivedKey) -> Result<Self> {
        let bytes = key.as_bytes();
        let gcm = match bytes.len() {
            16 => Aes128Gcm::new_from_slice(bytes).map(Gcm::Aes128),
            24 => Aes192Gcm::new_from_slice(bytes).map(Gcm::Aes192),
            32 => Aes256Gcm::new_from_slice(bytes).map(Gcm::Aes256),
            n => {
                return Err(CryptfileError::with_kind(
                    ErrorCategory::Internal,
                    ErrorKind::CipherConfig,
                    format!("invalid AES key size {} (want 16, 24 or 32 bytes)", n),
                ));
            }
        };
        gcm.map_err(|e| {
            CryptfileError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::CipherConfig,
                "failed to create AES-GCM cipher",
                e,
            )
        })
    }

    fn seal(&self, nonce: &Nonce<U12>, plaintext: &[u8]) -> aes_gcm::aead::Result<Vec<u8>> {
        match self {
            Gcm::Aes128(c) => c.encrypt(nonce, plaintext),
            Gcm::Aes192(c) => c.encrypt(nonce, plaintext),
            Gcm::Aes256(c) => c.encrypt(nonce, plaintext),
        }
    }

    fn open(&self, nonce: &Nonce<U12>, sealed_box: &[u8]) -> aes_gcm::aead::Result<Vec<u8>> {
        match self {
            Gcm::Aes128(c) => c.decrypt(nonce, sealed_box),
            Gcm::Aes192(c) => c.decrypt(nonce, sealed_box),
            Gcm::Aes256(c) => c.decrypt(nonce, sealed_box),
        }
    }
}

/// Encrypt plaintext under `key` with a fresh random nonce
///
/// Returns the binary format: nonce(12) + ciphertext + tag(16)
pub fn encrypt(plaintext: &[u8], key: &DerivedKey) -> Result<Vec<u8>> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    encrypt_with_nonce(plaintext, key, &nonce)
}

/// Encrypt plaintext under `key` using the provided nonce
///
/// This function is ONLY for producing reproducible test vectors.
/// NEVER use this in production - always use `encrypt()`, which draws a
/// random nonce. Reusing a nonce under one key breaks GCM entirely.
pub fn encrypt_with_nonce(
    plaintext: &[u8],
    key: &DerivedKey,
    nonce: &[u8; NONCE_LEN],
) -> Result<Vec<u8>> {
    let gcm = Gcm::new(key)?;

    let nonce_obj = Nonce::<U12>::from_slice(nonce);
    let sealed_box = gcm.seal(nonce_obj, plaintext).map_err(|e| {
        CryptfileError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::CipherConfig,
            "encryption failed",
            e,
        )
    })?;

    let mut output = Vec::with_capacity(NONCE_LEN + sealed_box.len());
    output.extend_from_slice(nonce);
    output.extend_from_slice(&sealed_box);

    Ok(output)
}

/// Decrypt a nonce-prefixed sealed box under `key`
///
/// Fails without returning any plaintext if the input is too short, or if
/// the tag does not verify.
pub fn decrypt(ciphertext: &[u8], key: &DerivedKey) -> Result<Vec<u8>> {
    let gcm = Gcm::new(key)?;

    if ciphertext.len() < MIN_CIPHERTEXT_LEN {
        return Err(CryptfileError::with_kind(
            ErrorCategory::User,
            ErrorKind::MalformedInput,
            format!(
                "input too short: {} bytes, need at least {} for nonce and tag",
                ciphertext.len(),
                MIN_CIPHERTEXT_LEN
            ),
        ));
    }

    let (nonce, sealed_box) = ciphertext.split_at(NONCE_LEN);
    let nonce_obj = Nonce::<U12>::from_slice(nonce);

    gcm.open(nonce_obj, sealed_box).map_err(|_| {
        CryptfileError::with_kind(
            ErrorCategory::User,
            ErrorKind::AuthenticationFailed,
            "corrupt input, tampered-with data, or bad passphrase",
        )
    })
}
