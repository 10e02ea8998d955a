//! Passphrase to key derivation
//!
//! Two schemes are supported, both a pure function of the passphrase:
//! - `scrypt` (default): scrypt(N=2^15, r=8, p=1) with a fixed
//!   application salt, yielding a 32-byte key
//! - `md5-hex`: lowercase hex of the MD5 digest, the 32 ASCII characters
//!   used directly as key material. Files written with this scheme are
//!   readable by (and compatible with) the original Go tool.
//!
//! Neither scheme stores a salt, so the on-disk format stays a bare
//! nonce + sealed box.

use crate::error::{CryptfileError, ErrorCategory, ErrorKind, Result};
use clap::ValueEnum;
use md5::{Digest, Md5};
use scrypt::{Params, scrypt};
use std::fmt;
use tracing::debug;
use zeroize::Zeroizing;

/// Length of derived key in bytes, for either scheme
pub const KEY_LEN: usize = 32;

/// Fixed scrypt salt. Domain separation only; it is not secret.
const SCRYPT_SALT: &[u8] = b"cryptfile/scrypt/v1";

/// scrypt log2(N) parameter (CPU/memory cost)
const SCRYPT_LOG_N: u8 = 15;

/// scrypt r parameter (block size)
const SCRYPT_R: u32 = 8;

/// scrypt p parameter (parallelization)
const SCRYPT_P: u32 = 1;

/// How a passphrase is turned into key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum KeyDerivation {
    /// scrypt with a fixed salt
    #[default]
    Scrypt,
    /// Hex-encoded MD5 digest (legacy compatible)
    Md5Hex,
}

/// Key material derived from a passphrase. Wiped from memory on drop.
pub struct DerivedKey {
    bytes: Zeroizing<Vec<u8>>,
}

impl DerivedKey {
    /// Wraps raw key bytes. No length validation happens here; the cipher
    /// rejects unusable sizes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

/// Derive a key from a non-empty passphrase
pub fn derive_key(passphrase: &[u8], scheme: KeyDerivation) -> Result<DerivedKey> {
    if passphrase.is_empty() {
        return Err(CryptfileError::with_kind(
            ErrorCategory::User,
            ErrorKind::EmptyPassphrase,
            "passphrase must not be empty",
        ));
    }

    let key = match scheme {
        KeyDerivation::Scrypt => derive_scrypt(passphrase)?,
        KeyDerivation::Md5Hex => derive_md5_hex(passphrase)?,
    };
    debug!(?scheme, key_len = key.len(), "derived key from passphrase");

    Ok(key)
}

fn derive_scrypt(passphrase: &[u8]) -> Result<DerivedKey> {
    let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, KEY_LEN).map_err(|e| {
        CryptfileError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::KeyDerivation,
            "failed to create scrypt params",
            e,
        )
    })?;

    let mut key = Zeroizing::new(vec![0u8; KEY_LEN]);
    scrypt(passphrase, SCRYPT_SALT, &params, &mut key[..]).map_err(|e| {
        CryptfileError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::KeyDerivation,
            "scrypt key derivation failed",
            e,
        )
    })?;

    Ok(DerivedKey { bytes: key })
}

fn derive_md5_hex(passphrase: &[u8]) -> Result<DerivedKey> {
    let digest = Md5::digest(passphrase);

    let mut key = Zeroizing::new(vec![0u8; KEY_LEN]);
    hex::encode_to_slice(digest, &mut key[..]).map_err(|e| {
        CryptfileError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::KeyDerivation,
            "failed to hex-encode passphrase digest",
            e,
        )
    })?;

    Ok(DerivedKey { bytes: key })
}
