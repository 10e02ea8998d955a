//! Where the passphrase comes from
//!
//! `--key` supplies it literally, `--key-stdin` streams it in, and
//! `--key-prompt` asks on the controlling terminal. Every source hands the
//! bytes back in zeroizing storage.

use crate::error::{CryptfileError, ErrorCategory, ErrorKind, Result};
use std::io::Read;
use zeroize::Zeroizing;

const PROMPT: &str = "cryptfile passphrase: ";

pub trait PassphraseSource {
    /// Produce the passphrase. Any byte sequence is accepted here; emptiness
    /// is checked by [`read_nonempty`].
    fn passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>>;
}

/// A passphrase known up front.
pub struct LiteralPassphrase(Zeroizing<Vec<u8>>);

impl LiteralPassphrase {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }
}

impl PassphraseSource for LiteralPassphrase {
    fn passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(self.0.clone())
    }
}

/// Everything a byte stream yields until EOF, trailing newline included.
pub struct StreamPassphrase<R> {
    stream: R,
}

impl<R: Read> StreamPassphrase<R> {
    pub fn new(stream: R) -> Self {
        Self { stream }
    }
}

impl<R: Read> PassphraseSource for StreamPassphrase<R> {
    fn passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let mut bytes = Zeroizing::new(Vec::new());
        self.stream.read_to_end(&mut bytes).map_err(|e| {
            CryptfileError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                "could not read the passphrase stream",
                e,
            )
        })?;
        Ok(bytes)
    }
}

/// Interactive entry with echo disabled. UTF-8 only; `--key-stdin` covers
/// arbitrary bytes.
#[derive(Default)]
pub struct PromptPassphrase;

impl PassphraseSource for PromptPassphrase {
    fn passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let entered = rpassword::prompt_password(PROMPT).map_err(|e| {
            CryptfileError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::PassphraseUnavailable,
                "no terminal available to prompt for the passphrase",
                e,
            )
        })?;
        Ok(Zeroizing::new(entered.into_bytes()))
    }
}

/// Fetch the passphrase from `source` and refuse an empty one.
///
/// Called before any file is touched so that an empty passphrase is a
/// usage error regardless of the state of the input path.
pub fn read_nonempty(source: &mut dyn PassphraseSource) -> Result<Zeroizing<Vec<u8>>> {
    let passphrase = source.passphrase()?;
    if passphrase.is_empty() {
        return Err(CryptfileError::with_kind(
            ErrorCategory::User,
            ErrorKind::EmptyPassphrase,
            "passphrase must not be empty",
        ));
    }
    Ok(passphrase)
}
