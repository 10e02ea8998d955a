//! Immutable run configuration
//!
//! Built once from the command line and passed by reference to the file
//! operations.

use crate::error::{CryptfileError, ErrorCategory, ErrorKind, Result};
use crate::kdf::KeyDerivation;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Extension appended on encryption and stripped on decryption
pub const CRYPT_EXTENSION: &str = "crypt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Encrypt,
    Decrypt,
}

#[derive(Debug, Clone)]
pub struct Config {
    input: PathBuf,
    output: PathBuf,
    operation: Operation,
    kdf: KeyDerivation,
}

impl Config {
    /// Resolves the output path and freezes the configuration.
    pub fn new(
        input: PathBuf,
        explicit_output: Option<PathBuf>,
        operation: Operation,
        kdf: KeyDerivation,
    ) -> Result<Self> {
        let output = resolve_output_path(&input, explicit_output.as_deref(), operation)?;
        Ok(Self {
            input,
            output,
            operation,
            kdf,
        })
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn kdf(&self) -> KeyDerivation {
        self.kdf
    }
}

/// Map the input path and an optional explicit output path to the path to write.
///
/// An explicit output always wins. Otherwise encryption appends `.crypt`
/// and decryption removes a trailing `.crypt`. The result never names the
/// input file: paths are compared as written and, when both exist, after
/// canonicalization (so `./a.txt`, `dir/../a.txt` and symlinks are caught).
/// That last check is the only filesystem access made here.
pub fn resolve_output_path(
    input: &Path,
    explicit_output: Option<&Path>,
    operation: Operation,
) -> Result<PathBuf> {
    let output = match (explicit_output, operation) {
        (Some(out), _) => out.to_path_buf(),
        (None, Operation::Encrypt) => {
            let mut name = OsString::from(input.as_os_str());
            name.push(".");
            name.push(CRYPT_EXTENSION);
            PathBuf::from(name)
        }
        (None, Operation::Decrypt) => {
            if input.extension().is_none_or(|ext| ext != CRYPT_EXTENSION) {
                return Err(CryptfileError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::OutputPathUnresolvable,
                    format!(
                        "{} does not end in .{}; pass --out to choose the output path",
                        input.display(),
                        CRYPT_EXTENSION
                    ),
                ));
            }
            input.with_extension("")
        }
    };

    if output.as_os_str().is_empty() || output == input || same_existing_file(input, &output) {
        return Err(CryptfileError::with_kind(
            ErrorCategory::User,
            ErrorKind::OutputPathUnresolvable,
            format!(
                "refusing to write output over the input file {}",
                input.display()
            ),
        ));
    }

    Ok(output)
}

fn same_existing_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
