//! File encryption/decryption operations
//!
//! Each operation reads its input fully into memory, transforms it in one
//! call and writes the result atomically: the output path either keeps its
//! previous state or holds the complete new content, never a partial file.
//!
//! The passphrase is obtained and checked before the input is opened, so an
//! empty passphrase is reported as such even when the input is missing.

use crate::cipher;
use crate::config::{Config, Operation};
use crate::error::{CryptfileError, ErrorCategory, ErrorKind, Result};
use crate::kdf;
use crate::passphrase::{self, PassphraseSource};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, info};

/// Run the operation selected in `config`
pub fn run(config: &Config, source: &mut dyn PassphraseSource) -> Result<()> {
    match config.operation() {
        Operation::Encrypt => encrypt_file(config, source),
        Operation::Decrypt => decrypt_file(config, source),
    }
}

/// Encrypt `config.input()` into `config.output()`
///
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn encrypt_file(config: &Config, source: &mut dyn PassphraseSource) -> Result<()> {
    let input = config.input();
    let output = config.output();

    let passphrase = passphrase::read_nonempty(source)?;

    let plaintext = fs::read(input).map_err(|e| read_error(input, e))?;
    debug!(input = %input.display(), bytes = plaintext.len(), "read plaintext");

    let key = kdf::derive_key(&passphrase, config.kdf())?;
    let ciphertext =
        cipher::encrypt(&plaintext, &key).map_err(|e| e.with_context("encryption failed"))?;

    write_file_atomic(output, &ciphertext)
        .map_err(|e| e.with_context(format!("failed to write to {}", output.display())))?;

    info!(input = %input.display(), output = %output.display(), "encrypted file");
    Ok(())
}

/// Decrypt `config.input()` into `config.output()`
///
/// Nothing is written unless the ciphertext authenticates.
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn decrypt_file(config: &Config, source: &mut dyn PassphraseSource) -> Result<()> {
    let input = config.input();
    let output = config.output();

    let passphrase = passphrase::read_nonempty(source)?;

    let ciphertext = fs::read(input).map_err(|e| read_error(input, e))?;
    debug!(input = %input.display(), bytes = ciphertext.len(), "read ciphertext");

    let key = kdf::derive_key(&passphrase, config.kdf())?;
    let plaintext =
        cipher::decrypt(&ciphertext, &key).map_err(|e| e.with_context("failed to decrypt"))?;

    write_file_atomic(output, &plaintext)
        .map_err(|e| e.with_context(format!("failed to write to {}", output.display())))?;

    info!(input = %input.display(), output = %output.display(), "decrypted file");
    Ok(())
}

/// Write `contents` to `path` via tempfile + fsync + rename
///
/// The temp file lives in the destination directory so the rename stays on
/// one filesystem. On any error the temp file is removed when dropped.
fn write_file_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp_file = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        CryptfileError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("failed to create tempfile in {}", dir.display()),
            e,
        )
    })?;
    debug!(temp = %temp_file.path().display(), "writing output via tempfile");

    temp_file.write_all(contents).map_err(|e| {
        CryptfileError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to write to tempfile",
            e,
        )
    })?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file.flush().map_err(|e| {
        CryptfileError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to flush tempfile",
            e,
        )
    })?;
    temp_file.as_file().sync_all().map_err(|e| {
        CryptfileError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to sync file prior to rename",
            e,
        )
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| {
                CryptfileError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    "failed to set tempfile permissions",
                    e,
                )
            })?;
    }

    temp_file.persist(path).map_err(|e| {
        CryptfileError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename to target file {}", path.display()),
            e,
        )
    })?;
    Ok(())
}

fn read_error(path: &Path, err: io::Error) -> CryptfileError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    CryptfileError::with_kind_and_source(
        category,
        ErrorKind::Io,
        format!("failed to read from {}", path.display()),
        err,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::KeyDerivation;
    use crate::passphrase::LiteralPassphrase;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;

    fn config(input: PathBuf, output: Option<PathBuf>, operation: Operation) -> Config {
        Config::new(input, output, operation, KeyDerivation::Md5Hex).unwrap()
    }

    fn passphrase(bytes: &[u8]) -> LiteralPassphrase {
        LiteralPassphrase::new(bytes.to_vec())
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip_default_paths() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("hello.txt");
        let crypt_path = temp_dir.path().join("hello.txt.crypt");

        fs::write(&plain_path, b"hello world").unwrap();

        let enc = config(plain_path.clone(), None, Operation::Encrypt);
        run(&enc, &mut passphrase(b"secret")).unwrap();
        assert_eq!(
            fs::read(&crypt_path).unwrap().len(),
            11 + cipher::NONCE_LEN + cipher::TAG_LEN
        );

        fs::remove_file(&plain_path).unwrap();

        let dec = config(crypt_path, None, Operation::Decrypt);
        assert_eq!(dec.output(), plain_path.as_path());
        run(&dec, &mut passphrase(b"secret")).unwrap();

        assert_eq!(fs::read(&plain_path).unwrap(), b"hello world");
    }

    #[test]
    fn test_scrypt_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("plain.txt");
        let crypt_path = temp_dir.path().join("plain.txt.crypt");
        let decrypted_path = temp_dir.path().join("decrypted.txt");

        fs::write(&plain_path, b"scrypt protected").unwrap();

        let enc = Config::new(
            plain_path,
            Some(crypt_path.clone()),
            Operation::Encrypt,
            KeyDerivation::Scrypt,
        )
        .unwrap();
        encrypt_file(&enc, &mut passphrase(b"pw")).unwrap();

        let dec = Config::new(
            crypt_path,
            Some(decrypted_path.clone()),
            Operation::Decrypt,
            KeyDerivation::Scrypt,
        )
        .unwrap();
        decrypt_file(&dec, &mut passphrase(b"pw")).unwrap();

        assert_eq!(fs::read(&decrypted_path).unwrap(), b"scrypt protected");
    }

    #[test]
    fn test_decrypt_wrong_passphrase_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("plain.txt");
        let crypt_path = temp_dir.path().join("plain.txt.crypt");
        let decrypted_path = temp_dir.path().join("decrypted.txt");

        fs::write(&plain_path, b"secret").unwrap();
        let enc = config(plain_path, None, Operation::Encrypt);
        encrypt_file(&enc, &mut passphrase(b"correct")).unwrap();

        let dec = config(
            crypt_path,
            Some(decrypted_path.clone()),
            Operation::Decrypt,
        );
        let err = decrypt_file(&dec, &mut passphrase(b"wrong")).expect_err("expected auth failure");

        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
        assert!(!decrypted_path.exists());
        // Only the plaintext and the ciphertext remain; no stray tempfile.
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_decrypt_failure_keeps_existing_output() {
        let temp_dir = TempDir::new().unwrap();
        let crypt_path = temp_dir.path().join("junk.crypt");
        let existing = temp_dir.path().join("junk");

        fs::write(&crypt_path, [0u8; 40]).unwrap();
        fs::write(&existing, b"previous content").unwrap();

        let dec = config(crypt_path, None, Operation::Decrypt);
        assert!(decrypt_file(&dec, &mut passphrase(b"test")).is_err());

        assert_eq!(fs::read(&existing).unwrap(), b"previous content");
    }

    #[test]
    fn test_decrypt_truncated_file() {
        let temp_dir = TempDir::new().unwrap();
        let crypt_path = temp_dir.path().join("short.crypt");
        fs::write(&crypt_path, b"tiny").unwrap();

        let dec = config(crypt_path, None, Operation::Decrypt);
        let err = decrypt_file(&dec, &mut passphrase(b"test")).unwrap_err();

        assert_eq!(err.kind, Some(ErrorKind::MalformedInput));
        assert!(!temp_dir.path().join("short").exists());
    }

    #[test]
    fn test_missing_input() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("missing.txt");

        let enc = config(plain_path.clone(), None, Operation::Encrypt);
        let err = encrypt_file(&enc, &mut passphrase(b"test")).unwrap_err();

        assert_eq!(err.kind, Some(ErrorKind::Io));
        assert_eq!(err.category, ErrorCategory::User);
        assert!(!temp_dir.path().join("missing.txt.crypt").exists());
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("plain.txt");
        fs::write(&plain_path, b"data").unwrap();

        let enc = config(plain_path, None, Operation::Encrypt);
        let err = encrypt_file(&enc, &mut passphrase(b"")).unwrap_err();

        assert_eq!(err.kind, Some(ErrorKind::EmptyPassphrase));
        assert!(!temp_dir.path().join("plain.txt.crypt").exists());
    }

    #[test]
    fn test_empty_passphrase_checked_before_input() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.txt");

        let enc = config(missing.clone(), None, Operation::Encrypt);
        let err = encrypt_file(&enc, &mut passphrase(b"")).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::EmptyPassphrase));
        assert_eq!(err.exit_code(), 2);

        let dec = config(
            missing,
            Some(temp_dir.path().join("out.txt")),
            Operation::Decrypt,
        );
        let err = decrypt_file(&dec, &mut passphrase(b"")).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::EmptyPassphrase));
        assert_eq!(err.exit_code(), 2);

        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_unwritable_destination() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("plain.txt");
        let out_path = temp_dir.path().join("missing-dir").join("out.crypt");

        fs::write(&plain_path, b"data").unwrap();

        let enc = config(plain_path.clone(), Some(out_path.clone()), Operation::Encrypt);
        let err = encrypt_file(&enc, &mut passphrase(b"test")).unwrap_err();

        assert_eq!(err.kind, Some(ErrorKind::Io));
        assert_eq!(err.exit_code(), 1);
        assert!(!out_path.exists());
        let entries: Vec<PathBuf> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(entries, vec![plain_path]);
    }

    #[test]
    fn test_encrypt_overwrites_existing_output() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("plain.txt");
        let crypt_path = temp_dir.path().join("plain.txt.crypt");

        fs::write(&plain_path, b"fresh").unwrap();
        fs::write(&crypt_path, b"stale").unwrap();

        let enc = config(plain_path, None, Operation::Encrypt);
        encrypt_file(&enc, &mut passphrase(b"test")).unwrap();

        assert_ne!(fs::read(&crypt_path).unwrap(), b"stale");
    }

    #[test]
    fn test_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("empty.txt");
        let decrypted_path = temp_dir.path().join("decrypted.txt");

        fs::write(&plain_path, b"").unwrap();

        let enc = config(plain_path, None, Operation::Encrypt);
        encrypt_file(&enc, &mut passphrase(b"test")).unwrap();

        let dec = config(
            enc.output().to_path_buf(),
            Some(decrypted_path.clone()),
            Operation::Decrypt,
        );
        decrypt_file(&dec, &mut passphrase(b"test")).unwrap();

        assert_eq!(fs::read(&decrypted_path).unwrap(), b"");
    }

    #[test]
    #[cfg(unix)]
    fn test_file_permissions() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("plain.txt");

        fs::write(&plain_path, b"test").unwrap();

        let enc = config(plain_path, None, Operation::Encrypt);
        encrypt_file(&enc, &mut passphrase(b"test")).unwrap();

        let metadata = fs::metadata(enc.output()).unwrap();
        assert_eq!(metadata.permissions().mode() & 0o777, 0o600);
    }
}
