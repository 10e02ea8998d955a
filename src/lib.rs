//! cryptfile - passphrase-based single-file encryption using AES-GCM

#![forbid(unsafe_code)]

pub mod cipher;
pub mod config;
pub mod error;
pub mod file_ops;
pub mod kdf;
pub mod passphrase;
