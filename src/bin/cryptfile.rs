//! cryptfile CLI - passphrase-based single-file encryption
//!
//! Encrypts or decrypts one file with AES-GCM under a key derived from a
//! passphrase. The output is the nonce followed by the sealed box.

use clap::{ArgAction, Args, Parser};
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cryptfile::config::{Config, Operation};
use cryptfile::error::Result;
use cryptfile::file_ops;
use cryptfile::kdf::KeyDerivation;
use cryptfile::passphrase::{
    LiteralPassphrase, PassphraseSource, PromptPassphrase, StreamPassphrase,
};

#[derive(Parser)]
#[command(name = "cryptfile")]
#[command(version)]
#[command(about = "Encrypt or decrypt a single file with a passphrase.", long_about = None)]
struct Cli {
    /// Path to the file to encrypt or decrypt
    #[arg(long, value_name = "FILE")]
    path: PathBuf,

    #[command(flatten)]
    operation: OperationArgs,

    #[command(flatten)]
    passphrase: PassphraseArgs,

    /// Output path. Defaults to the input path plus ".crypt" when
    /// encrypting, and the input path minus ".crypt" when decrypting
    #[arg(long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// How to turn the passphrase into a key. md5-hex matches files
    /// written by the original Go tool
    #[arg(long, value_enum, default_value_t = KeyDerivation::Scrypt)]
    kdf: KeyDerivation,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct OperationArgs {
    /// Encrypt the file
    #[arg(long)]
    enc: bool,

    /// Decrypt the file
    #[arg(long)]
    dec: bool,
}

impl OperationArgs {
    fn operation(&self) -> Operation {
        if self.dec {
            Operation::Decrypt
        } else {
            Operation::Encrypt
        }
    }
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct PassphraseArgs {
    /// Passphrase to derive the key from
    #[arg(long, value_name = "PASSPHRASE")]
    key: Option<OsString>,

    /// Read the passphrase from stdin (all bytes, verbatim)
    #[arg(long)]
    key_stdin: bool,

    /// Prompt for the passphrase on the terminal without echo
    #[arg(long)]
    key_prompt: bool,
}

impl PassphraseArgs {
    fn into_source(self) -> Box<dyn PassphraseSource> {
        match self.key {
            Some(key) => Box::new(LiteralPassphrase::new(key.into_encoded_bytes())),
            None if self.key_stdin => Box::new(StreamPassphrase::new(io::stdin())),
            None => Box::new(PromptPassphrase),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e.chain());
        process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::new(cli.path, cli.out, cli.operation.operation(), cli.kdf)?;
    debug!(?config, "resolved configuration");

    let mut source = cli.passphrase.into_source();
    file_ops::run(&config, &mut *source)
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cryptfile={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
