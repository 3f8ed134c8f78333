//! Operator commands for Licensor.
//!
//! Usage:
//!   licensor new-password
//!   licensor keygen --algorithm ed25519 --out keys/
//!   licensor verify --file license.yaml --public-key keys/public.pem --algorithm ed25519
//!   licensor check-config
//!
//! `verify` exits with a distinct status for each outcome so scripts can
//! tell a tampered file from one that is merely unreadable.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use licensor_crypto::new_password;
use licensor_issuance::EngineConfig;
use licensor_license::{LicenseError, LicenseFile, generate_key_pair, verify};
use licensor_types::{Algorithm, DATE_FORMAT};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

/// The license verified and has not expired.
pub const EXIT_VALID: u8 = 0;
/// The signature did not match: tampered file or wrong key.
pub const EXIT_BAD_SIGNATURE: u8 = 2;
/// The file could not be decoded.
pub const EXIT_MALFORMED: u8 = 3;
/// The license verified but is past its expiry date.
pub const EXIT_EXPIRED: u8 = 4;

pub const PUBLIC_KEY_FILE: &str = "public.pem";
pub const PRIVATE_KEY_FILE: &str = "private.pem";
/// Name of the private key file when it is written encrypted.
pub const ENCRYPTED_PRIVATE_KEY_FILE: &str = "private.pem.enc";

#[derive(Parser, Debug)]
#[command(name = "licensor", version)]
#[command(about = "License key and license file tooling")]
pub struct Cli {
    /// Path to the engine configuration file [default: ~/.licensor/config.toml]
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a new random private key password for the config file
    NewPassword,

    /// Generate a key pair and write it as PEM files
    Keygen {
        /// rsa, ecdsa or ed25519
        #[arg(short, long, default_value = "ed25519")]
        algorithm: Algorithm,

        /// Output directory
        #[arg(short, long)]
        out: PathBuf,

        /// Overwrite existing key files
        #[arg(long)]
        force: bool,
    },

    /// Verify a license file against a public key
    Verify {
        /// License file (YAML or JSON)
        #[arg(short, long)]
        file: PathBuf,

        /// PEM public key
        #[arg(short = 'k', long)]
        public_key: PathBuf,

        /// Algorithm the key pair was generated with
        #[arg(short, long)]
        algorithm: Algorithm,
    },

    /// Validate the configuration file and report weak settings
    CheckConfig,
}

/// Loads the engine configuration.
///
/// An explicit path must exist. The default path may be absent, in which
/// case built-in defaults are used.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => {
            let path = EngineConfig::default_path();
            if path.exists() {
                EngineConfig::load_from(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))
            } else {
                info!("No config at {:?}, using defaults", path);
                Ok(EngineConfig::default())
            }
        }
    }
}

/// Runs one parsed command.
pub fn run(cli: &Cli) -> Result<ExitCode> {
    match &cli.command {
        Command::NewPassword => {
            println!("{}", new_password());
            Ok(ExitCode::SUCCESS)
        }
        Command::Keygen { algorithm, out, force } => {
            let config = load_config(cli.config.as_deref())?;
            let written = keygen(&config, *algorithm, out, *force)?;
            println!("public key:  {}", written.public_path.display());
            println!("private key: {}", written.private_path.display());
            if !written.encrypted {
                eprintln!("warning: private key written unencrypted");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Verify { file, public_key, algorithm } => {
            let config = load_config(cli.config.as_deref())?;
            let outcome = verify_file(file, public_key, *algorithm)?;
            let code = outcome.exit_code(&Utc::now().with_timezone(&config.offset()));
            report(&outcome, code == EXIT_EXPIRED);
            Ok(ExitCode::from(code))
        }
        Command::CheckConfig => {
            let config = load_config(cli.config.as_deref())?;
            let warnings = config_warnings(&config);
            for warning in &warnings {
                warn!("{warning}");
            }
            println!("configuration ok");
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ── keygen ───────────────────────────────────────────────────────

/// Files written by [`keygen`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeygenOutput {
    pub public_path: PathBuf,
    pub private_path: PathBuf,
    /// Whether the private key file holds AES-GCM ciphertext.
    pub encrypted: bool,
}

/// Generates a key pair and writes it to `out`.
///
/// The private key is encrypted with the configured password, if any, and
/// written to [`ENCRYPTED_PRIVATE_KEY_FILE`]; otherwise it is written as
/// plain PKCS#8 PEM to [`PRIVATE_KEY_FILE`].
pub fn keygen(
    config: &EngineConfig,
    algorithm: Algorithm,
    out: &Path,
    force: bool,
) -> Result<KeygenOutput> {
    let encryptor = config.key_encryptor()?;
    let encrypted = encryptor.is_encrypting();
    let public_path = out.join(PUBLIC_KEY_FILE);
    let private_path = out.join(if encrypted {
        ENCRYPTED_PRIVATE_KEY_FILE
    } else {
        PRIVATE_KEY_FILE
    });

    if !force {
        for path in [&public_path, &private_path] {
            if path.exists() {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
        }
    }

    let generated = generate_key_pair(algorithm, config.rsa_bits)?;
    let private_bytes = encryptor
        .encrypt_key(generated.private_pem.as_bytes())
        .context("Failed to encrypt private key")?;

    fs::create_dir_all(out).with_context(|| format!("Failed to create {}", out.display()))?;
    fs::write(&public_path, generated.public_pem.as_bytes())
        .with_context(|| format!("Failed to write {}", public_path.display()))?;
    write_private(&private_path, &private_bytes)?;

    info!(%algorithm, encrypted, "Wrote key pair to {:?}", out);
    Ok(KeygenOutput {
        public_path,
        private_path,
        encrypted,
    })
}

fn write_private(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    // `mode` only applies to new files; an overwritten key keeps its old mode.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to restrict {}", path.display()))?;
    }
    file.write_all(bytes)
        .with_context(|| format!("Failed to write {}", path.display()))
}

// ── verify ───────────────────────────────────────────────────────

/// Result of checking a license file.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyOutcome {
    Valid(LicenseFile),
    /// Tampered file or wrong key.
    BadSignature,
    /// The file could not be decoded; carries the decoder's message.
    Malformed(String),
}

impl VerifyOutcome {
    /// Process exit status for this outcome, judging expiry at `now` in its
    /// own time zone.
    pub fn exit_code<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> u8 {
        match self {
            Self::Valid(file) if file.is_expired(now) => EXIT_EXPIRED,
            Self::Valid(_) => EXIT_VALID,
            Self::BadSignature => EXIT_BAD_SIGNATURE,
            Self::Malformed(_) => EXIT_MALFORMED,
        }
    }
}

/// Verifies the license at `file` with the PEM public key at `public_key`.
///
/// Bad signatures and undecodable files are outcomes, not errors. Unreadable
/// paths and unusable keys are errors.
pub fn verify_file(file: &Path, public_key: &Path, algorithm: Algorithm) -> Result<VerifyOutcome> {
    let bytes = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let pem = fs::read_to_string(public_key)
        .with_context(|| format!("Failed to read {}", public_key.display()))?;

    match verify(&bytes, &pem, algorithm) {
        Ok(license) => Ok(VerifyOutcome::Valid(license)),
        Err(LicenseError::BadSignature) => Ok(VerifyOutcome::BadSignature),
        Err(LicenseError::MalformedFile(reason)) => Ok(VerifyOutcome::Malformed(reason)),
        Err(err) => Err(err).with_context(|| format!("Cannot verify with {}", public_key.display())),
    }
}

fn report(outcome: &VerifyOutcome, expired: bool) {
    match outcome {
        VerifyOutcome::Valid(file) => {
            println!("signature: valid");
            if let Some(name) = &file.app_name {
                println!("application: {name}");
            }
            if let Some(id) = file.license_id {
                println!("license id: {id}");
            }
            println!("company: {}", file.company_name);
            println!("contact: {} <{}>", file.contact_name, file.email);
            println!("issued: {}", file.issue_date.format(DATE_FORMAT));
            println!("expires: {}", file.expire_date.format(DATE_FORMAT));
            for (name, value) in &file.extra {
                println!("  {name} = {value}");
            }
            if expired {
                eprintln!("license expired");
            }
        }
        VerifyOutcome::BadSignature => eprintln!("license signature invalid"),
        VerifyOutcome::Malformed(reason) => eprintln!("malformed license file: {reason}"),
    }
}

// ── check-config ─────────────────────────────────────────────────

/// Settings that are valid but weaker than they should be.
pub fn config_warnings(config: &EngineConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if !config.encrypts_keys() {
        warnings.push(
            "private_key_password is not set; private keys are stored unencrypted".to_string(),
        );
    }
    warnings
}
