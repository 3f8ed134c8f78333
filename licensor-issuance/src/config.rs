//! Engine configuration, read from `~/.licensor/config.toml`.
//!
//! ```toml
//! file_format = "yaml"
//! private_key_password = "<64 hex chars from `licensor new-password`>"
//! kdf_iterations = 210000
//! utc_offset_minutes = 60
//! rsa_bits = 3072
//! ```
//!
//! Every key is optional. Without `private_key_password`, private keys are
//! stored unencrypted.

use crate::error::{IssuanceError, IssuanceResult};
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use licensor_crypto::{
    check_password, AesGcmKeyEncryptor, KdfParams, KeyEncryptor, PlaintextKeyEncryptor,
    MIN_ITERATIONS,
};
use licensor_license::{DEFAULT_RSA_BITS, MIN_RSA_BITS};
use licensor_types::FileFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Largest accepted UTC offset, just under one day.
const MAX_OFFSET_MINUTES: i32 = 24 * 60 - 1;

/// Configuration threaded into every engine call.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Format of license files for new applications.
    #[serde(default)]
    pub file_format: FileFormat,
    /// Password protecting private keys at rest; `None` disables encryption.
    #[serde(default)]
    pub private_key_password: Option<String>,
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,
    /// Offset of the vendor's local time zone, used to decide what "today" is.
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default = "default_rsa_bits")]
    pub rsa_bits: usize,
}

fn default_kdf_iterations() -> u32 {
    MIN_ITERATIONS
}

fn default_rsa_bits() -> usize {
    DEFAULT_RSA_BITS
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            file_format: FileFormat::default(),
            private_key_password: None,
            kdf_iterations: default_kdf_iterations(),
            utc_offset_minutes: 0,
            rsa_bits: default_rsa_bits(),
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("file_format", &self.file_format)
            .field(
                "private_key_password",
                &self.private_key_password.as_ref().map(|_| "[REDACTED]"),
            )
            .field("kdf_iterations", &self.kdf_iterations)
            .field("utc_offset_minutes", &self.utc_offset_minutes)
            .field("rsa_bits", &self.rsa_bits)
            .finish()
    }
}

impl EngineConfig {
    /// Returns `~/.licensor/config.toml`.
    pub fn default_path() -> PathBuf {
        config_dir().join("config.toml")
    }

    /// Reads and validates a TOML config file.
    pub fn load_from(path: &Path) -> IssuanceResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| IssuanceError::Config(format!("cannot read {}: {e}", path.display())))?;
        let config = Self::from_toml(&contents).map_err(|e| match e {
            IssuanceError::Config(msg) => IssuanceError::Config(format!("{}: {msg}", path.display())),
            other => other,
        })?;
        info!("Loaded engine configuration from {:?}", path);
        Ok(config)
    }

    /// Parses and validates TOML text.
    pub fn from_toml(contents: &str) -> IssuanceResult<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| IssuanceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would weaken key protection or break date handling.
    pub fn validate(&self) -> IssuanceResult<()> {
        if let Some(password) = &self.private_key_password {
            check_password(password)
                .map_err(|e| IssuanceError::Config(format!("private_key_password: {e}")))?;
        }
        if self.kdf_iterations < MIN_ITERATIONS {
            return Err(IssuanceError::Config(format!(
                "kdf_iterations must be at least {MIN_ITERATIONS}, got {}",
                self.kdf_iterations
            )));
        }
        if self.rsa_bits < MIN_RSA_BITS {
            return Err(IssuanceError::Config(format!(
                "rsa_bits must be at least {MIN_RSA_BITS}, got {}",
                self.rsa_bits
            )));
        }
        if self.utc_offset_minutes.unsigned_abs() > MAX_OFFSET_MINUTES.unsigned_abs() {
            return Err(IssuanceError::Config(format!(
                "utc_offset_minutes must be within ±{MAX_OFFSET_MINUTES}, got {}",
                self.utc_offset_minutes
            )));
        }
        Ok(())
    }

    /// Whether private keys will be encrypted at rest.
    pub fn encrypts_keys(&self) -> bool {
        self.private_key_password.is_some()
    }

    /// Builds the key encryptor for this configuration.
    ///
    /// Runs the PBKDF2 derivation once when a password is set. Without one,
    /// the returned encryptor stores keys in the clear and a warning is logged.
    pub fn key_encryptor(&self) -> IssuanceResult<Arc<dyn KeyEncryptor>> {
        match &self.private_key_password {
            Some(password) => {
                let params = KdfParams::with_iterations(self.kdf_iterations);
                Ok(Arc::new(AesGcmKeyEncryptor::new(password, &params)?))
            }
            None => {
                warn!("no private_key_password configured");
                Ok(Arc::new(PlaintextKeyEncryptor::new()))
            }
        }
    }

    /// Returns the vendor's time zone.
    pub fn offset(&self) -> FixedOffset {
        // Out-of-range offsets only survive in unvalidated configs.
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).unwrap_or(Utc.fix())
    }

    /// Returns the calendar date of `now` in the vendor's time zone.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset()).date_naive()
    }
}

fn config_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        Path::new(&home).join(".licensor")
    } else if let Ok(home) = std::env::var("USERPROFILE") {
        Path::new(&home).join(".licensor")
    } else {
        PathBuf::from(".licensor")
    }
}
