//! Error types for the licensing engine.

use licensor_types::Algorithm;
use thiserror::Error;

/// Licensing engine errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Caller input rejected. The message is meant to be shown verbatim.
    #[error("{0}")]
    Validation(String),

    /// The license file cannot be decoded at all.
    #[error("malformed license file: {0}")]
    MalformedFile(String),

    /// The signature does not match the content (tampered file or wrong key).
    #[error("license signature invalid")]
    BadSignature,

    /// The algorithm name is not one this engine knows.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A key was used with an algorithm other than its own.
    #[error("algorithm mismatch: expected {expected}, key is {actual}")]
    AlgorithmMismatch { expected: Algorithm, actual: Algorithm },

    /// Key material could not be parsed or encoded.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Key generation failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// A license could not be encoded.
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl LicenseError {
    /// Returns true if the error means a signature did not verify.
    ///
    /// Only this case indicates tampering or a wrong key; every other error
    /// is a format, configuration or input problem.
    #[must_use]
    pub fn is_trust_violation(&self) -> bool {
        matches!(self, Self::BadSignature)
    }
}

impl From<licensor_types::Error> for LicenseError {
    fn from(err: licensor_types::Error) -> Self {
        match err {
            licensor_types::Error::UnsupportedAlgorithm(name) => Self::UnsupportedAlgorithm(name),
            other => Self::Validation(other.to_string()),
        }
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
