//! Error types for storage and issuance.

use licensor_crypto::CryptoError;
use licensor_license::LicenseError;
use licensor_types::LicenseId;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Entity not found.
    #[error("entity not found: {0}")]
    NotFound(String),

    /// A stored row does not hold a valid value.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A previous transaction panicked while holding the store.
    #[error("store lock poisoned")]
    Lock,
}

/// Result type for issuance operations.
pub type IssuanceResult<T> = Result<T, IssuanceError>;

/// Errors that can occur while managing keys and issuing licenses.
#[derive(Debug, Error)]
pub enum IssuanceError {
    /// Caller input rejected. The message is meant to be shown verbatim.
    #[error("{0}")]
    Validation(String),

    /// Signing, key parsing or license encoding failed.
    #[error(transparent)]
    License(#[from] LicenseError),

    /// Private key encryption or decryption failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A freshly signed license did not pass its own verification.
    /// Indicates an encoding bug; the issuance was rolled back.
    #[error("self-verification of license {license_id} failed: {reason}")]
    Consistency { license_id: LicenseId, reason: String },

    /// The license never completed issuance and must not be exported.
    #[error("license {0} is not verified")]
    NotVerified(LicenseId),

    /// Invalid engine configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<licensor_types::Error> for IssuanceError {
    fn from(err: licensor_types::Error) -> Self {
        Self::License(err.into())
    }
}
