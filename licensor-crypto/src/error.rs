//! Error types for the key encryption layer.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key derivation failed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed (wrong password or tampered data).
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// The password does not have the one accepted length.
    #[error("invalid password length: expected {expected}, got {actual}")]
    InvalidPasswordLength { expected: usize, actual: usize },
}
