//! Abstract encryption interface for private keys at rest.
//!
//! The key pair manager depends on `Arc<dyn KeyEncryptor>` and never sees
//! the password or derived key. `AesGcmKeyEncryptor` is used when a
//! password is configured; `PlaintextKeyEncryptor` stores keys in the clear
//! and says so loudly.

use crate::cipher::{self, EncryptedData};
use crate::error::CryptoResult;
use crate::key::{derive_key, DerivedKey, KdfParams};
use tracing::warn;

/// Trait for wrapping and unwrapping private key bytes.
pub trait KeyEncryptor: Send + Sync {
    /// Wrap private key bytes for storage.
    fn encrypt_key(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Unwrap bytes previously produced by `encrypt_key`.
    fn decrypt_key(&self, stored: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Whether stored keys are actually encrypted.
    fn is_encrypting(&self) -> bool;
}

/// AES-256-GCM encryptor keyed by a password-derived key.
///
/// The PBKDF2 derivation runs once, at construction.
#[derive(Debug)]
pub struct AesGcmKeyEncryptor {
    key: DerivedKey,
}

impl AesGcmKeyEncryptor {
    /// Derives the key from `password` with the given parameters.
    pub fn new(password: &str, params: &KdfParams) -> CryptoResult<Self> {
        Ok(Self {
            key: derive_key(password, params)?,
        })
    }
}

impl KeyEncryptor for AesGcmKeyEncryptor {
    fn encrypt_key(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        Ok(cipher::encrypt(&self.key, plaintext)?.to_bytes())
    }

    fn decrypt_key(&self, stored: &[u8]) -> CryptoResult<Vec<u8>> {
        let encrypted = EncryptedData::from_bytes(stored)?;
        cipher::decrypt(&self.key, &encrypted)
    }

    fn is_encrypting(&self) -> bool {
        true
    }
}

/// No-op encryptor used when no password is configured.
/// Private keys pass through unchanged.
pub struct PlaintextKeyEncryptor;

impl PlaintextKeyEncryptor {
    /// Creates the passthrough encryptor and logs that keys are unprotected.
    pub fn new() -> Self {
        warn!("private key encryption is disabled; signing keys will be stored in plaintext");
        Self
    }
}

impl Default for PlaintextKeyEncryptor {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyEncryptor for PlaintextKeyEncryptor {
    fn encrypt_key(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        Ok(plaintext.to_vec())
    }

    fn decrypt_key(&self, stored: &[u8]) -> CryptoResult<Vec<u8>> {
        Ok(stored.to_vec())
    }

    fn is_encrypting(&self) -> bool {
        false
    }
}
