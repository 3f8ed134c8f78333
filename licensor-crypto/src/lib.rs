//! At-rest encryption of signing keys.
//!
//! # Scheme
//!
//! 1. A 256-bit key is derived from the configured password with
//!    PBKDF2-HMAC-SHA512 over a fixed salt (at least 210,000 iterations).
//! 2. Private key bytes are sealed with AES-256-GCM under a random 96-bit
//!    nonce, stored as `nonce || ciphertext || tag`.
//!
//! Encryption is optional. Without a password, [`PlaintextKeyEncryptor`]
//! stores keys unchanged and logs a warning.

mod cipher;
mod encryptor;
mod error;
mod key;

pub use cipher::{decrypt, encrypt, EncryptedData, NONCE_SIZE, TAG_SIZE};
pub use encryptor::{AesGcmKeyEncryptor, KeyEncryptor, PlaintextKeyEncryptor};
pub use error::{CryptoError, CryptoResult};
pub use key::{
    check_password, derive_key, new_password, DerivedKey, KdfParams, FIXED_SALT, KEY_SIZE,
    MIN_ITERATIONS, PASSWORD_BYTES, PASSWORD_LEN,
};

/// Encrypts private key bytes with a password.
///
/// Derives the key on every call; use [`AesGcmKeyEncryptor`] when
/// encrypting more than once with the same password.
pub fn encrypt_private_key(
    plaintext: &[u8],
    password: &str,
    params: &KdfParams,
) -> CryptoResult<Vec<u8>> {
    let key = derive_key(password, params)?;
    Ok(encrypt(&key, plaintext)?.to_bytes())
}

/// Decrypts private key bytes produced by [`encrypt_private_key`].
pub fn decrypt_private_key(
    stored: &[u8],
    password: &str,
    params: &KdfParams,
) -> CryptoResult<Vec<u8>> {
    let key = derive_key(password, params)?;
    decrypt(&key, &EncryptedData::from_bytes(stored)?)
}

/// Re-encrypts private key bytes under a new password.
///
/// Used when the configured password is rotated.
pub fn rewrap_private_key(
    stored: &[u8],
    old_password: &str,
    replacement: &str,
    params: &KdfParams,
) -> CryptoResult<Vec<u8>> {
    let plaintext = zeroize::Zeroizing::new(decrypt_private_key(stored, old_password, params)?);
    encrypt_private_key(&plaintext, replacement, params)
}
