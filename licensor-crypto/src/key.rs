//! Key derivation and password management.
//!
//! Uses PBKDF2-HMAC-SHA512 with a fixed, application-wide salt. The
//! password itself is a random 32-byte value, so the salt only has to
//! separate this use of the password from any other.

use crate::error::{CryptoError, CryptoResult};
use hmac::Hmac;
use rand::RngCore;
use sha2::Sha512;
use tracing::warn;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of encryption keys in bytes (256 bits for AES-256).
pub const KEY_SIZE: usize = 32;

/// Number of random bytes in a generated password.
pub const PASSWORD_BYTES: usize = 32;

/// The only accepted password length: hex encoding of [`PASSWORD_BYTES`].
pub const PASSWORD_LEN: usize = PASSWORD_BYTES * 2;

/// Lowest PBKDF2 iteration count accepted without a warning.
pub const MIN_ITERATIONS: u32 = 210_000;

/// Salt shared by every installation.
pub const FIXED_SALT: &[u8] = b"licensor/private-key-encryption/v1";

/// A derived encryption key with automatic zeroization on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    /// Creates a derived key from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Returns the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Key derivation parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KdfParams {
    /// PBKDF2 iteration count.
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        // OWASP 2023 recommendation for PBKDF2-HMAC-SHA512
        Self {
            iterations: MIN_ITERATIONS,
        }
    }
}

impl KdfParams {
    /// Creates parameters with an explicit iteration count.
    ///
    /// Counts below [`MIN_ITERATIONS`] are allowed so tests stay fast, but
    /// they are logged every time they are used.
    pub fn with_iterations(iterations: u32) -> Self {
        Self { iterations }
    }

    /// Returns true if the iteration count meets the minimum.
    pub fn is_secure(&self) -> bool {
        self.iterations >= MIN_ITERATIONS
    }
}

/// Derives an encryption key from a password using PBKDF2-HMAC-SHA512.
///
/// # Errors
///
/// Returns an error if the password does not have [`PASSWORD_LEN`]
/// characters or the iteration count is zero.
pub fn derive_key(password: &str, params: &KdfParams) -> CryptoResult<DerivedKey> {
    check_password(password)?;
    if params.iterations == 0 {
        return Err(CryptoError::KeyDerivation(
            "iteration count must be positive".to_string(),
        ));
    }
    if !params.is_secure() {
        warn!(
            iterations = params.iterations,
            minimum = MIN_ITERATIONS,
            "PBKDF2 iteration count below minimum; private keys are weakly protected"
        );
    }

    let mut key_bytes = [0u8; KEY_SIZE];
    pbkdf2::pbkdf2::<Hmac<Sha512>>(
        password.as_bytes(),
        FIXED_SALT,
        params.iterations,
        &mut key_bytes,
    )
    .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let key = DerivedKey::from_bytes(key_bytes);
    key_bytes.zeroize();
    Ok(key)
}

/// Generates a new random password suitable for the configuration file.
///
/// The result is [`PASSWORD_BYTES`] random bytes, hex encoded.
pub fn new_password() -> String {
    let mut bytes = [0u8; PASSWORD_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let password = hex::encode(bytes);
    bytes.zeroize();
    password
}

/// Checks that a password has the one accepted length.
pub fn check_password(password: &str) -> CryptoResult<()> {
    let actual = password.chars().count();
    if actual != PASSWORD_LEN {
        return Err(CryptoError::InvalidPasswordLength {
            expected: PASSWORD_LEN,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> KdfParams {
        KdfParams::with_iterations(10)
    }

    #[test]
    fn derivation_is_deterministic() {
        let password = "a".repeat(PASSWORD_LEN);
        let k1 = derive_key(&password, &fast()).unwrap();
        let k2 = derive_key(&password, &fast()).unwrap();
        assert_eq!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn iterations_change_the_key() {
        let password = "b".repeat(PASSWORD_LEN);
        let k1 = derive_key(&password, &KdfParams::with_iterations(10)).unwrap();
        let k2 = derive_key(&password, &KdfParams::with_iterations(11)).unwrap();
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn zero_iterations_rejected() {
        let password = "c".repeat(PASSWORD_LEN);
        assert!(derive_key(&password, &KdfParams::with_iterations(0)).is_err());
    }

    #[test]
    fn default_params_are_secure() {
        assert!(KdfParams::default().is_secure());
        assert!(!fast().is_secure());
    }

    #[test]
    fn debug_redacts_key() {
        let key = DerivedKey::from_bytes([7u8; KEY_SIZE]);
        assert!(format!("{key:?}").contains("REDACTED"));
    }
}
