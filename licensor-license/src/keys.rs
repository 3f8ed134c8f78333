//! Key pair generation and PEM import/export.
//!
//! Keys are a closed set of variants, one per [`Algorithm`]. Private keys
//! are exported as PKCS#8 PEM and public keys as SubjectPublicKeyInfo PEM,
//! which is what client applications embed.

use crate::error::{LicenseError, LicenseResult};
use licensor_types::Algorithm;
use rand::rngs::OsRng;
use std::fmt;
use zeroize::Zeroizing;

/// RSA modulus size used when none is configured.
pub const DEFAULT_RSA_BITS: usize = 2048;

/// Smallest RSA modulus accepted for new keys.
pub const MIN_RSA_BITS: usize = 2048;

/// A private signing key.
pub enum PrivateKey {
    Rsa(rsa::RsaPrivateKey),
    Ecdsa(p256::SecretKey),
    Ed25519(ed25519_dalek::SigningKey),
}

/// A public verification key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Rsa(rsa::RsaPublicKey),
    Ecdsa(p256::PublicKey),
    Ed25519(ed25519_dalek::VerifyingKey),
}

/// Freshly generated key material, PEM encoded.
pub struct GeneratedKeyPair {
    pub algorithm: Algorithm,
    pub public_pem: String,
    pub private_pem: Zeroizing<String>,
}

impl fmt::Debug for GeneratedKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedKeyPair")
            .field("algorithm", &self.algorithm)
            .field("public_pem", &self.public_pem)
            .field("private_pem", &"[REDACTED]")
            .finish()
    }
}

/// Generates a new key pair for `algorithm`.
///
/// `rsa_bits` is only used for RSA.
pub fn generate_key_pair(algorithm: Algorithm, rsa_bits: usize) -> LicenseResult<GeneratedKeyPair> {
    let private = PrivateKey::generate(algorithm, rsa_bits)?;
    Ok(GeneratedKeyPair {
        algorithm,
        public_pem: private.public_key().to_pem()?,
        private_pem: private.to_pem()?,
    })
}

impl PrivateKey {
    /// Generates a new random key.
    pub fn generate(algorithm: Algorithm, rsa_bits: usize) -> LicenseResult<Self> {
        match algorithm {
            Algorithm::Rsa => {
                if rsa_bits < MIN_RSA_BITS {
                    return Err(LicenseError::KeyGeneration(format!(
                        "RSA keys need at least {MIN_RSA_BITS} bits, got {rsa_bits}"
                    )));
                }
                rsa::RsaPrivateKey::new(&mut OsRng, rsa_bits)
                    .map(Self::Rsa)
                    .map_err(|e| LicenseError::KeyGeneration(e.to_string()))
            }
            Algorithm::Ecdsa => Ok(Self::Ecdsa(p256::SecretKey::random(&mut OsRng))),
            Algorithm::Ed25519 => Ok(Self::Ed25519(ed25519_dalek::SigningKey::generate(
                &mut OsRng,
            ))),
        }
    }

    /// Parses a PKCS#8 PEM private key of the given algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::AlgorithmMismatch`] if the PEM holds a key of
    /// another supported algorithm, and [`LicenseError::InvalidKey`] if it
    /// holds nothing usable.
    pub fn from_pem(algorithm: Algorithm, pem: &str) -> LicenseResult<Self> {
        Self::parse(algorithm, pem).map_err(|reason| {
            classify_parse_failure(algorithm, reason, |other| Self::parse(other, pem).is_ok())
        })
    }

    fn parse(algorithm: Algorithm, pem: &str) -> Result<Self, String> {
        match algorithm {
            Algorithm::Rsa => rsa::pkcs8::DecodePrivateKey::from_pkcs8_pem(pem)
                .map(Self::Rsa)
                .map_err(|e| e.to_string()),
            Algorithm::Ecdsa => p256::pkcs8::DecodePrivateKey::from_pkcs8_pem(pem)
                .map(Self::Ecdsa)
                .map_err(|e| e.to_string()),
            Algorithm::Ed25519 => ed25519_dalek::pkcs8::DecodePrivateKey::from_pkcs8_pem(pem)
                .map(Self::Ed25519)
                .map_err(|e| e.to_string()),
        }
    }

    /// Encodes the key as PKCS#8 PEM.
    pub fn to_pem(&self) -> LicenseResult<Zeroizing<String>> {
        let invalid = |e: &dyn fmt::Display| LicenseError::InvalidKey(e.to_string());
        match self {
            Self::Rsa(key) => {
                rsa::pkcs8::EncodePrivateKey::to_pkcs8_pem(key, rsa::pkcs8::LineEnding::LF)
                    .map_err(|e| invalid(&e))
            }
            Self::Ecdsa(key) => {
                p256::pkcs8::EncodePrivateKey::to_pkcs8_pem(key, p256::pkcs8::LineEnding::LF)
                    .map_err(|e| invalid(&e))
            }
            Self::Ed25519(key) => ed25519_dalek::pkcs8::EncodePrivateKey::to_pkcs8_pem(
                key,
                p256::pkcs8::LineEnding::LF,
            )
            .map_err(|e| invalid(&e)),
        }
    }

    /// Returns the algorithm of this key.
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::Rsa(_) => Algorithm::Rsa,
            Self::Ecdsa(_) => Algorithm::Ecdsa,
            Self::Ed25519(_) => Algorithm::Ed25519,
        }
    }

    /// Returns the matching public key.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        match self {
            Self::Rsa(key) => PublicKey::Rsa(key.to_public_key()),
            Self::Ecdsa(key) => PublicKey::Ecdsa(key.public_key()),
            Self::Ed25519(key) => PublicKey::Ed25519(key.verifying_key()),
        }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("algorithm", &self.algorithm())
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl PublicKey {
    /// Parses a SubjectPublicKeyInfo PEM public key of the given algorithm.
    ///
    /// # Errors
    ///
    /// Same classification as [`PrivateKey::from_pem`].
    pub fn from_pem(algorithm: Algorithm, pem: &str) -> LicenseResult<Self> {
        Self::parse(algorithm, pem).map_err(|reason| {
            classify_parse_failure(algorithm, reason, |other| Self::parse(other, pem).is_ok())
        })
    }

    fn parse(algorithm: Algorithm, pem: &str) -> Result<Self, String> {
        match algorithm {
            Algorithm::Rsa => rsa::pkcs8::DecodePublicKey::from_public_key_pem(pem)
                .map(Self::Rsa)
                .map_err(|e| e.to_string()),
            Algorithm::Ecdsa => p256::pkcs8::DecodePublicKey::from_public_key_pem(pem)
                .map(Self::Ecdsa)
                .map_err(|e| e.to_string()),
            Algorithm::Ed25519 => ed25519_dalek::pkcs8::DecodePublicKey::from_public_key_pem(pem)
                .map(Self::Ed25519)
                .map_err(|e| e.to_string()),
        }
    }

    /// Encodes the key as SubjectPublicKeyInfo PEM.
    pub fn to_pem(&self) -> LicenseResult<String> {
        let invalid = |e: &dyn fmt::Display| LicenseError::InvalidKey(e.to_string());
        match self {
            Self::Rsa(key) => {
                rsa::pkcs8::EncodePublicKey::to_public_key_pem(key, rsa::pkcs8::LineEnding::LF)
                    .map_err(|e| invalid(&e))
            }
            Self::Ecdsa(key) => {
                p256::pkcs8::EncodePublicKey::to_public_key_pem(key, p256::pkcs8::LineEnding::LF)
                    .map_err(|e| invalid(&e))
            }
            Self::Ed25519(key) => ed25519_dalek::pkcs8::EncodePublicKey::to_public_key_pem(
                key,
                p256::pkcs8::LineEnding::LF,
            )
            .map_err(|e| invalid(&e)),
        }
    }

    /// Returns the algorithm of this key.
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::Rsa(_) => Algorithm::Rsa,
            Self::Ecdsa(_) => Algorithm::Ecdsa,
            Self::Ed25519(_) => Algorithm::Ed25519,
        }
    }
}

/// Turns a failed parse into either a mismatch (the PEM is a valid key of
/// another algorithm) or a plain invalid-key error. Never returns a key.
fn classify_parse_failure(
    expected: Algorithm,
    reason: String,
    parses_as: impl Fn(Algorithm) -> bool,
) -> LicenseError {
    Algorithm::ALL
        .into_iter()
        .filter(|other| *other != expected)
        .find(|other| parses_as(*other))
        .map_or(LicenseError::InvalidKey(reason), |actual| {
            LicenseError::AlgorithmMismatch { expected, actual }
        })
}
