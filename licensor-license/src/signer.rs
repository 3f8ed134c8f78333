//! Signing and verification of canonical license bytes.
//!
//! Signatures are carried as standard base64 text so they can be embedded
//! in both YAML and JSON license files. RSA uses PKCS#1 v1.5 and ECDSA uses
//! fixed-size `r || s`, both over SHA-256.

use crate::error::{LicenseError, LicenseResult};
use crate::keys::{PrivateKey, PublicKey};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use licensor_types::Algorithm;
use sha2::Sha256;
use tracing::debug;

/// Signs `message` and returns the base64-encoded signature.
///
/// # Errors
///
/// Returns [`LicenseError::AlgorithmMismatch`] if `algorithm` is not the
/// key's own algorithm. No other algorithm is tried.
pub fn sign(message: &[u8], key: &PrivateKey, algorithm: Algorithm) -> LicenseResult<String> {
    ensure_algorithm(algorithm, key.algorithm())?;

    let raw = match key {
        PrivateKey::Rsa(key) => {
            let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new(key.clone());
            let signature = rsa::signature::Signer::try_sign(&signing_key, message)
                .map_err(|e| LicenseError::InvalidKey(e.to_string()))?;
            rsa::signature::SignatureEncoding::to_vec(&signature)
        }
        PrivateKey::Ecdsa(key) => {
            let signing_key = p256::ecdsa::SigningKey::from(key);
            let signature: p256::ecdsa::Signature =
                p256::ecdsa::signature::Signer::try_sign(&signing_key, message)
                    .map_err(|e| LicenseError::InvalidKey(e.to_string()))?;
            signature.to_bytes().to_vec()
        }
        PrivateKey::Ed25519(key) => ed25519_dalek::Signer::sign(key, message)
            .to_bytes()
            .to_vec(),
    };

    Ok(BASE64.encode(raw))
}

/// Verifies a base64-encoded signature over `message`.
///
/// # Errors
///
/// - [`LicenseError::MalformedFile`] if the signature is not base64.
/// - [`LicenseError::BadSignature`] if it does not verify.
/// - [`LicenseError::AlgorithmMismatch`] if `algorithm` is not the key's.
pub fn verify_signature(
    message: &[u8],
    signature: &str,
    key: &PublicKey,
    algorithm: Algorithm,
) -> LicenseResult<()> {
    ensure_algorithm(algorithm, key.algorithm())?;

    let raw = BASE64
        .decode(signature.trim())
        .map_err(|e| LicenseError::MalformedFile(format!("invalid signature base64: {e}")))?;

    let valid = match key {
        PublicKey::Rsa(key) => {
            let verifying_key = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(key.clone());
            rsa::pkcs1v15::Signature::try_from(raw.as_slice())
                .is_ok_and(|sig| {
                    rsa::signature::Verifier::verify(&verifying_key, message, &sig).is_ok()
                })
        }
        PublicKey::Ecdsa(key) => {
            let verifying_key = p256::ecdsa::VerifyingKey::from(key);
            p256::ecdsa::Signature::from_slice(&raw).is_ok_and(|sig| {
                p256::ecdsa::signature::Verifier::verify(&verifying_key, message, &sig).is_ok()
            })
        }
        PublicKey::Ed25519(key) => ed25519_dalek::Signature::from_slice(&raw)
            .is_ok_and(|sig| key.verify_strict(message, &sig).is_ok()),
    };

    if valid {
        Ok(())
    } else {
        debug!(%algorithm, "signature verification failed");
        Err(LicenseError::BadSignature)
    }
}

fn ensure_algorithm(expected: Algorithm, actual: Algorithm) -> LicenseResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(LicenseError::AlgorithmMismatch { expected, actual })
    }
}
