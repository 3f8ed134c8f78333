//! Building, signing and verifying license files.
//!
//! [`verify`] and [`verify_with_key`] only need the public key and the
//! file bytes. They are the functions an application embeds to check its
//! license offline.

use crate::codec::{decode, encode, LicenseFile};
use crate::error::{LicenseError, LicenseResult};
use crate::keys::{PrivateKey, PublicKey};
use crate::signer::{sign, verify_signature};
use licensor_types::{Algorithm, FileFormat};
use tracing::debug;

/// A signed license, ready to hand out.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedLicense {
    /// The complete file, signature included.
    pub bytes: Vec<u8>,
    /// The base64 signature, as stored on the license record.
    pub signature: String,
    pub file: LicenseFile,
}

/// Signs `file` and encodes it with the signature embedded.
///
/// Any signature already present on `file` is ignored; the canonical bytes
/// are always computed with it cleared.
pub fn build_and_sign(
    file: &LicenseFile,
    key: &PrivateKey,
    algorithm: Algorithm,
    format: FileFormat,
) -> LicenseResult<SignedLicense> {
    let canonical = file.canonical_bytes(format)?;
    let signature = sign(&canonical, key, algorithm)?;

    let signed = LicenseFile {
        signature: signature.clone(),
        ..file.clone()
    };
    let bytes = encode(&signed, format)?;
    debug!(%algorithm, %format, len = bytes.len(), "license signed");

    Ok(SignedLicense {
        bytes,
        signature,
        file: signed,
    })
}

/// Verifies a license file against a PEM public key.
///
/// The format is detected from the content. On success the parsed file is
/// returned so the caller can read its attributes.
///
/// # Errors
///
/// - [`LicenseError::MalformedFile`] if the file cannot be decoded or has no signature.
/// - [`LicenseError::BadSignature`] if the content was altered or the key does not match.
/// - [`LicenseError::AlgorithmMismatch`] / [`LicenseError::InvalidKey`] for key problems.
pub fn verify(file_bytes: &[u8], public_key_pem: &str, algorithm: Algorithm) -> LicenseResult<LicenseFile> {
    let key = PublicKey::from_pem(algorithm, public_key_pem)?;
    verify_with_key(file_bytes, &key)
}

/// Verifies a license file against an already parsed public key.
pub fn verify_with_key(file_bytes: &[u8], key: &PublicKey) -> LicenseResult<LicenseFile> {
    let format = FileFormat::detect(file_bytes);
    let file = decode(file_bytes, format)?;
    if file.signature.trim().is_empty() {
        return Err(LicenseError::MalformedFile("license file is not signed".to_string()));
    }

    let canonical = file.canonical_bytes(format)?;
    verify_signature(&canonical, &file.signature, key, key.algorithm())?;
    Ok(file)
}
