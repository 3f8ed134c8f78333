//! License signing and offline verification for Licensor.
//!
//! This crate handles:
//! - Canonical YAML/JSON encoding of license files
//! - RSA, ECDSA (P-256) and Ed25519 key generation and PEM import/export
//! - Signing canonical bytes and verifying signed files
//! - Validation of custom field values against their definitions
//!
//! # Design Principles
//!
//! - **Deterministic bytes**: the same license always encodes to the same
//!   bytes, so a verifier can rebuild exactly what was signed
//! - **Offline verification**: [`verify`] needs only the file and a public key
//! - **Fail closed**: a key is only ever used with its own algorithm
//!
//! # License File Format
//!
//! ```yaml
//! LicenseID: 7
//! AppName: Example
//! CompanyName: ACME Dynamite
//! ContactName: Wile E. Coyote
//! PhoneNumber: 555-0100
//! Email: wile@acme.example
//! IssueDate: 2024-01-01
//! IssueTimestamp: 1704067200
//! ExpireDate: 2049-09-21
//! Extra:
//!   Seats: 5
//! Signature: MEUCIQ...
//! ```
//!
//! The signature covers the same document encoded with an empty `Signature`.

mod codec;
mod error;
mod fields;
mod keys;
mod license;
mod signer;

pub use codec::{decode, encode, AttributeValue, LicenseFile};
pub use error::{LicenseError, LicenseResult};
pub use fields::{
    join_options, normalize_options, validate_definition, validate_values, MatchBy,
    OPTION_DELIMITER,
};
pub use keys::{
    generate_key_pair, GeneratedKeyPair, PrivateKey, PublicKey, DEFAULT_RSA_BITS, MIN_RSA_BITS,
};
pub use license::{build_and_sign, verify, verify_with_key, SignedLicense};
pub use signer::{sign, verify_signature};
