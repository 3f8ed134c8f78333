//! Core record types for the Licensor signing engine.
//!
//! This crate defines the plain data structures exchanged between the
//! engine and its collaborators (storage, API layer):
//! - Storage-assigned identifiers
//! - Signing algorithms and license file formats
//! - Applications, key pairs, custom field definitions and values
//! - License records, drafts and renewal edges
//!
//! Nothing here performs cryptography or I/O.

mod algorithm;
mod application;
mod field;
mod ids;
mod key_pair;
mod license;

pub use algorithm::{Algorithm, FileFormat};
pub use application::Application;
pub use field::{
    CustomFieldDefinition, CustomFieldValue, FieldKind, FieldType, FieldValue, ProvidedValue,
    SubmittedValue, DATE_FORMAT,
};
pub use ids::{ApplicationId, FieldDefinitionId, KeyPairId, LicenseId};
pub use key_pair::{KeyPair, KeyPairSummary, NewKeyPair};
pub use license::{LicenseDraft, LicenseRecord, Renewal};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("unknown field type: {0}")]
    UnknownFieldType(String),

    #[error("invalid {field_type} value: {raw:?}")]
    InvalidFieldValue { field_type: FieldType, raw: String },
}
