//! Shared test helpers for issuance tests.

#![allow(dead_code)]

use chrono::{NaiveDate, TimeZone, Utc};
use licensor_crypto::{new_password, AesGcmKeyEncryptor, KdfParams, KeyEncryptor, PlaintextKeyEncryptor};
use licensor_issuance::{IssuanceError, LicenseStore, StorageError};
use licensor_types::{Application, ApplicationId, FileFormat, LicenseDraft};
use std::sync::Arc;

/// Iteration count that keeps PBKDF2 fast in tests.
pub const TEST_ITERATIONS: u32 = 1_000;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn plaintext() -> Arc<dyn KeyEncryptor> {
    Arc::new(PlaintextKeyEncryptor::new())
}

/// An AES-GCM encryptor under a fresh random password.
pub fn encrypting() -> Arc<dyn KeyEncryptor> {
    encrypting_with(&new_password())
}

pub fn encrypting_with(password: &str) -> Arc<dyn KeyEncryptor> {
    Arc::new(
        AesGcmKeyEncryptor::new(password, &KdfParams::with_iterations(TEST_ITERATIONS)).unwrap(),
    )
}

/// Stores an application and returns it with its assigned id.
pub fn create_app<S: LicenseStore>(store: &S, name: &str, format: FileFormat) -> Application {
    let app = Application::new(ApplicationId::new(0), name, format);
    store
        .transaction(|tx| -> Result<_, StorageError> { tx.insert_application(&app) })
        .unwrap()
}

/// A draft for ACME Dynamite issued on 2024-01-01, expiring 2049-09-21.
pub fn acme_draft(app: &Application) -> LicenseDraft {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    LicenseDraft::from_application(app, now, date(2024, 1, 1))
        .company("ACME Dynamite")
        .contact("Wile E. Coyote", "555-0100", "wile@acme.example")
        .expires(date(2049, 9, 21))
}

/// Unwraps the verbatim message of a validation failure.
pub fn validation_message<T: std::fmt::Debug>(result: Result<T, IssuanceError>) -> String {
    match result {
        Err(IssuanceError::Validation(message)) => message,
        Err(IssuanceError::License(licensor_license::LicenseError::Validation(message))) => message,
        other => panic!("expected a validation error, got {other:?}"),
    }
}
