//! Shared test helpers for license tests.

#![allow(dead_code)]

use chrono::NaiveDate;
use licensor_license::{AttributeValue, LicenseFile, PrivateKey};
use licensor_types::{
    ApplicationId, CustomFieldDefinition, FieldDefinitionId, FieldKind,
};
use std::collections::BTreeMap;

/// Returns a deterministic Ed25519 key from a fixed seed.
pub fn test_key() -> PrivateKey {
    let seed: [u8; 32] = [
        1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24,
        25, 26, 27, 28, 29, 30, 31, 32,
    ];
    PrivateKey::Ed25519(ed25519_dalek::SigningKey::from_bytes(&seed))
}

/// Returns a second, unrelated Ed25519 key.
pub fn other_key() -> PrivateKey {
    PrivateKey::Ed25519(ed25519_dalek::SigningKey::from_bytes(&[9u8; 32]))
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// The "Example" application license for ACME Dynamite.
pub fn example_file() -> LicenseFile {
    let mut extra = BTreeMap::new();
    extra.insert("CustomFieldInt".to_string(), AttributeValue::Integer(5));
    LicenseFile {
        license_id: Some(1),
        app_name: Some("Example".to_string()),
        company_name: "ACME Dynamite".to_string(),
        contact_name: "Wile E. Coyote".to_string(),
        phone_number: "555-0100".to_string(),
        email: "wile@acme.example".to_string(),
        issue_date: date(2024, 1, 1),
        issue_timestamp: 1_704_067_200,
        expire_date: date(2049, 9, 21),
        extra,
        signature: String::new(),
    }
}

pub fn integer_definition(id: i64, name: &str, min: i64, max: i64, default: i64) -> CustomFieldDefinition {
    definition(id, name, FieldKind::Integer { min, max, default })
}

pub fn definition(id: i64, name: &str, kind: FieldKind) -> CustomFieldDefinition {
    CustomFieldDefinition {
        id: FieldDefinitionId::new(id),
        app_id: ApplicationId::new(1),
        name: name.to_string(),
        kind,
        active: true,
    }
}
