//! Canonical license file encoding.
//!
//! A license file is a YAML or JSON document whose top-level keys always
//! appear in this order:
//!
//! `LicenseID, AppName, CompanyName, ContactName, PhoneNumber, Email,
//! IssueDate, IssueTimestamp, ExpireDate, Extra, Signature`
//!
//! The order comes from the field order of [`LicenseFile`]; custom
//! attributes under `Extra` are kept in a `BTreeMap` and so are sorted by
//! name. No hash-map iteration order ever reaches the output, which is what
//! makes re-encoding a parsed file reproduce the signed bytes exactly.

use crate::error::{LicenseError, LicenseResult};
use chrono::{DateTime, NaiveDate, TimeZone};
use licensor_types::{FieldValue, FileFormat, LicenseRecord, DATE_FORMAT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Value of a custom attribute as it appears in a license file.
///
/// Dates and choices are carried as text; the file only needs to preserve
/// the bytes that were signed, not the original field type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    Text(String),
}

impl From<&FieldValue> for AttributeValue {
    fn from(value: &FieldValue) -> Self {
        match value {
            FieldValue::Integer(v) => Self::Integer(*v),
            FieldValue::Decimal(v) => Self::Decimal(*v),
            FieldValue::Text(v) | FieldValue::MultiChoice(v) => Self::Text(v.clone()),
            FieldValue::Boolean(v) => Self::Boolean(*v),
            FieldValue::Date(v) => Self::Text(v.format(DATE_FORMAT).to_string()),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// The signed document handed to license holders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LicenseFile {
    #[serde(rename = "LicenseID", default, skip_serializing_if = "Option::is_none")]
    pub license_id: Option<i64>,
    #[serde(rename = "AppName", default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(rename = "CompanyName")]
    pub company_name: String,
    #[serde(rename = "ContactName")]
    pub contact_name: String,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "IssueDate")]
    pub issue_date: NaiveDate,
    #[serde(rename = "IssueTimestamp")]
    pub issue_timestamp: i64,
    #[serde(rename = "ExpireDate")]
    pub expire_date: NaiveDate,
    #[serde(rename = "Extra", default)]
    pub extra: BTreeMap<String, AttributeValue>,
    #[serde(rename = "Signature", default)]
    pub signature: String,
}

impl LicenseFile {
    /// Builds the file content for a stored license.
    ///
    /// The stored signature, if any, is carried over unchanged.
    #[must_use]
    pub fn from_record(record: &LicenseRecord) -> Self {
        Self {
            license_id: record.show_license_id.then(|| record.id.get()),
            app_name: record.show_app_name.then(|| record.app_name.clone()),
            company_name: record.company_name.clone(),
            contact_name: record.contact_name.clone(),
            phone_number: record.phone_number.clone(),
            email: record.email.clone(),
            issue_date: record.issue_date,
            issue_timestamp: record.issue_timestamp,
            expire_date: record.expire_date,
            extra: record
                .custom_values
                .iter()
                .map(|v| (v.name.clone(), AttributeValue::from(&v.value)))
                .collect(),
            signature: record.signature.clone(),
        }
    }

    /// Returns a copy with the signature cleared.
    #[must_use]
    pub fn unsigned(&self) -> Self {
        Self {
            signature: String::new(),
            ..self.clone()
        }
    }

    /// Returns the exact bytes a signature is computed over.
    pub fn canonical_bytes(&self, format: FileFormat) -> LicenseResult<Vec<u8>> {
        encode(&self.unsigned(), format)
    }

    /// Looks up a custom attribute by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.extra.get(name)
    }

    /// Returns true if `now`, taken as a calendar date in its own time
    /// zone, is after the expiry date.
    #[must_use]
    pub fn is_expired<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        now.date_naive() > self.expire_date
    }
}

/// Encodes a license file.
///
/// YAML output is `serde_yaml`'s block style; JSON output is pretty-printed
/// with two-space indentation. Both end with a newline.
pub fn encode(file: &LicenseFile, format: FileFormat) -> LicenseResult<Vec<u8>> {
    match format {
        FileFormat::Yaml => serde_yaml::to_string(file)
            .map(String::into_bytes)
            .map_err(|e| LicenseError::Encoding(e.to_string())),
        FileFormat::Json => {
            let mut bytes = serde_json::to_vec_pretty(file)
                .map_err(|e| LicenseError::Encoding(e.to_string()))?;
            bytes.push(b'\n');
            Ok(bytes)
        }
    }
}

/// Decodes a license file.
///
/// # Errors
///
/// Returns [`LicenseError::MalformedFile`] for invalid UTF-8, syntax errors,
/// missing keys and unknown top-level keys.
pub fn decode(bytes: &[u8], format: FileFormat) -> LicenseResult<LicenseFile> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| LicenseError::MalformedFile(format!("not UTF-8: {e}")))?;
    match format {
        FileFormat::Yaml => serde_yaml::from_str(text)
            .map_err(|e| LicenseError::MalformedFile(format!("invalid YAML: {e}"))),
        FileFormat::Json => serde_json::from_str(text)
            .map_err(|e| LicenseError::MalformedFile(format!("invalid JSON: {e}"))),
    }
}
