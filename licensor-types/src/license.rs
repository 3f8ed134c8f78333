//! License records, drafts and renewal edges.

use crate::{
    Application, ApplicationId, CustomFieldValue, FileFormat, KeyPairId, LicenseId,
    ProvidedValue,
};
use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A stored license.
///
/// `signature` is empty until it has been computed, and is computed exactly
/// once. `verified` is set only after the issuance self-check succeeded.
///
/// The file shape (`file_format`, `show_license_id`, `show_app_name`) is
/// copied from the application at issuance so that later changes to the
/// application never alter the bytes of an already signed license.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseRecord {
    pub id: LicenseId,
    pub app_id: ApplicationId,
    pub key_pair_id: KeyPairId,
    /// Application display name at the time of issuance.
    pub app_name: String,
    pub company_name: String,
    pub contact_name: String,
    pub phone_number: String,
    pub email: String,
    pub issue_date: NaiveDate,
    /// Seconds since the Unix epoch.
    pub issue_timestamp: i64,
    pub expire_date: NaiveDate,
    pub custom_values: Vec<CustomFieldValue>,
    pub file_format: FileFormat,
    pub show_license_id: bool,
    pub show_app_name: bool,
    pub signature: String,
    pub verified: bool,
}

impl LicenseRecord {
    /// Returns true once a signature has been stored.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }

    /// Returns true if `now`, taken as a calendar date in its own time
    /// zone, is after the expiry date. A license is valid through its
    /// expiry day.
    #[must_use]
    pub fn is_expired<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        now.date_naive() > self.expire_date
    }
}

/// Caller-supplied data for a new license, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseDraft {
    pub app_id: ApplicationId,
    pub company_name: String,
    pub contact_name: String,
    pub phone_number: String,
    pub email: String,
    pub issue_date: NaiveDate,
    pub issue_timestamp: i64,
    pub expire_date: NaiveDate,
    pub custom_values: Vec<ProvidedValue>,
}

impl LicenseDraft {
    /// Starts a draft from the application's defaults.
    ///
    /// The expiry date is `today` plus the application's default validity.
    #[must_use]
    pub fn from_application(app: &Application, now: DateTime<Utc>, today: NaiveDate) -> Self {
        let expire_date = today
            .checked_add_days(Days::new(u64::from(app.default_valid_days)))
            .unwrap_or(NaiveDate::MAX);
        Self {
            app_id: app.id,
            company_name: String::new(),
            contact_name: String::new(),
            phone_number: String::new(),
            email: String::new(),
            issue_date: today,
            issue_timestamp: now.timestamp(),
            expire_date,
            custom_values: Vec::new(),
        }
    }

    #[must_use]
    pub fn company(mut self, company_name: impl Into<String>) -> Self {
        self.company_name = company_name.into();
        self
    }

    #[must_use]
    pub fn contact(
        mut self,
        contact_name: impl Into<String>,
        phone_number: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        self.contact_name = contact_name.into();
        self.phone_number = phone_number.into();
        self.email = email.into();
        self
    }

    #[must_use]
    pub fn expires(mut self, expire_date: NaiveDate) -> Self {
        self.expire_date = expire_date;
        self
    }

    #[must_use]
    pub fn value(mut self, value: ProvidedValue) -> Self {
        self.custom_values.push(value);
        self
    }
}

/// Directed edge recorded when a license is renewed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Renewal {
    pub from_license_id: LicenseId,
    pub to_license_id: LicenseId,
    pub renewed_at: DateTime<Utc>,
}
