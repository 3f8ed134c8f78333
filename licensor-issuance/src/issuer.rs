//! Transactional license issuance.
//!
//! A license moves through
//! `Drafted → IdentifierReserved → Signed → SelfVerified → Committed`
//! inside a single storage transaction. A failure at any step rolls the
//! whole transaction back, so no caller ever sees a license that is
//! reserved but unsigned, or signed but not verified.

use crate::config::EngineConfig;
use crate::error::{IssuanceError, IssuanceResult};
use crate::key_pairs::unwrap_private_key;
use crate::store::{LicenseStore, StoreTransaction};
use chrono::{DateTime, NaiveDate, Utc};
use licensor_crypto::KeyEncryptor;
use licensor_license::{build_and_sign, encode, validate_values, verify, LicenseFile, MatchBy};
use licensor_types::{KeyPairId, LicenseDraft, LicenseId, LicenseRecord, Renewal};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Progress of one issuance attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuanceState {
    /// Caller input passed validation.
    Drafted,
    /// The record is stored with an empty signature and has its id.
    IdentifierReserved,
    /// The signature is stored.
    Signed,
    /// The stored record re-encodes to a file that verifies.
    SelfVerified,
    /// The record is marked verified and may be exported.
    Committed,
    /// The attempt was rolled back.
    Failed,
}

impl fmt::Display for IssuanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Drafted => "drafted",
            Self::IdentifierReserved => "identifier-reserved",
            Self::Signed => "signed",
            Self::SelfVerified => "self-verified",
            Self::Committed => "committed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A committed license and its file.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedLicense {
    pub record: LicenseRecord,
    /// The signed license file, byte-identical to every later export.
    pub bytes: Vec<u8>,
}

struct Progress {
    state: IssuanceState,
    license_id: Option<LicenseId>,
}

impl Progress {
    fn new() -> Self {
        Self {
            state: IssuanceState::Drafted,
            license_id: None,
        }
    }

    fn advance(&mut self, next: IssuanceState) {
        debug!(from = %self.state, to = %next, license_id = ?self.license_id, "issuance state");
        self.state = next;
    }
}

/// Issues, renews and exports licenses.
pub struct Issuer<S> {
    store: Arc<S>,
    encryptor: Arc<dyn KeyEncryptor>,
    config: EngineConfig,
    clock: fn() -> DateTime<Utc>,
}

impl<S: LicenseStore> Issuer<S> {
    /// Creates an issuer with the default configuration (UTC dates).
    pub fn new(store: Arc<S>, encryptor: Arc<dyn KeyEncryptor>) -> Self {
        Self {
            store,
            encryptor,
            config: EngineConfig::default(),
            clock: Utc::now,
        }
    }

    /// Creates an issuer whose key encryptor and notion of "today" come
    /// from `config`.
    pub fn from_config(store: Arc<S>, config: &EngineConfig) -> IssuanceResult<Self> {
        Ok(Self {
            store,
            encryptor: config.key_encryptor()?,
            config: config.clone(),
            clock: Utc::now,
        })
    }

    /// Replaces the system clock.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Today's date in the configured time zone.
    pub fn today(&self) -> NaiveDate {
        self.config.today((self.clock)())
    }

    /// Validates, signs, self-verifies and stores a new license.
    ///
    /// Custom field values are matched to the application's active
    /// definitions as `match_by` says. Date fields must lie after both
    /// today and the draft's issue date. The issue date itself may be in
    /// the past, so a license can record when a sale was actually made.
    pub fn issue(
        &self,
        draft: &LicenseDraft,
        key_pair_id: KeyPairId,
        match_by: MatchBy,
    ) -> IssuanceResult<IssuedLicense> {
        let mut progress = Progress::new();
        let result = self.store.transaction(|tx| {
            self.issue_in(tx, draft, key_pair_id, match_by, &mut progress)
        });
        self.finish(result, &mut progress)
    }

    /// Issues a license that replaces `from`, recording the renewal edge in
    /// the same transaction.
    pub fn renew(
        &self,
        from: LicenseId,
        draft: &LicenseDraft,
        key_pair_id: KeyPairId,
        match_by: MatchBy,
        renewed_at: DateTime<Utc>,
    ) -> IssuanceResult<IssuedLicense> {
        let mut progress = Progress::new();
        let result = self.store.transaction(|tx| -> IssuanceResult<IssuedLicense> {
            let previous = tx.license(from)?;
            if previous.app_id != draft.app_id {
                return Err(IssuanceError::Validation(format!(
                    "license {from} belongs to another application"
                )));
            }
            let issued = self.issue_in(tx, draft, key_pair_id, match_by, &mut progress)?;
            tx.insert_renewal(&Renewal {
                from_license_id: from,
                to_license_id: issued.record.id,
                renewed_at,
            })?;
            Ok(issued)
        });
        let issued = self.finish(result, &mut progress)?;
        info!(from = %from, to = %issued.record.id, "license renewed");
        Ok(issued)
    }

    /// Re-encodes a committed license.
    ///
    /// The output is byte-identical to the file produced at issuance and to
    /// every earlier export.
    pub fn export(&self, license_id: LicenseId) -> IssuanceResult<Vec<u8>> {
        let record = self
            .store
            .transaction(|tx| -> IssuanceResult<_> { Ok(tx.license(license_id)?) })?;
        if !record.verified || !record.is_signed() {
            return Err(IssuanceError::NotVerified(license_id));
        }
        Ok(encode(&LicenseFile::from_record(&record), record.file_format)?)
    }

    /// Loads a stored license.
    pub fn license(&self, license_id: LicenseId) -> IssuanceResult<LicenseRecord> {
        self.store
            .transaction(|tx| -> IssuanceResult<_> { Ok(tx.license(license_id)?) })
    }

    /// Renewal edges leaving `license_id`.
    pub fn renewals(&self, license_id: LicenseId) -> IssuanceResult<Vec<Renewal>> {
        self.store
            .transaction(|tx| -> IssuanceResult<_> { Ok(tx.renewals_from(license_id)?) })
    }

    fn finish(
        &self,
        result: IssuanceResult<IssuedLicense>,
        progress: &mut Progress,
    ) -> IssuanceResult<IssuedLicense> {
        match result {
            Ok(issued) => {
                info!(
                    license_id = %issued.record.id,
                    app_id = %issued.record.app_id,
                    key_pair_id = %issued.record.key_pair_id,
                    "license committed"
                );
                Ok(issued)
            }
            Err(err) => {
                warn!(state = %progress.state, error = %err, "license issuance rolled back");
                progress.advance(IssuanceState::Failed);
                Err(err)
            }
        }
    }

    fn issue_in(
        &self,
        tx: &mut dyn StoreTransaction,
        draft: &LicenseDraft,
        key_pair_id: KeyPairId,
        match_by: MatchBy,
        progress: &mut Progress,
    ) -> IssuanceResult<IssuedLicense> {
        // ── Drafted ──────────────────────────────────────────────
        let app = tx.application(draft.app_id)?;
        if !app.active {
            return Err(IssuanceError::Validation(format!(
                "application \"{}\" is inactive",
                app.name
            )));
        }
        let key_pair = tx.key_pair(key_pair_id)?;
        if !key_pair.active || key_pair.app_id != app.id {
            return Err(IssuanceError::Validation(format!(
                "key pair {key_pair_id} is not an active key pair of \"{}\"",
                app.name
            )));
        }
        check_draft(draft)?;
        let definitions = tx.field_definitions(app.id)?;
        let not_before = self.today().max(draft.issue_date);
        let custom_values =
            validate_values(&definitions, &draft.custom_values, match_by, not_before)?;

        // ── IdentifierReserved ───────────────────────────────────
        let reserved = LicenseRecord {
            id: LicenseId::new(0),
            app_id: app.id,
            key_pair_id,
            app_name: app.name.clone(),
            company_name: draft.company_name.trim().to_string(),
            contact_name: draft.contact_name.trim().to_string(),
            phone_number: draft.phone_number.trim().to_string(),
            email: draft.email.trim().to_string(),
            issue_date: draft.issue_date,
            issue_timestamp: draft.issue_timestamp,
            expire_date: draft.expire_date,
            custom_values,
            file_format: app.file_format,
            show_license_id: app.show_license_id,
            show_app_name: app.show_app_name,
            signature: String::new(),
            verified: false,
        };
        let license_id = tx.insert_license(&reserved)?;
        progress.license_id = Some(license_id);
        progress.advance(IssuanceState::IdentifierReserved);

        // ── Signed ───────────────────────────────────────────────
        // Sign what storage holds, so the self-check compares like with like.
        let stored = tx.license(license_id)?;
        let key = unwrap_private_key(&key_pair, self.encryptor.as_ref())?;
        let signed = build_and_sign(
            &LicenseFile::from_record(&stored),
            &key,
            key_pair.algorithm,
            stored.file_format,
        )?;
        drop(key);
        tx.set_license_signature(license_id, &signed.signature)?;
        progress.advance(IssuanceState::Signed);

        // ── SelfVerified ─────────────────────────────────────────
        let reread = tx.license(license_id)?;
        let bytes = encode(&LicenseFile::from_record(&reread), reread.file_format)?;
        let consistency = |reason: String| {
            error!(license_id = %license_id, %reason, "license self-verification failed");
            IssuanceError::Consistency { license_id, reason }
        };
        if bytes != signed.bytes {
            return Err(consistency("stored license re-encodes to different bytes".to_string()));
        }
        verify(&bytes, &key_pair.public_key, key_pair.algorithm)
            .map_err(|e| consistency(e.to_string()))?;
        progress.advance(IssuanceState::SelfVerified);

        // ── Committed ────────────────────────────────────────────
        tx.set_license_verified(license_id)?;
        let record = tx.license(license_id)?;
        progress.advance(IssuanceState::Committed);

        Ok(IssuedLicense { record, bytes })
    }
}

/// Checks the fixed license fields.
fn check_draft(draft: &LicenseDraft) -> IssuanceResult<()> {
    if draft.company_name.trim().is_empty() {
        return Err(IssuanceError::Validation("company name is required".to_string()));
    }
    if draft.contact_name.trim().is_empty() {
        return Err(IssuanceError::Validation("contact name is required".to_string()));
    }
    if draft.expire_date <= draft.issue_date {
        return Err(IssuanceError::Validation(
            "expire date must be after the issue date".to_string(),
        ));
    }
    Ok(())
}
