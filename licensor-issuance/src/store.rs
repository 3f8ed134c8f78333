//! Storage interface consumed by the key pair manager and the issuer.
//!
//! All access goes through [`LicenseStore::transaction`]. The closure sees a
//! [`StoreTransaction`]; its writes become visible to other callers only if
//! the closure returns `Ok`. Returning `Err` discards every write made in
//! the closure.

use crate::error::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use licensor_types::{
    Application, ApplicationId, CustomFieldDefinition, FieldDefinitionId, FieldKind, KeyPair,
    KeyPairId, LicenseId, LicenseRecord, NewKeyPair, Renewal,
};

/// Operations available inside a storage transaction.
pub trait StoreTransaction {
    // ── Applications ─────────────────────────────────────────────

    /// Inserts an application. `app.id` is ignored; the stored record with
    /// its assigned id is returned.
    fn insert_application(&mut self, app: &Application) -> StorageResult<Application>;

    fn application(&self, id: ApplicationId) -> StorageResult<Application>;

    // ── Key pairs ────────────────────────────────────────────────

    fn insert_key_pair(
        &mut self,
        key_pair: NewKeyPair,
        created_at: DateTime<Utc>,
    ) -> StorageResult<KeyPair>;

    fn key_pair(&self, id: KeyPairId) -> StorageResult<KeyPair>;

    /// All key pairs of an application, inactive ones included, by id.
    fn key_pairs(&self, app_id: ApplicationId) -> StorageResult<Vec<KeyPair>>;

    /// Updates the only mutable key pair attributes.
    fn set_key_pair_flags(
        &mut self,
        id: KeyPairId,
        is_default: bool,
        active: bool,
    ) -> StorageResult<()>;

    // ── Custom field definitions ─────────────────────────────────

    fn insert_field_definition(
        &mut self,
        app_id: ApplicationId,
        name: &str,
        kind: &FieldKind,
    ) -> StorageResult<CustomFieldDefinition>;

    /// All definitions of an application, inactive ones included, by id.
    fn field_definitions(&self, app_id: ApplicationId) -> StorageResult<Vec<CustomFieldDefinition>>;

    fn set_field_definition_active(
        &mut self,
        id: FieldDefinitionId,
        active: bool,
    ) -> StorageResult<()>;

    // ── Licenses ─────────────────────────────────────────────────

    /// Inserts a license and returns its assigned id. `record.id` is ignored.
    fn insert_license(&mut self, record: &LicenseRecord) -> StorageResult<LicenseId>;

    fn license(&self, id: LicenseId) -> StorageResult<LicenseRecord>;

    fn set_license_signature(&mut self, id: LicenseId, signature: &str) -> StorageResult<()>;

    fn set_license_verified(&mut self, id: LicenseId) -> StorageResult<()>;

    fn insert_renewal(&mut self, renewal: &Renewal) -> StorageResult<()>;

    /// Renewal edges leaving `id`.
    fn renewals_from(&self, id: LicenseId) -> StorageResult<Vec<Renewal>>;
}

/// A transactional record store.
pub trait LicenseStore: Send + Sync {
    /// Runs `f` in one transaction, committing if it returns `Ok` and
    /// rolling back otherwise.
    ///
    /// Transactions on the same store are serialized.
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>,
        E: From<StorageError>;
}
