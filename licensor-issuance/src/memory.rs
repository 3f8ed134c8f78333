//! In-memory store.
//!
//! A transaction works on a copy of the state, which replaces the shared
//! state only when the transaction succeeds.

use crate::error::{StorageError, StorageResult};
use crate::store::{LicenseStore, StoreTransaction};
use chrono::{DateTime, Utc};
use licensor_types::{
    Application, ApplicationId, CustomFieldDefinition, FieldDefinitionId, FieldKind, KeyPair,
    KeyPairId, LicenseId, LicenseRecord, NewKeyPair, Renewal,
};
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    last_id: i64,
    applications: BTreeMap<ApplicationId, Application>,
    key_pairs: BTreeMap<KeyPairId, KeyPair>,
    definitions: BTreeMap<FieldDefinitionId, CustomFieldDefinition>,
    licenses: BTreeMap<LicenseId, LicenseRecord>,
    renewals: Vec<Renewal>,
}

impl MemoryState {
    /// Ids come from one sequence shared by all tables.
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

/// Thread-safe in-memory [`LicenseStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LicenseStore for MemoryStore {
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>,
        E: From<StorageError>,
    {
        let mut state = self.state.lock().map_err(|_| StorageError::Lock)?;
        let mut working = state.clone();
        let value = f(&mut MemoryTransaction {
            state: &mut working,
        })?;
        *state = working;
        Ok(value)
    }
}

struct MemoryTransaction<'a> {
    state: &'a mut MemoryState,
}

fn not_found(what: &str, id: impl std::fmt::Display) -> StorageError {
    StorageError::NotFound(format!("{what} {id}"))
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn insert_application(&mut self, app: &Application) -> StorageResult<Application> {
        let id = ApplicationId::new(self.state.next_id());
        let stored = Application { id, ..app.clone() };
        self.state.applications.insert(id, stored.clone());
        Ok(stored)
    }

    fn application(&self, id: ApplicationId) -> StorageResult<Application> {
        self.state
            .applications
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("application", id))
    }

    fn insert_key_pair(
        &mut self,
        key_pair: NewKeyPair,
        created_at: DateTime<Utc>,
    ) -> StorageResult<KeyPair> {
        let id = KeyPairId::new(self.state.next_id());
        let stored = key_pair.into_key_pair(id, created_at);
        self.state.key_pairs.insert(id, stored.clone());
        Ok(stored)
    }

    fn key_pair(&self, id: KeyPairId) -> StorageResult<KeyPair> {
        self.state
            .key_pairs
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("key pair", id))
    }

    fn key_pairs(&self, app_id: ApplicationId) -> StorageResult<Vec<KeyPair>> {
        Ok(self
            .state
            .key_pairs
            .values()
            .filter(|kp| kp.app_id == app_id)
            .cloned()
            .collect())
    }

    fn set_key_pair_flags(
        &mut self,
        id: KeyPairId,
        is_default: bool,
        active: bool,
    ) -> StorageResult<()> {
        let key_pair = self
            .state
            .key_pairs
            .get_mut(&id)
            .ok_or_else(|| not_found("key pair", id))?;
        key_pair.is_default = is_default;
        key_pair.active = active;
        Ok(())
    }

    fn insert_field_definition(
        &mut self,
        app_id: ApplicationId,
        name: &str,
        kind: &FieldKind,
    ) -> StorageResult<CustomFieldDefinition> {
        let id = FieldDefinitionId::new(self.state.next_id());
        let definition = CustomFieldDefinition {
            id,
            app_id,
            name: name.to_string(),
            kind: kind.clone(),
            active: true,
        };
        self.state.definitions.insert(id, definition.clone());
        Ok(definition)
    }

    fn field_definitions(&self, app_id: ApplicationId) -> StorageResult<Vec<CustomFieldDefinition>> {
        Ok(self
            .state
            .definitions
            .values()
            .filter(|d| d.app_id == app_id)
            .cloned()
            .collect())
    }

    fn set_field_definition_active(
        &mut self,
        id: FieldDefinitionId,
        active: bool,
    ) -> StorageResult<()> {
        let definition = self
            .state
            .definitions
            .get_mut(&id)
            .ok_or_else(|| not_found("field definition", id))?;
        definition.active = active;
        Ok(())
    }

    fn insert_license(&mut self, record: &LicenseRecord) -> StorageResult<LicenseId> {
        let id = LicenseId::new(self.state.next_id());
        self.state.licenses.insert(
            id,
            LicenseRecord {
                id,
                ..record.clone()
            },
        );
        Ok(id)
    }

    fn license(&self, id: LicenseId) -> StorageResult<LicenseRecord> {
        self.state
            .licenses
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("license", id))
    }

    fn set_license_signature(&mut self, id: LicenseId, signature: &str) -> StorageResult<()> {
        let license = self
            .state
            .licenses
            .get_mut(&id)
            .ok_or_else(|| not_found("license", id))?;
        license.signature = signature.to_string();
        Ok(())
    }

    fn set_license_verified(&mut self, id: LicenseId) -> StorageResult<()> {
        let license = self
            .state
            .licenses
            .get_mut(&id)
            .ok_or_else(|| not_found("license", id))?;
        license.verified = true;
        Ok(())
    }

    fn insert_renewal(&mut self, renewal: &Renewal) -> StorageResult<()> {
        self.state.renewals.push(renewal.clone());
        Ok(())
    }

    fn renewals_from(&self, id: LicenseId) -> StorageResult<Vec<Renewal>> {
        Ok(self
            .state
            .renewals
            .iter()
            .filter(|r| r.from_license_id == id)
            .cloned()
            .collect())
    }
}
