//! SQLite-backed store.
//!
//! Each [`LicenseStore::transaction`] maps to one SQLite transaction, which
//! is rolled back when the closure fails. A partial unique index keeps at
//! most one active default key pair per application even if a caller
//! bypasses the key pair manager.

use crate::error::{StorageError, StorageResult};
use crate::store::{LicenseStore, StoreTransaction};
use chrono::{DateTime, NaiveDate, Utc};
use licensor_types::{
    Application, ApplicationId, CustomFieldDefinition, FieldDefinitionId, FieldKind, KeyPair,
    KeyPairId, LicenseId, LicenseRecord, NewKeyPair, Renewal,
};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS applications (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        default_valid_days INTEGER NOT NULL,
        file_format TEXT NOT NULL,
        show_license_id INTEGER NOT NULL,
        show_app_name INTEGER NOT NULL,
        active INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS key_pairs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        app_id INTEGER NOT NULL REFERENCES applications(id),
        algorithm TEXT NOT NULL,
        public_key TEXT NOT NULL,
        private_key BLOB NOT NULL,
        encrypted INTEGER NOT NULL,
        is_default INTEGER NOT NULL,
        active INTEGER NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE UNIQUE INDEX IF NOT EXISTS key_pairs_one_default
        ON key_pairs(app_id) WHERE is_default = 1 AND active = 1;

    CREATE TABLE IF NOT EXISTS field_definitions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        app_id INTEGER NOT NULL REFERENCES applications(id),
        name TEXT NOT NULL,
        kind TEXT NOT NULL,
        active INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS licenses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        app_id INTEGER NOT NULL REFERENCES applications(id),
        key_pair_id INTEGER NOT NULL REFERENCES key_pairs(id),
        app_name TEXT NOT NULL,
        company_name TEXT NOT NULL,
        contact_name TEXT NOT NULL,
        phone_number TEXT NOT NULL,
        email TEXT NOT NULL,
        issue_date TEXT NOT NULL,
        issue_timestamp INTEGER NOT NULL,
        expire_date TEXT NOT NULL,
        custom_values TEXT NOT NULL,
        file_format TEXT NOT NULL,
        show_license_id INTEGER NOT NULL,
        show_app_name INTEGER NOT NULL,
        signature TEXT NOT NULL,
        verified INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS renewals (
        from_license_id INTEGER NOT NULL REFERENCES licenses(id),
        to_license_id INTEGER NOT NULL REFERENCES licenses(id),
        renewed_at TEXT NOT NULL
    );
";

/// Persistent [`LicenseStore`] backed by SQLite.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl LicenseStore for SqliteStore {
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>,
        E: From<StorageError>,
    {
        let mut conn = self.conn.lock().map_err(|_| StorageError::Lock)?;
        let tx = conn.transaction().map_err(StorageError::from)?;
        let value = f(&mut SqliteTransaction { tx: &tx })?;
        tx.commit().map_err(StorageError::from)?;
        Ok(value)
    }
}

struct SqliteTransaction<'a, 'conn> {
    tx: &'a Transaction<'conn>,
}

/// Reads a text column through `FromStr`.
fn parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Reads a JSON text column.
fn json<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn application_from_row(row: &Row<'_>) -> rusqlite::Result<Application> {
    Ok(Application {
        id: ApplicationId::new(row.get(0)?),
        name: row.get(1)?,
        default_valid_days: row.get(2)?,
        file_format: parsed(row, 3)?,
        show_license_id: row.get(4)?,
        show_app_name: row.get(5)?,
        active: row.get(6)?,
    })
}

fn key_pair_from_row(row: &Row<'_>) -> rusqlite::Result<KeyPair> {
    Ok(KeyPair {
        id: KeyPairId::new(row.get(0)?),
        app_id: ApplicationId::new(row.get(1)?),
        algorithm: parsed(row, 2)?,
        public_key: row.get(3)?,
        private_key: row.get(4)?,
        encrypted: row.get(5)?,
        is_default: row.get(6)?,
        active: row.get(7)?,
        created_at: row.get::<_, DateTime<Utc>>(8)?,
    })
}

fn definition_from_row(row: &Row<'_>) -> rusqlite::Result<CustomFieldDefinition> {
    Ok(CustomFieldDefinition {
        id: FieldDefinitionId::new(row.get(0)?),
        app_id: ApplicationId::new(row.get(1)?),
        name: row.get(2)?,
        kind: json(row, 3)?,
        active: row.get(4)?,
    })
}

fn license_from_row(row: &Row<'_>) -> rusqlite::Result<LicenseRecord> {
    Ok(LicenseRecord {
        id: LicenseId::new(row.get(0)?),
        app_id: ApplicationId::new(row.get(1)?),
        key_pair_id: KeyPairId::new(row.get(2)?),
        app_name: row.get(3)?,
        company_name: row.get(4)?,
        contact_name: row.get(5)?,
        phone_number: row.get(6)?,
        email: row.get(7)?,
        issue_date: row.get::<_, NaiveDate>(8)?,
        issue_timestamp: row.get(9)?,
        expire_date: row.get::<_, NaiveDate>(10)?,
        custom_values: json(row, 11)?,
        file_format: parsed(row, 12)?,
        show_license_id: row.get(13)?,
        show_app_name: row.get(14)?,
        signature: row.get(15)?,
        verified: row.get(16)?,
    })
}

fn renewal_from_row(row: &Row<'_>) -> rusqlite::Result<Renewal> {
    Ok(Renewal {
        from_license_id: LicenseId::new(row.get(0)?),
        to_license_id: LicenseId::new(row.get(1)?),
        renewed_at: row.get::<_, DateTime<Utc>>(2)?,
    })
}

/// Fails with `NotFound` when an update touched no row.
fn expect_updated(changed: usize, what: &str, id: i64) -> StorageResult<()> {
    if changed == 0 {
        Err(StorageError::NotFound(format!("{what} {id}")))
    } else {
        Ok(())
    }
}

const APPLICATION_COLUMNS: &str =
    "id, name, default_valid_days, file_format, show_license_id, show_app_name, active";
const KEY_PAIR_COLUMNS: &str =
    "id, app_id, algorithm, public_key, private_key, encrypted, is_default, active, created_at";
const DEFINITION_COLUMNS: &str = "id, app_id, name, kind, active";
const LICENSE_COLUMNS: &str = "id, app_id, key_pair_id, app_name, company_name, contact_name, \
    phone_number, email, issue_date, issue_timestamp, expire_date, custom_values, file_format, \
    show_license_id, show_app_name, signature, verified";

impl StoreTransaction for SqliteTransaction<'_, '_> {
    fn insert_application(&mut self, app: &Application) -> StorageResult<Application> {
        self.tx.execute(
            "INSERT INTO applications (name, default_valid_days, file_format, show_license_id, show_app_name, active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                app.name,
                app.default_valid_days,
                app.file_format.to_string(),
                app.show_license_id,
                app.show_app_name,
                app.active,
            ],
        )?;
        Ok(Application {
            id: ApplicationId::new(self.tx.last_insert_rowid()),
            ..app.clone()
        })
    }

    fn application(&self, id: ApplicationId) -> StorageResult<Application> {
        self.tx
            .query_row(
                &format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = ?1"),
                params![id.get()],
                application_from_row,
            )
            .optional()?
            .ok_or_else(|| StorageError::NotFound(format!("application {id}")))
    }

    fn insert_key_pair(
        &mut self,
        key_pair: NewKeyPair,
        created_at: DateTime<Utc>,
    ) -> StorageResult<KeyPair> {
        self.tx.execute(
            "INSERT INTO key_pairs (app_id, algorithm, public_key, private_key, encrypted, is_default, active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
            params![
                key_pair.app_id.get(),
                key_pair.algorithm.as_str(),
                key_pair.public_key,
                key_pair.private_key,
                key_pair.encrypted,
                key_pair.is_default,
                created_at,
            ],
        )?;
        let id = KeyPairId::new(self.tx.last_insert_rowid());
        Ok(key_pair.into_key_pair(id, created_at))
    }

    fn key_pair(&self, id: KeyPairId) -> StorageResult<KeyPair> {
        self.tx
            .query_row(
                &format!("SELECT {KEY_PAIR_COLUMNS} FROM key_pairs WHERE id = ?1"),
                params![id.get()],
                key_pair_from_row,
            )
            .optional()?
            .ok_or_else(|| StorageError::NotFound(format!("key pair {id}")))
    }

    fn key_pairs(&self, app_id: ApplicationId) -> StorageResult<Vec<KeyPair>> {
        let mut stmt = self.tx.prepare(&format!(
            "SELECT {KEY_PAIR_COLUMNS} FROM key_pairs WHERE app_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![app_id.get()], key_pair_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn set_key_pair_flags(
        &mut self,
        id: KeyPairId,
        is_default: bool,
        active: bool,
    ) -> StorageResult<()> {
        let changed = self.tx.execute(
            "UPDATE key_pairs SET is_default = ?1, active = ?2 WHERE id = ?3",
            params![is_default, active, id.get()],
        )?;
        expect_updated(changed, "key pair", id.get())
    }

    fn insert_field_definition(
        &mut self,
        app_id: ApplicationId,
        name: &str,
        kind: &FieldKind,
    ) -> StorageResult<CustomFieldDefinition> {
        self.tx.execute(
            "INSERT INTO field_definitions (app_id, name, kind, active) VALUES (?1, ?2, ?3, 1)",
            params![app_id.get(), name, serde_json::to_string(kind)?],
        )?;
        Ok(CustomFieldDefinition {
            id: FieldDefinitionId::new(self.tx.last_insert_rowid()),
            app_id,
            name: name.to_string(),
            kind: kind.clone(),
            active: true,
        })
    }

    fn field_definitions(&self, app_id: ApplicationId) -> StorageResult<Vec<CustomFieldDefinition>> {
        let mut stmt = self.tx.prepare(&format!(
            "SELECT {DEFINITION_COLUMNS} FROM field_definitions WHERE app_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![app_id.get()], definition_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn set_field_definition_active(
        &mut self,
        id: FieldDefinitionId,
        active: bool,
    ) -> StorageResult<()> {
        let changed = self.tx.execute(
            "UPDATE field_definitions SET active = ?1 WHERE id = ?2",
            params![active, id.get()],
        )?;
        expect_updated(changed, "field definition", id.get())
    }

    fn insert_license(&mut self, record: &LicenseRecord) -> StorageResult<LicenseId> {
        self.tx.execute(
            "INSERT INTO licenses (app_id, key_pair_id, app_name, company_name, contact_name,
                phone_number, email, issue_date, issue_timestamp, expire_date, custom_values,
                file_format, show_license_id, show_app_name, signature, verified)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                record.app_id.get(),
                record.key_pair_id.get(),
                record.app_name,
                record.company_name,
                record.contact_name,
                record.phone_number,
                record.email,
                record.issue_date,
                record.issue_timestamp,
                record.expire_date,
                serde_json::to_string(&record.custom_values)?,
                record.file_format.to_string(),
                record.show_license_id,
                record.show_app_name,
                record.signature,
                record.verified,
            ],
        )?;
        Ok(LicenseId::new(self.tx.last_insert_rowid()))
    }

    fn license(&self, id: LicenseId) -> StorageResult<LicenseRecord> {
        self.tx
            .query_row(
                &format!("SELECT {LICENSE_COLUMNS} FROM licenses WHERE id = ?1"),
                params![id.get()],
                license_from_row,
            )
            .optional()?
            .ok_or_else(|| StorageError::NotFound(format!("license {id}")))
    }

    fn set_license_signature(&mut self, id: LicenseId, signature: &str) -> StorageResult<()> {
        let changed = self.tx.execute(
            "UPDATE licenses SET signature = ?1 WHERE id = ?2",
            params![signature, id.get()],
        )?;
        expect_updated(changed, "license", id.get())
    }

    fn set_license_verified(&mut self, id: LicenseId) -> StorageResult<()> {
        let changed = self.tx.execute(
            "UPDATE licenses SET verified = 1 WHERE id = ?1",
            params![id.get()],
        )?;
        expect_updated(changed, "license", id.get())
    }

    fn insert_renewal(&mut self, renewal: &Renewal) -> StorageResult<()> {
        self.tx.execute(
            "INSERT INTO renewals (from_license_id, to_license_id, renewed_at) VALUES (?1, ?2, ?3)",
            params![
                renewal.from_license_id.get(),
                renewal.to_license_id.get(),
                renewal.renewed_at,
            ],
        )?;
        Ok(())
    }

    fn renewals_from(&self, id: LicenseId) -> StorageResult<Vec<Renewal>> {
        let mut stmt = self.tx.prepare(
            "SELECT from_license_id, to_license_id, renewed_at FROM renewals
             WHERE from_license_id = ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![id.get()], renewal_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
