//! Key pair management and license issuance for Licensor.
//!
//! This crate ties the signing engine to storage:
//! - [`LicenseStore`] / [`StoreTransaction`]: the storage boundary, with an
//!   in-memory and a SQLite implementation
//! - [`KeyPairManager`]: generation, default selection and soft deletion
//! - [`FieldManager`]: custom field definitions
//! - [`Issuer`]: the transactional issue, renew and export sequence
//! - [`EngineConfig`]: TOML configuration threaded into the components
//!
//! # Concurrency
//!
//! Components hold no mutable state of their own. The two operations that
//! maintain cross-row invariants, [`KeyPairManager::set_default`] and
//! [`Issuer::issue`], each run inside one store transaction.

mod config;
mod error;
mod fields;
mod issuer;
mod key_pairs;
mod memory;
mod sqlite;
mod store;

pub use config::EngineConfig;
pub use error::{IssuanceError, IssuanceResult, StorageError, StorageResult};
pub use fields::FieldManager;
pub use issuer::{IssuanceState, IssuedLicense, Issuer};
pub use key_pairs::KeyPairManager;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::{LicenseStore, StoreTransaction};
