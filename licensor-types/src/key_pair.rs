//! Key pair records.

use crate::{Algorithm, ApplicationId, KeyPairId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A stored signing identity for one application.
///
/// Algorithm and key material never change after creation. Only the
/// `is_default` and `active` flags are mutable.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    pub id: KeyPairId,
    pub app_id: ApplicationId,
    pub algorithm: Algorithm,
    /// PEM-encoded SubjectPublicKeyInfo.
    pub public_key: String,
    /// PKCS#8 PEM bytes, or their AES-GCM ciphertext when `encrypted` is set.
    pub private_key: Vec<u8>,
    pub encrypted: bool,
    pub is_default: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl KeyPair {
    /// Returns the listing view of this key pair, without private material.
    #[must_use]
    pub fn summary(&self) -> KeyPairSummary {
        KeyPairSummary {
            id: self.id,
            app_id: self.app_id,
            algorithm: self.algorithm,
            public_key: self.public_key.clone(),
            encrypted: self.encrypted,
            is_default: self.is_default,
            active: self.active,
            created_at: self.created_at,
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("id", &self.id)
            .field("app_id", &self.app_id)
            .field("algorithm", &self.algorithm)
            .field("private_key", &"[REDACTED]")
            .field("encrypted", &self.encrypted)
            .field("is_default", &self.is_default)
            .field("active", &self.active)
            .finish()
    }
}

/// Key pair as returned from listing operations. Never carries the private key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPairSummary {
    pub id: KeyPairId,
    pub app_id: ApplicationId,
    pub algorithm: Algorithm,
    pub public_key: String,
    pub encrypted: bool,
    pub is_default: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Key pair about to be inserted; storage assigns the identifier.
#[derive(Clone)]
pub struct NewKeyPair {
    pub app_id: ApplicationId,
    pub algorithm: Algorithm,
    pub public_key: String,
    pub private_key: Vec<u8>,
    pub encrypted: bool,
    pub is_default: bool,
}

impl NewKeyPair {
    /// Materialises the stored record once storage has assigned an id.
    #[must_use]
    pub fn into_key_pair(self, id: KeyPairId, created_at: DateTime<Utc>) -> KeyPair {
        KeyPair {
            id,
            app_id: self.app_id,
            algorithm: self.algorithm,
            public_key: self.public_key,
            private_key: self.private_key,
            encrypted: self.encrypted,
            is_default: self.is_default,
            active: true,
            created_at,
        }
    }
}

impl fmt::Debug for NewKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewKeyPair")
            .field("app_id", &self.app_id)
            .field("algorithm", &self.algorithm)
            .field("private_key", &"[REDACTED]")
            .field("encrypted", &self.encrypted)
            .field("is_default", &self.is_default)
            .finish()
    }
}
