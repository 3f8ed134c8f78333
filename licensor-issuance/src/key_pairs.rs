//! Key pair lifecycle: generation, default selection and soft deletion.
//!
//! The manager is the only component that sees private key bytes. They are
//! wrapped by the configured [`KeyEncryptor`] before storage and unwrapped
//! only to build a [`PrivateKey`] for signing.

use crate::config::EngineConfig;
use crate::error::{IssuanceError, IssuanceResult};
use crate::store::{LicenseStore, StoreTransaction};
use chrono::Utc;
use licensor_crypto::{CryptoError, KeyEncryptor};
use licensor_license::{generate_key_pair, PrivateKey, DEFAULT_RSA_BITS};
use licensor_types::{Algorithm, ApplicationId, KeyPair, KeyPairId, KeyPairSummary, NewKeyPair};
use std::sync::Arc;
use tracing::info;
use zeroize::Zeroizing;

/// Creates, lists and retires key pairs.
pub struct KeyPairManager<S> {
    store: Arc<S>,
    encryptor: Arc<dyn KeyEncryptor>,
    rsa_bits: usize,
}

impl<S: LicenseStore> KeyPairManager<S> {
    pub fn new(store: Arc<S>, encryptor: Arc<dyn KeyEncryptor>) -> Self {
        Self {
            store,
            encryptor,
            rsa_bits: DEFAULT_RSA_BITS,
        }
    }

    /// Creates a manager that encrypts keys with the configured password
    /// and generates RSA keys of the configured size.
    pub fn from_config(store: Arc<S>, config: &EngineConfig) -> IssuanceResult<Self> {
        Ok(Self {
            store,
            encryptor: config.key_encryptor()?,
            rsa_bits: config.rsa_bits,
        })
    }

    /// Generates and stores a new key pair for an application.
    ///
    /// The new key pair becomes the default if `make_default` is set or if
    /// the application has no active default yet.
    pub fn create(
        &self,
        app_id: ApplicationId,
        algorithm: Algorithm,
        make_default: bool,
    ) -> IssuanceResult<KeyPairSummary> {
        // Generation is CPU-bound; keep it outside the transaction.
        let generated = generate_key_pair(algorithm, self.rsa_bits)?;
        self.store_key(app_id, algorithm, &generated.public_pem, &generated.private_pem, make_default)
    }

    /// Stores an existing PKCS#8 PEM private key as a new key pair.
    ///
    /// # Errors
    ///
    /// Fails with a mismatch error if the PEM holds a key of another algorithm.
    pub fn import(
        &self,
        app_id: ApplicationId,
        algorithm: Algorithm,
        private_pem: &str,
        make_default: bool,
    ) -> IssuanceResult<KeyPairSummary> {
        let key = PrivateKey::from_pem(algorithm, private_pem)?;
        let public_pem = key.public_key().to_pem()?;
        let private_pem = key.to_pem()?;
        self.store_key(app_id, algorithm, &public_pem, &private_pem, make_default)
    }

    fn store_key(
        &self,
        app_id: ApplicationId,
        algorithm: Algorithm,
        public_pem: &str,
        private_pem: &str,
        make_default: bool,
    ) -> IssuanceResult<KeyPairSummary> {
        let private_key = self.encryptor.encrypt_key(private_pem.as_bytes())?;
        let encrypted = self.encryptor.is_encrypting();

        let key_pair = self.store.transaction(|tx| -> IssuanceResult<KeyPair> {
            tx.application(app_id)?;
            let siblings = tx.key_pairs(app_id)?;
            let has_default = siblings.iter().any(|kp| kp.active && kp.is_default);
            let is_default = make_default || !has_default;
            if is_default {
                clear_defaults(tx, &siblings, None)?;
            }
            Ok(tx.insert_key_pair(
                NewKeyPair {
                    app_id,
                    algorithm,
                    public_key: public_pem.to_string(),
                    private_key,
                    encrypted,
                    is_default,
                },
                Utc::now(),
            )?)
        })?;

        info!(
            key_pair_id = %key_pair.id,
            app_id = %app_id,
            %algorithm,
            encrypted,
            is_default = key_pair.is_default,
            "key pair created"
        );
        Ok(key_pair.summary())
    }

    /// Makes `id` the only default key pair of its application.
    ///
    /// Reads the key pair to find its application, then clears every
    /// sibling's default flag and sets the target's, all in one transaction.
    pub fn set_default(&self, id: KeyPairId) -> IssuanceResult<()> {
        let app_id = self.store.transaction(|tx| -> IssuanceResult<ApplicationId> {
            let key_pair = tx.key_pair(id)?;
            if !key_pair.active {
                return Err(IssuanceError::Validation(format!(
                    "key pair {id} is deleted and cannot be the default"
                )));
            }
            let siblings = tx.key_pairs(key_pair.app_id)?;
            clear_defaults(tx, &siblings, Some(id))?;
            tx.set_key_pair_flags(id, true, true)?;
            Ok(key_pair.app_id)
        })?;

        info!(key_pair_id = %id, app_id = %app_id, "default key pair changed");
        Ok(())
    }

    /// Soft-deletes a key pair.
    ///
    /// The row is kept so licenses signed with it stay verifiable; it is
    /// only marked inactive and non-default. Deleting the default leaves
    /// the application without one until [`set_default`](Self::set_default)
    /// is called or a new key pair is created.
    pub fn delete(&self, id: KeyPairId) -> IssuanceResult<()> {
        let was_default = self.store.transaction(|tx| -> IssuanceResult<bool> {
            let key_pair = tx.key_pair(id)?;
            tx.set_key_pair_flags(id, false, false)?;
            Ok(key_pair.is_default)
        })?;

        info!(key_pair_id = %id, was_default, "key pair deleted");
        Ok(())
    }

    /// Lists an application's key pairs, deleted ones included, without
    /// private key material.
    pub fn list(&self, app_id: ApplicationId) -> IssuanceResult<Vec<KeyPairSummary>> {
        self.store.transaction(|tx| -> IssuanceResult<_> {
            tx.application(app_id)?;
            Ok(tx.key_pairs(app_id)?.iter().map(KeyPair::summary).collect())
        })
    }

    /// Returns the application's active default key pair, if any.
    pub fn default_key_pair(&self, app_id: ApplicationId) -> IssuanceResult<Option<KeyPairSummary>> {
        Ok(self
            .list(app_id)?
            .into_iter()
            .find(|kp| kp.active && kp.is_default))
    }

    /// Returns the PEM public key for distribution to client applications.
    ///
    /// Works for deleted key pairs as well, so old licenses remain checkable.
    pub fn public_key_pem(&self, id: KeyPairId) -> IssuanceResult<String> {
        self.store
            .transaction(|tx| -> IssuanceResult<_> { Ok(tx.key_pair(id)?.public_key) })
    }

    /// Loads and unwraps the private key of an active key pair.
    pub fn signing_key(&self, id: KeyPairId) -> IssuanceResult<PrivateKey> {
        let key_pair = self
            .store
            .transaction(|tx| -> IssuanceResult<_> { Ok(tx.key_pair(id)?) })?;
        if !key_pair.active {
            return Err(IssuanceError::Validation(format!("key pair {id} is deleted")));
        }
        unwrap_private_key(&key_pair, self.encryptor.as_ref())
    }
}

/// Clears the default flag on every sibling except `keep`.
fn clear_defaults(
    tx: &mut dyn StoreTransaction,
    siblings: &[KeyPair],
    keep: Option<KeyPairId>,
) -> IssuanceResult<()> {
    for sibling in siblings {
        if sibling.is_default && Some(sibling.id) != keep {
            tx.set_key_pair_flags(sibling.id, false, sibling.active)?;
        }
    }
    Ok(())
}

/// Decrypts (if needed) and parses the private key of a stored key pair.
pub(crate) fn unwrap_private_key(
    key_pair: &KeyPair,
    encryptor: &dyn KeyEncryptor,
) -> IssuanceResult<PrivateKey> {
    let pem_bytes = if key_pair.encrypted {
        if !encryptor.is_encrypting() {
            return Err(CryptoError::Decryption(format!(
                "key pair {} is encrypted but no password is configured",
                key_pair.id
            ))
            .into());
        }
        Zeroizing::new(encryptor.decrypt_key(&key_pair.private_key)?)
    } else {
        Zeroizing::new(key_pair.private_key.clone())
    };

    let pem = std::str::from_utf8(&pem_bytes).map_err(|_| {
        IssuanceError::Storage(crate::error::StorageError::InvalidData(format!(
            "private key of key pair {} is not PEM text",
            key_pair.id
        )))
    })?;
    Ok(PrivateKey::from_pem(key_pair.algorithm, pem)?)
}
