//! Key pair lifecycle tests.

mod common;

use common::{create_app, encrypting, encrypting_with, plaintext};
use licensor_crypto::{new_password, CryptoError};
use licensor_issuance::{
    EngineConfig, IssuanceError, KeyPairManager, LicenseStore, MemoryStore, SqliteStore,
};
use licensor_license::{generate_key_pair, LicenseError, PrivateKey, PublicKey};
use rsa::traits::PublicKeyParts;
use licensor_types::{Algorithm, ApplicationId, FileFormat, KeyPairId};
use std::sync::Arc;

fn defaults<S: LicenseStore>(manager: &KeyPairManager<S>, app_id: ApplicationId) -> Vec<KeyPairId> {
    manager
        .list(app_id)
        .unwrap()
        .into_iter()
        .filter(|kp| kp.active && kp.is_default)
        .map(|kp| kp.id)
        .collect()
}

// ── Default selection ───────────────────────────────────────────

#[test]
fn first_key_pair_becomes_default() {
    let store = Arc::new(MemoryStore::new());
    let app = create_app(store.as_ref(), "Example", FileFormat::Yaml);
    let manager = KeyPairManager::new(store, plaintext());

    let first = manager.create(app.id, Algorithm::Ed25519, false).unwrap();
    let second = manager.create(app.id, Algorithm::Ecdsa, false).unwrap();

    assert!(first.is_default);
    assert!(!second.is_default);
    assert_eq!(defaults(&manager, app.id), vec![first.id]);
}

#[test]
fn set_default_leaves_exactly_one_default() {
    let store = Arc::new(MemoryStore::new());
    let app = create_app(store.as_ref(), "Example", FileFormat::Yaml);
    let manager = KeyPairManager::new(store, plaintext());

    let kp1 = manager.create(app.id, Algorithm::Ed25519, true).unwrap();
    let kp2 = manager.create(app.id, Algorithm::Ed25519, false).unwrap();
    assert_eq!(defaults(&manager, app.id), vec![kp1.id]);

    manager.set_default(kp2.id).unwrap();
    assert_eq!(defaults(&manager, app.id), vec![kp2.id]);
    assert_eq!(manager.default_key_pair(app.id).unwrap().unwrap().id, kp2.id);
}

#[test]
fn create_with_make_default_moves_the_default() {
    let store = Arc::new(MemoryStore::new());
    let app = create_app(store.as_ref(), "Example", FileFormat::Yaml);
    let manager = KeyPairManager::new(store, plaintext());

    manager.create(app.id, Algorithm::Ed25519, false).unwrap();
    let kp2 = manager.create(app.id, Algorithm::Ecdsa, true).unwrap();

    assert_eq!(defaults(&manager, app.id), vec![kp2.id]);
}

#[test]
fn defaults_are_per_application() {
    let store = Arc::new(MemoryStore::new());
    let a = create_app(store.as_ref(), "A", FileFormat::Yaml);
    let b = create_app(store.as_ref(), "B", FileFormat::Json);
    let manager = KeyPairManager::new(store, plaintext());

    let ka = manager.create(a.id, Algorithm::Ed25519, true).unwrap();
    let kb = manager.create(b.id, Algorithm::Ed25519, true).unwrap();

    assert_eq!(defaults(&manager, a.id), vec![ka.id]);
    assert_eq!(defaults(&manager, b.id), vec![kb.id]);
}

#[test]
fn sqlite_set_default_leaves_exactly_one_default() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let app = create_app(store.as_ref(), "Example", FileFormat::Yaml);
    let manager = KeyPairManager::new(store, plaintext());

    let kp1 = manager.create(app.id, Algorithm::Ed25519, true).unwrap();
    let kp2 = manager.create(app.id, Algorithm::Ed25519, false).unwrap();
    let kp3 = manager.create(app.id, Algorithm::Ecdsa, false).unwrap();

    manager.set_default(kp2.id).unwrap();
    manager.set_default(kp3.id).unwrap();
    manager.set_default(kp1.id).unwrap();
    assert_eq!(defaults(&manager, app.id), vec![kp1.id]);
}

#[test]
fn unknown_application_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let manager = KeyPairManager::new(store, plaintext());

    let err = manager.create(ApplicationId::new(42), Algorithm::Ed25519, true).unwrap_err();
    assert!(matches!(err, IssuanceError::Storage(_)), "got {err:?}");
}

// ── Soft deletion ───────────────────────────────────────────────

#[test]
fn delete_is_soft() {
    let store = Arc::new(MemoryStore::new());
    let app = create_app(store.as_ref(), "Example", FileFormat::Yaml);
    let manager = KeyPairManager::new(store, plaintext());

    let kp = manager.create(app.id, Algorithm::Ed25519, true).unwrap();
    manager.delete(kp.id).unwrap();

    let listed = manager.list(app.id).unwrap();
    assert_eq!(listed.len(), 1);
    assert!(!listed[0].active);
    assert!(!listed[0].is_default);
    assert!(manager.default_key_pair(app.id).unwrap().is_none());

    // Licenses signed with it must stay checkable.
    let pem = manager.public_key_pem(kp.id).unwrap();
    assert_eq!(pem, kp.public_key);
    PublicKey::from_pem(Algorithm::Ed25519, &pem).unwrap();
}

#[test]
fn deleted_key_pair_cannot_become_default_or_sign() {
    let store = Arc::new(MemoryStore::new());
    let app = create_app(store.as_ref(), "Example", FileFormat::Yaml);
    let manager = KeyPairManager::new(store, plaintext());

    let kp = manager.create(app.id, Algorithm::Ed25519, true).unwrap();
    manager.delete(kp.id).unwrap();

    assert!(matches!(manager.set_default(kp.id), Err(IssuanceError::Validation(_))));
    assert!(matches!(manager.signing_key(kp.id), Err(IssuanceError::Validation(_))));
}

#[test]
fn new_key_pair_after_deleting_default_becomes_default() {
    let store = Arc::new(MemoryStore::new());
    let app = create_app(store.as_ref(), "Example", FileFormat::Yaml);
    let manager = KeyPairManager::new(store, plaintext());

    let old = manager.create(app.id, Algorithm::Ed25519, true).unwrap();
    manager.delete(old.id).unwrap();
    let new = manager.create(app.id, Algorithm::Ed25519, false).unwrap();

    assert!(new.is_default);
    assert_eq!(defaults(&manager, app.id), vec![new.id]);
}

fn deleting_the_default_leaves_no_default<S: LicenseStore>(store: Arc<S>) {
    let app = create_app(store.as_ref(), "Example", FileFormat::Yaml);
    let manager = KeyPairManager::new(store, plaintext());

    let kp1 = manager.create(app.id, Algorithm::Ed25519, true).unwrap();
    let kp2 = manager.create(app.id, Algorithm::Ed25519, false).unwrap();
    manager.delete(kp1.id).unwrap();

    // No sibling is promoted.
    assert!(defaults(&manager, app.id).is_empty());
    assert!(manager.default_key_pair(app.id).unwrap().is_none());
    let remaining = manager.list(app.id).unwrap();
    let kp2_now = remaining.iter().find(|kp| kp.id == kp2.id).unwrap();
    assert!(kp2_now.active);
    assert!(!kp2_now.is_default);

    manager.set_default(kp2.id).unwrap();
    assert_eq!(defaults(&manager, app.id), vec![kp2.id]);
}

#[test]
fn memory_deleting_the_default_leaves_no_default() {
    deleting_the_default_leaves_no_default(Arc::new(MemoryStore::new()));
}

#[test]
fn sqlite_deleting_the_default_leaves_no_default() {
    deleting_the_default_leaves_no_default(Arc::new(SqliteStore::open_in_memory().unwrap()));
}

// ── Configuration ───────────────────────────────────────────────

#[test]
fn from_config_uses_password_and_rsa_bits() {
    let store = Arc::new(MemoryStore::new());
    let app = create_app(store.as_ref(), "Example", FileFormat::Yaml);
    let config = EngineConfig {
        private_key_password: Some(new_password()),
        rsa_bits: 3072,
        ..EngineConfig::default()
    };
    let manager = KeyPairManager::from_config(store, &config).unwrap();

    let kp = manager.create(app.id, Algorithm::Rsa, true).unwrap();
    assert!(kp.encrypted);
    match manager.signing_key(kp.id).unwrap() {
        PrivateKey::Rsa(key) => assert_eq!(key.size() * 8, 3072),
        other => panic!("expected an RSA key, got {other:?}"),
    }
}

// ── Private key protection ──────────────────────────────────────

#[test]
fn encrypted_key_round_trips() {
    let store = Arc::new(MemoryStore::new());
    let app = create_app(store.as_ref(), "Example", FileFormat::Yaml);
    let manager = KeyPairManager::new(store, encrypting());

    let kp = manager.create(app.id, Algorithm::Ecdsa, true).unwrap();
    assert!(kp.encrypted);

    let key = manager.signing_key(kp.id).unwrap();
    assert_eq!(key.algorithm(), Algorithm::Ecdsa);
    assert_eq!(key.public_key().to_pem().unwrap(), kp.public_key);
}

#[test]
fn plaintext_key_is_marked_unencrypted() {
    let store = Arc::new(MemoryStore::new());
    let app = create_app(store.as_ref(), "Example", FileFormat::Yaml);
    let manager = KeyPairManager::new(store, plaintext());

    let kp = manager.create(app.id, Algorithm::Ed25519, true).unwrap();
    assert!(!kp.encrypted);
    manager.signing_key(kp.id).unwrap();
}

#[test]
fn wrong_password_cannot_unwrap() {
    let store = Arc::new(MemoryStore::new());
    let app = create_app(store.as_ref(), "Example", FileFormat::Yaml);
    let writer = KeyPairManager::new(Arc::clone(&store), encrypting_with(&new_password()));
    let kp = writer.create(app.id, Algorithm::Ed25519, true).unwrap();

    let reader = KeyPairManager::new(Arc::clone(&store), encrypting_with(&new_password()));
    let err = reader.signing_key(kp.id).unwrap_err();
    assert!(matches!(err, IssuanceError::Crypto(CryptoError::Decryption(_))), "got {err:?}");

    let unprotected = KeyPairManager::new(store, plaintext());
    let err = unprotected.signing_key(kp.id).unwrap_err();
    assert!(matches!(err, IssuanceError::Crypto(CryptoError::Decryption(_))), "got {err:?}");
}

// ── Import ──────────────────────────────────────────────────────

#[test]
fn import_keeps_the_key() {
    let store = Arc::new(MemoryStore::new());
    let app = create_app(store.as_ref(), "Example", FileFormat::Yaml);
    let manager = KeyPairManager::new(store, encrypting());

    let generated = generate_key_pair(Algorithm::Ed25519, 0).unwrap();
    let kp = manager
        .import(app.id, Algorithm::Ed25519, &generated.private_pem, true)
        .unwrap();

    assert_eq!(kp.public_key, generated.public_pem);
    let key = manager.signing_key(kp.id).unwrap();
    assert_eq!(*key.to_pem().unwrap(), *generated.private_pem);
}

#[test]
fn import_rejects_algorithm_mismatch() {
    let store = Arc::new(MemoryStore::new());
    let app = create_app(store.as_ref(), "Example", FileFormat::Yaml);
    let manager = KeyPairManager::new(store, plaintext());

    let generated = generate_key_pair(Algorithm::Ecdsa, 0).unwrap();
    let err = manager
        .import(app.id, Algorithm::Ed25519, &generated.private_pem, true)
        .unwrap_err();
    assert!(
        matches!(err, IssuanceError::License(LicenseError::InvalidKey(_) | LicenseError::AlgorithmMismatch { .. })),
        "got {err:?}"
    );
    assert!(manager.list(app.id).unwrap().is_empty());
}
