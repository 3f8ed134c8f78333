use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use clap::{CommandFactory, Parser};
use licensor_cli::{
    Cli, Command, ENCRYPTED_PRIVATE_KEY_FILE, EXIT_BAD_SIGNATURE, EXIT_EXPIRED, EXIT_MALFORMED,
    EXIT_VALID, PRIVATE_KEY_FILE, PUBLIC_KEY_FILE, VerifyOutcome, config_warnings, keygen,
    load_config, verify_file,
};
use licensor_crypto::{AesGcmKeyEncryptor, KdfParams, KeyEncryptor, new_password};
use licensor_issuance::EngineConfig;
use licensor_license::{LicenseFile, PrivateKey, build_and_sign};
use licensor_types::{Algorithm, FileFormat};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

/// Generates an unencrypted key pair in `dir` and signs a license with it.
fn signed_license(dir: &Path, format: FileFormat) -> (Vec<u8>, std::path::PathBuf) {
    let written = keygen(&EngineConfig::default(), Algorithm::Ed25519, dir, false).unwrap();
    let pem = fs::read_to_string(&written.private_path).unwrap();
    let key = PrivateKey::from_pem(Algorithm::Ed25519, &pem).unwrap();

    let file = LicenseFile {
        license_id: Some(1),
        app_name: Some("Example".to_string()),
        company_name: "ACME Dynamite".to_string(),
        contact_name: "Wile E. Coyote".to_string(),
        phone_number: "555-0100".to_string(),
        email: "wile@acme.example".to_string(),
        issue_date: date(2024, 1, 1),
        issue_timestamp: 1_704_067_200,
        expire_date: date(2049, 9, 21),
        extra: BTreeMap::new(),
        signature: String::new(),
    };
    let signed = build_and_sign(&file, &key, Algorithm::Ed25519, format).unwrap();
    (signed.bytes, written.public_path)
}

// ── Argument parsing ────────────────────────────────────────────

#[test]
fn command_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn parses_verify() {
    let cli = Cli::try_parse_from([
        "licensor",
        "verify",
        "--file",
        "license.yaml",
        "--public-key",
        "public.pem",
        "--algorithm",
        "ECDSA",
        "-v",
    ])
    .unwrap();

    assert!(cli.verbose);
    match cli.command {
        Command::Verify { file, public_key, algorithm } => {
            assert_eq!(file, Path::new("license.yaml"));
            assert_eq!(public_key, Path::new("public.pem"));
            assert_eq!(algorithm, Algorithm::Ecdsa);
        }
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn keygen_defaults_to_ed25519() {
    let cli = Cli::try_parse_from(["licensor", "keygen", "--out", "keys"]).unwrap();
    assert!(matches!(
        cli.command,
        Command::Keygen { algorithm: Algorithm::Ed25519, force: false, .. }
    ));
}

#[test]
fn unknown_algorithm_is_rejected() {
    assert!(Cli::try_parse_from(["licensor", "keygen", "--out", "k", "--algorithm", "dsa"]).is_err());
}

// ── keygen ──────────────────────────────────────────────────────

#[test]
fn keygen_writes_plaintext_pem() {
    let dir = tempfile::tempdir().unwrap();
    let written = keygen(&EngineConfig::default(), Algorithm::Ecdsa, dir.path(), false).unwrap();

    assert!(!written.encrypted);
    assert_eq!(written.public_path, dir.path().join(PUBLIC_KEY_FILE));
    assert_eq!(written.private_path, dir.path().join(PRIVATE_KEY_FILE));

    let private = fs::read_to_string(&written.private_path).unwrap();
    let public = fs::read_to_string(&written.public_path).unwrap();
    let key = PrivateKey::from_pem(Algorithm::Ecdsa, &private).unwrap();
    assert_eq!(key.public_key().to_pem().unwrap(), public);
}

#[test]
fn keygen_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    keygen(&EngineConfig::default(), Algorithm::Ed25519, dir.path(), false).unwrap();
    let before = fs::read(dir.path().join(PRIVATE_KEY_FILE)).unwrap();

    assert!(keygen(&EngineConfig::default(), Algorithm::Ed25519, dir.path(), false).is_err());
    assert_eq!(fs::read(dir.path().join(PRIVATE_KEY_FILE)).unwrap(), before);

    keygen(&EngineConfig::default(), Algorithm::Ed25519, dir.path(), true).unwrap();
    assert_ne!(fs::read(dir.path().join(PRIVATE_KEY_FILE)).unwrap(), before);
}

#[cfg(unix)]
#[test]
fn forced_keygen_restricts_existing_private_key() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let written = keygen(&EngineConfig::default(), Algorithm::Ed25519, dir.path(), false).unwrap();
    let mode = |path: &Path| fs::metadata(path).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode(&written.private_path), 0o600);

    fs::set_permissions(&written.private_path, fs::Permissions::from_mode(0o644)).unwrap();
    keygen(&EngineConfig::default(), Algorithm::Ed25519, dir.path(), true).unwrap();
    assert_eq!(mode(&written.private_path), 0o600);
}

#[test]
fn keygen_encrypts_with_configured_password() {
    let dir = tempfile::tempdir().unwrap();
    let password = new_password();
    let config = EngineConfig {
        private_key_password: Some(password.clone()),
        ..EngineConfig::default()
    };

    let written = keygen(&config, Algorithm::Ed25519, dir.path(), false).unwrap();
    assert!(written.encrypted);
    assert_eq!(written.private_path, dir.path().join(ENCRYPTED_PRIVATE_KEY_FILE));
    assert!(!dir.path().join(PRIVATE_KEY_FILE).exists());

    let sealed = fs::read(&written.private_path).unwrap();
    assert!(!sealed.starts_with(b"-----BEGIN"));

    let encryptor =
        AesGcmKeyEncryptor::new(&password, &KdfParams::with_iterations(config.kdf_iterations))
            .unwrap();
    let pem = String::from_utf8(encryptor.decrypt_key(&sealed).unwrap()).unwrap();
    PrivateKey::from_pem(Algorithm::Ed25519, &pem).unwrap();
}

// ── verify ──────────────────────────────────────────────────────

#[test]
fn verify_accepts_signed_license() {
    let dir = tempfile::tempdir().unwrap();
    let (bytes, public_key) = signed_license(dir.path(), FileFormat::Yaml);
    let license = dir.path().join("license.yaml");
    fs::write(&license, &bytes).unwrap();

    let outcome = verify_file(&license, &public_key, Algorithm::Ed25519).unwrap();
    let VerifyOutcome::Valid(file) = &outcome else {
        panic!("expected a valid license, got {outcome:?}");
    };
    assert_eq!(file.company_name, "ACME Dynamite");
    assert_eq!(outcome.exit_code(&at(2024, 1, 1, 0)), EXIT_VALID);
    assert_eq!(outcome.exit_code(&at(2049, 9, 21, 23)), EXIT_VALID);
    assert_eq!(outcome.exit_code(&at(2049, 9, 22, 0)), EXIT_EXPIRED);

    // 23:00 UTC on the expiry day is already the next day at UTC+02:00.
    let east = at(2049, 9, 21, 23).with_timezone(&FixedOffset::east_opt(2 * 3600).unwrap());
    assert_eq!(outcome.exit_code(&east), EXIT_EXPIRED);
}

#[test]
fn verify_reports_tampering() {
    let dir = tempfile::tempdir().unwrap();
    let (bytes, public_key) = signed_license(dir.path(), FileFormat::Json);
    let tampered = String::from_utf8(bytes).unwrap().replace("2049-09-21", "2029-09-21");
    let license = dir.path().join("license.json");
    fs::write(&license, tampered).unwrap();

    let outcome = verify_file(&license, &public_key, Algorithm::Ed25519).unwrap();
    assert_eq!(outcome, VerifyOutcome::BadSignature);
    assert_eq!(outcome.exit_code(&at(2024, 1, 1, 0)), EXIT_BAD_SIGNATURE);
}

#[test]
fn verify_reports_malformed_file() {
    let dir = tempfile::tempdir().unwrap();
    let (_, public_key) = signed_license(dir.path(), FileFormat::Yaml);
    let license = dir.path().join("license.yaml");
    fs::write(&license, "CompanyName: [unterminated").unwrap();

    let outcome = verify_file(&license, &public_key, Algorithm::Ed25519).unwrap();
    assert!(matches!(outcome, VerifyOutcome::Malformed(_)), "got {outcome:?}");
    assert_eq!(outcome.exit_code(&at(2024, 1, 1, 0)), EXIT_MALFORMED);
}

#[test]
fn verify_fails_on_missing_or_mismatched_key() {
    let dir = tempfile::tempdir().unwrap();
    let (bytes, public_key) = signed_license(dir.path(), FileFormat::Yaml);
    let license = dir.path().join("license.yaml");
    fs::write(&license, &bytes).unwrap();

    assert!(verify_file(&license, &dir.path().join("absent.pem"), Algorithm::Ed25519).is_err());
    assert!(verify_file(&license, &public_key, Algorithm::Rsa).is_err());
}

// ── config ──────────────────────────────────────────────────────

#[test]
fn explicit_config_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_config(Some(&dir.path().join("missing.toml"))).is_err());
}

#[test]
fn explicit_config_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "file_format = \"json\"\nutc_offset_minutes = -300\n").unwrap();

    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.file_format, FileFormat::Json);
    assert_eq!(config.utc_offset_minutes, -300);
}

#[test]
fn warns_when_encryption_is_disabled() {
    assert_eq!(config_warnings(&EngineConfig::default()).len(), 1);

    let protected = EngineConfig {
        private_key_password: Some(new_password()),
        ..EngineConfig::default()
    };
    assert!(config_warnings(&protected).is_empty());
}
