// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the biogate configuration system.

use biogate_config::diagnostic::ConfigError;
use biogate_config::model::KeyStoreBackend;
use biogate_config::{load_and_validate_str, load_config_from_str};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[general]
log_level = "debug"

[storage]
database_path = "/tmp/biogate-test.db"
wal_mode = false

[vault]
keystore = "memory"
key_alias_prefix = "bot_"
auth_validity_secs = 0
invalidate_on_enrollment = false

[auth]
title = "Mini App"
negative_button = "Cancel"
max_attempts = 5
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/biogate-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.vault.keystore, KeyStoreBackend::Memory);
    assert_eq!(config.vault.key_alias_prefix, "bot_");
    assert_eq!(config.vault.auth_validity_secs, 0);
    assert!(!config.vault.invalidate_on_enrollment);
    assert_eq!(config.auth.title, "Mini App");
    assert_eq!(config.auth.negative_button, "Cancel");
    assert_eq!(config.auth.max_attempts, 5);
}

#[test]
fn empty_toml_yields_defaults() {
    let config = load_and_validate_str("").expect("defaults are valid");
    assert_eq!(config.vault.keystore, KeyStoreBackend::Keyring);
    assert!(config.auth.pin_hash.is_none());
}

#[test]
fn typo_produces_unknown_key_with_suggestion() {
    let toml = "[vault]\nkeystor = \"memory\"\n";
    let errors = load_and_validate_str(toml).expect_err("typo must be rejected");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "keystor");
            assert_eq!(suggestion.as_deref(), Some("keystore"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_backend_is_reported_as_invalid_value() {
    let toml = "[vault]\nkeystore = \"tpm\"\n";
    let errors = load_and_validate_str(toml).expect_err("bad backend must be rejected");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidValue { .. } | ConfigError::Other(_))),
        "{errors:?}"
    );
}

#[test]
fn validation_runs_after_deserialization() {
    let toml = "[auth]\nmax_attempts = 0\n";
    let errors = load_and_validate_str(toml).expect_err("zero attempts is invalid");
    assert!(matches!(errors[0], ConfigError::Validation { .. }));
}
