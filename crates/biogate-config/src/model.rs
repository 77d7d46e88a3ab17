// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the biogate credential vault.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Top-level biogate configuration.
///
/// Every section is optional and defaults to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BiogateConfig {
    /// Process-wide settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Preference storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Key store and vault behavior.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Authentication prompt settings.
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Process-wide configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Preference storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file holding credential records.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("biogate").join("biogate.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("biogate.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Which secure key store backs the vault.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum KeyStoreBackend {
    /// The platform credential store (Keychain, Secret Service, Credential Manager).
    Keyring,
    /// Process-local keys; lost on exit. Intended for tests and demos.
    Memory,
    /// No hardware-backed store: tokens are kept unencrypted behind the challenge.
    None,
}

/// Vault configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// Key store backend.
    #[serde(default = "default_keystore")]
    pub keystore: KeyStoreBackend,

    /// Prefix of every key alias; the alias is `<prefix><account>_<subject>`.
    #[serde(default = "default_key_alias_prefix")]
    pub key_alias_prefix: String,

    /// Seconds a successful challenge keeps a key usable. 0 means every use
    /// needs its own challenge.
    #[serde(default = "default_auth_validity_secs")]
    pub auth_validity_secs: u64,

    /// Invalidate keys when the enrolled biometrics change.
    #[serde(default = "default_true")]
    pub invalidate_on_enrollment: bool,

    /// Store without prompting when the key still holds a fresh authorization.
    #[serde(default)]
    pub skip_prompt_when_fresh: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            keystore: default_keystore(),
            key_alias_prefix: default_key_alias_prefix(),
            auth_validity_secs: default_auth_validity_secs(),
            invalidate_on_enrollment: true,
            skip_prompt_when_fresh: false,
        }
    }
}

fn default_keystore() -> KeyStoreBackend {
    KeyStoreBackend::Keyring
}

fn default_key_alias_prefix() -> String {
    "9bot_".to_string()
}

fn default_auth_validity_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

/// Authentication prompt configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Prompt title used when the caller supplies no display name.
    #[serde(default = "default_title")]
    pub title: String,

    /// Label of the dismiss action.
    #[serde(default = "default_negative_button")]
    pub negative_button: String,

    /// Argon2id PHC hash of the console authenticator PIN. `None` leaves the
    /// console authenticator unavailable.
    #[serde(default)]
    pub pin_hash: Option<String>,

    /// Rejected attempts allowed before the challenge fails.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            negative_button: default_negative_button(),
            pin_hash: None,
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_title() -> String {
    "biogate".to_string()
}

fn default_negative_button() -> String {
    "Back".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = BiogateConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert!(config.storage.wal_mode);
        assert!(config.storage.database_path.ends_with("biogate.db"));
        assert_eq!(config.vault.keystore, KeyStoreBackend::Keyring);
        assert_eq!(config.vault.key_alias_prefix, "9bot_");
        assert_eq!(config.vault.auth_validity_secs, 60);
        assert!(config.vault.invalidate_on_enrollment);
        assert!(!config.vault.skip_prompt_when_fresh);
        assert_eq!(config.auth.negative_button, "Back");
        assert_eq!(config.auth.max_attempts, 3);
    }

    #[test]
    fn backend_parses_lowercase() {
        let config: BiogateConfig = toml::from_str("[vault]\nkeystore = \"none\"\n").unwrap();
        assert_eq!(config.vault.keystore, KeyStoreBackend::None);
        assert_eq!(KeyStoreBackend::Memory.to_string(), "memory");
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let result = toml::from_str::<BiogateConfig>("[vault]\nkeystore = \"tpm\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn vault_denies_unknown_fields() {
        let result = toml::from_str::<BiogateConfig>("[vault]\nkey_prefix = \"x\"\n");
        assert!(result.is_err());
    }
}
