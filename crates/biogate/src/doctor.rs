// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `biogate doctor` command implementation.
//!
//! Checks the configuration, the preference database, the secure key store
//! and the authenticator, then reports which vault mode a command would use.

use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use biogate_config::model::{BiogateConfig, KeyStoreBackend};
use biogate_core::{BiogateError, HealthStatus, PluginAdapter};
use biogate_storage::Database;
use biogate_vault::{BiometricAuthenticator, SecureKeyStore, VaultMode, select_strategy};

use crate::console_auth::ConsoleAuthenticator;

/// Status of a diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Run the `biogate doctor` command. With `--plain`, disables colored output.
pub async fn run_doctor(
    config: &BiogateConfig,
    config_path: Option<&Path>,
    plain: bool,
) -> Result<(), BiogateError> {
    let use_color = !plain && std::io::stdout().is_terminal();
    let keystore = crate::build_keystore(config.vault.keystore);
    let authenticator = ConsoleAuthenticator::from_config(&config.auth);

    let results = vec![
        check_config(config_path),
        check_database(&config.storage.database_path, config.storage.wal_mode).await,
        check_keystore(config.vault.keystore, keystore.as_ref()).await,
        check_authenticator(&authenticator).await,
        check_vault_mode(config, keystore),
    ];

    println!();
    println!("  biogate doctor");
    println!("  {}", "-".repeat(50));

    let mut issues = 0;
    for result in &results {
        if result.status != CheckStatus::Pass {
            issues += 1;
        }
        println!("{}", format_line(result, use_color));
    }

    println!();
    if issues > 0 {
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
    } else {
        println!("  All checks passed.");
    }
    println!();

    Ok(())
}

fn format_line(result: &CheckResult, use_color: bool) -> String {
    let duration_ms = result.duration.as_millis();
    if use_color {
        use colored::Colorize;
        let (symbol, message) = match result.status {
            CheckStatus::Pass => ("✓".green().to_string(), result.message.normal().to_string()),
            CheckStatus::Warn => ("!".yellow().to_string(), result.message.yellow().to_string()),
            CheckStatus::Fail => ("✗".red().to_string(), result.message.red().to_string()),
        };
        format!("    {symbol} {:<20} {message} ({duration_ms}ms)", result.name)
    } else {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        format!(
            "    {tag} {:<20} {} ({duration_ms}ms)",
            result.name, result.message
        )
    }
}

fn check_config(path: Option<&Path>) -> CheckResult {
    let start = Instant::now();
    let loaded = match path {
        Some(path) => biogate_config::load_and_validate_path(path),
        None => biogate_config::load_and_validate(),
    };
    match loaded {
        Ok(_) => CheckResult::new("Configuration", CheckStatus::Pass, "valid", start),
        Err(errors) => CheckResult::new(
            "Configuration",
            CheckStatus::Fail,
            format!("{} error(s)", errors.len()),
            start,
        ),
    }
}

async fn check_database(db_path: &str, wal_mode: bool) -> CheckResult {
    let start = Instant::now();
    if !Path::new(db_path).exists() {
        return CheckResult::new(
            "Database",
            CheckStatus::Warn,
            format!("not found: {db_path} (will be created on first use)"),
            start,
        );
    }
    match Database::open(db_path, wal_mode).await {
        Ok(_) => CheckResult::new("Database", CheckStatus::Pass, "connected", start),
        Err(e) => CheckResult::new("Database", CheckStatus::Fail, format!("open failed: {e}"), start),
    }
}

async fn check_keystore(
    backend: KeyStoreBackend,
    keystore: Option<&Arc<dyn SecureKeyStore>>,
) -> CheckResult {
    let start = Instant::now();
    let Some(store) = keystore else {
        return CheckResult::new(
            "Key store",
            CheckStatus::Warn,
            "disabled (vault.keystore = \"none\")",
            start,
        );
    };
    if !store.is_supported() {
        return CheckResult::new(
            "Key store",
            CheckStatus::Fail,
            format!("{} backend not reachable", store.name()),
            start,
        );
    }
    match store.health_check().await {
        Ok(HealthStatus::Healthy) => {
            CheckResult::new("Key store", CheckStatus::Pass, store.name().to_string(), start)
        }
        Ok(HealthStatus::Degraded(reason)) => {
            let message = match backend {
                KeyStoreBackend::Memory => format!("{reason} (keys are lost on exit)"),
                _ => reason,
            };
            CheckResult::new("Key store", CheckStatus::Warn, message, start)
        }
        Ok(HealthStatus::Unhealthy(reason)) => {
            CheckResult::new("Key store", CheckStatus::Fail, reason, start)
        }
        Err(e) => CheckResult::new("Key store", CheckStatus::Fail, e.to_string(), start),
    }
}

async fn check_authenticator(authenticator: &dyn BiometricAuthenticator) -> CheckResult {
    let start = Instant::now();
    let availability = authenticator.availability().await;
    match availability.kind() {
        Some(kind) => CheckResult::new("Authenticator", CheckStatus::Pass, kind.to_string(), start),
        None => CheckResult::new(
            "Authenticator",
            CheckStatus::Warn,
            "unavailable; set auth.pin_hash (see `biogate pin-hash`)",
            start,
        ),
    }
}

fn check_vault_mode(config: &BiogateConfig, keystore: Option<Arc<dyn SecureKeyStore>>) -> CheckResult {
    let start = Instant::now();
    let mode = select_strategy(keystore, &config.vault).mode();
    let status = match mode {
        VaultMode::HardwareBacked => CheckStatus::Pass,
        VaultMode::LegacyPlaintext => CheckStatus::Warn,
    };
    CheckResult::new("Vault mode", status, mode.to_string(), start)
}

#[cfg(test)]
mod tests {
    use biogate_vault::SoftwareKeyStore;

    use super::*;

    #[tokio::test]
    async fn missing_database_is_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");
        let result = check_database(path.to_str().unwrap(), true).await;
        assert_eq!(result.status, CheckStatus::Warn);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn existing_database_connects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.db");
        let path = path.to_str().unwrap();
        Database::open(path, true).await.unwrap();
        assert_eq!(check_database(path, true).await.status, CheckStatus::Pass);
    }

    #[tokio::test]
    async fn memory_keystore_warns() {
        let store: Arc<dyn SecureKeyStore> = Arc::new(SoftwareKeyStore::new());
        let result = check_keystore(KeyStoreBackend::Memory, Some(&store)).await;
        assert_eq!(result.status, CheckStatus::Warn);
        assert!(result.message.contains("lost on exit"));
    }

    #[test]
    fn vault_mode_follows_backend() {
        let mut config = BiogateConfig::default();
        config.vault.keystore = KeyStoreBackend::None;
        let result = check_vault_mode(&config, None);
        assert_eq!(result.status, CheckStatus::Warn);
        assert_eq!(result.message, "legacy-plaintext");

        config.vault.keystore = KeyStoreBackend::Memory;
        let store: Arc<dyn SecureKeyStore> = Arc::new(SoftwareKeyStore::new());
        let result = check_vault_mode(&config, Some(store));
        assert_eq!(result.status, CheckStatus::Pass);
    }

    #[test]
    fn plain_lines_are_tagged() {
        let result = CheckResult {
            name: "Database".into(),
            status: CheckStatus::Fail,
            message: "open failed".into(),
            duration: Duration::from_millis(3),
        };
        let line = format_line(&result, false);
        assert!(line.contains("[FAIL]"));
        assert!(line.ends_with("open failed (3ms)"));
    }
}
