// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end vault testing.
//!
//! `TestHarness` assembles a complete [`VaultService`] from a preference
//! store (in-memory or a temp SQLite file), a software key store and a
//! [`MockAuthenticator`], and keeps a handle on each of them for assertions.

use std::sync::Arc;

use biogate_config::model::{BiogateConfig, KeyStoreBackend, StorageConfig};
use biogate_core::{BiogateError, PreferenceStore};
use biogate_storage::{MemoryPreferences, SqlitePreferences};
use biogate_vault::{SecureKeyStore, SoftwareKeyStore, VaultService};

use crate::flaky_prefs::FlakyPreferences;
use crate::mock_authenticator::{MockAuthenticator, ScriptedOutcome};

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    outcomes: Vec<ScriptedOutcome>,
    config: BiogateConfig,
    sqlite: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = BiogateConfig::default();
        config.vault.keystore = KeyStoreBackend::Memory;
        Self {
            outcomes: Vec::new(),
            config,
            sqlite: false,
        }
    }

    /// Pre-load the authenticator script.
    pub fn with_outcomes(mut self, outcomes: Vec<ScriptedOutcome>) -> Self {
        self.outcomes = outcomes;
        self
    }

    /// Run without a secure key store (legacy plaintext vault).
    pub fn legacy(mut self) -> Self {
        self.config.vault.keystore = KeyStoreBackend::None;
        self
    }

    /// Allow stores to skip the prompt under a fresh authorization.
    pub fn skip_prompt_when_fresh(mut self) -> Self {
        self.config.vault.skip_prompt_when_fresh = true;
        self
    }

    /// Persist to a SQLite file in a temp directory instead of memory.
    pub fn with_sqlite(mut self) -> Self {
        self.sqlite = true;
        self
    }

    /// Replace the configuration wholesale.
    pub fn with_config(mut self, config: BiogateConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the harness.
    pub async fn build(self) -> Result<TestHarness, BiogateError> {
        let (inner, temp_dir): (Arc<dyn PreferenceStore>, _) = if self.sqlite {
            let temp_dir =
                tempfile::TempDir::new().map_err(|e| BiogateError::Storage { source: e.into() })?;
            let storage = StorageConfig {
                database_path: temp_dir
                    .path()
                    .join("test.db")
                    .to_string_lossy()
                    .to_string(),
                wal_mode: true,
            };
            let prefs: Arc<dyn PreferenceStore> =
                Arc::new(SqlitePreferences::open(&storage).await?);
            (prefs, Some(temp_dir))
        } else {
            let prefs: Arc<dyn PreferenceStore> = Arc::new(MemoryPreferences::new());
            (prefs, None)
        };

        let prefs = Arc::new(FlakyPreferences::new(inner));
        let keystore = Arc::new(SoftwareKeyStore::new());
        let authenticator = Arc::new(MockAuthenticator::with_outcomes(self.outcomes));

        let service = VaultService::new(
            prefs.clone(),
            Some(keystore.clone() as Arc<dyn SecureKeyStore>),
            authenticator.clone(),
            &self.config,
        );

        Ok(TestHarness {
            service,
            prefs,
            keystore,
            authenticator,
            config: self.config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete vault environment with mock collaborators.
pub struct TestHarness {
    pub service: VaultService,
    /// Preference store seen by the service; can inject write failures.
    pub prefs: Arc<FlakyPreferences>,
    pub keystore: Arc<SoftwareKeyStore>,
    pub authenticator: Arc<MockAuthenticator>,
    pub config: BiogateConfig,
    _temp_dir: Option<tempfile::TempDir>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Hardware-backed vault on in-memory preferences.
    pub async fn new() -> Result<Self, BiogateError> {
        Self::builder().build().await
    }
}

#[cfg(test)]
mod tests {
    use biogate_core::PluginAdapter;
    use biogate_vault::VaultMode;

    use super::*;

    #[tokio::test]
    async fn default_harness_is_hardware_backed() {
        let harness = TestHarness::new().await.unwrap();
        assert_eq!(harness.service.mode(), VaultMode::HardwareBacked);
    }

    #[tokio::test]
    async fn legacy_harness_uses_plaintext_vault() {
        let harness = TestHarness::builder().legacy().build().await.unwrap();
        assert_eq!(harness.service.mode(), VaultMode::LegacyPlaintext);
    }

    #[tokio::test]
    async fn sqlite_harness_builds() {
        let harness = TestHarness::builder().with_sqlite().build().await.unwrap();
        assert_eq!(harness.prefs.name(), "flaky");
    }
}
