// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Preference store wrapper with injectable write failures.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use biogate_core::{
    AdapterType, BiogateError, HealthStatus, PluginAdapter, PrefEdit, PrefValue, PreferenceStore,
};

/// Delegates to an inner store; writes fail while [`fail_writes`] is set.
///
/// [`fail_writes`]: FlakyPreferences::fail_writes
pub struct FlakyPreferences {
    inner: Arc<dyn PreferenceStore>,
    failing: AtomicBool,
}

impl FlakyPreferences {
    pub fn new(inner: Arc<dyn PreferenceStore>) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
        }
    }

    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), BiogateError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BiogateError::storage(std::io::Error::other(
                "injected write failure",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for FlakyPreferences {
    fn name(&self) -> &str {
        "flaky"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Preferences
    }

    async fn health_check(&self) -> Result<HealthStatus, BiogateError> {
        self.inner.health_check().await
    }
}

#[async_trait]
impl PreferenceStore for FlakyPreferences {
    async fn get(&self, scope: &str, key: &str) -> Result<Option<PrefValue>, BiogateError> {
        self.inner.get(scope, key).await
    }

    async fn apply(&self, scope: &str, edit: PrefEdit) -> Result<(), BiogateError> {
        self.check()?;
        self.inner.apply(scope, edit).await
    }

    async fn clear(&self, scope: &str) -> Result<(), BiogateError> {
        self.check()?;
        self.inner.clear(scope).await
    }

    async fn entries(&self, scope: &str) -> Result<Vec<(String, PrefValue)>, BiogateError> {
        self.inner.entries(scope).await
    }
}
