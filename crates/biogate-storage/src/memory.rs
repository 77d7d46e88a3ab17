// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory preference store. Nothing survives the process.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use biogate_core::{
    AdapterType, BiogateError, HealthStatus, PluginAdapter, PrefEdit, PrefOp, PrefValue,
    PreferenceStore,
};

/// A preference store held in a map of scopes.
///
/// Edits are staged on a copy of the scope and swapped in under the write
/// lock, which keeps them atomic.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    scopes: RwLock<HashMap<String, BTreeMap<String, PrefValue>>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PluginAdapter for MemoryPreferences {
    fn name(&self) -> &str {
        "memory"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Preferences
    }

    async fn health_check(&self) -> Result<HealthStatus, BiogateError> {
        Ok(HealthStatus::Degraded(
            "in-memory preferences are lost on exit".to_string(),
        ))
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferences {
    async fn get(&self, scope: &str, key: &str) -> Result<Option<PrefValue>, BiogateError> {
        Ok(self
            .scopes
            .read()
            .await
            .get(scope)
            .and_then(|s| s.get(key))
            .cloned())
    }

    async fn apply(&self, scope: &str, edit: PrefEdit) -> Result<(), BiogateError> {
        let mut scopes = self.scopes.write().await;
        let mut staged = scopes.get(scope).cloned().unwrap_or_default();
        for op in edit.into_ops() {
            match op {
                PrefOp::Put(key, value) => {
                    staged.insert(key, value);
                }
                PrefOp::Remove(key) => {
                    staged.remove(&key);
                }
            }
        }
        scopes.insert(scope.to_string(), staged);
        Ok(())
    }

    async fn clear(&self, scope: &str) -> Result<(), BiogateError> {
        self.scopes.write().await.remove(scope);
        Ok(())
    }

    async fn entries(&self, scope: &str) -> Result<Vec<(String, PrefValue)>, BiogateError> {
        Ok(self
            .scopes
            .read()
            .await
            .get(scope)
            .map(|s| s.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }
}
