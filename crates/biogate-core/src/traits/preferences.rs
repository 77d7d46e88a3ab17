// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key-value persistence trait.
//!
//! A preference store is a durable map partitioned into scopes (one per
//! account). Values are strings or booleans. Writes go through [`PrefEdit`]
//! batches, which backends must apply all-or-nothing.

use async_trait::async_trait;

use crate::error::BiogateError;
use crate::traits::adapter::PluginAdapter;
use crate::types::PrefValue;

/// One operation inside a [`PrefEdit`] batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefOp {
    Put(String, PrefValue),
    Remove(String),
}

/// An ordered batch of writes applied atomically to a single scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefEdit {
    ops: Vec<PrefOp>,
}

impl PrefEdit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_string(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ops.push(PrefOp::Put(key.into(), PrefValue::Str(value.into())));
        self
    }

    pub fn put_bool(mut self, key: impl Into<String>, value: bool) -> Self {
        self.ops.push(PrefOp::Put(key.into(), PrefValue::Bool(value)));
        self
    }

    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.ops.push(PrefOp::Remove(key.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[PrefOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<PrefOp> {
        self.ops
    }
}

/// Durable, scope-partitioned key-value storage.
#[async_trait]
pub trait PreferenceStore: PluginAdapter {
    /// Read a single value.
    async fn get(&self, scope: &str, key: &str) -> Result<Option<PrefValue>, BiogateError>;

    /// Apply a batch of writes. Either every operation lands or none does.
    async fn apply(&self, scope: &str, edit: PrefEdit) -> Result<(), BiogateError>;

    /// Remove every key in the scope.
    async fn clear(&self, scope: &str) -> Result<(), BiogateError>;

    /// Enumerate every key in the scope with its value.
    async fn entries(&self, scope: &str) -> Result<Vec<(String, PrefValue)>, BiogateError>;

    /// Read a string value; a boolean stored under the key reads as absent.
    async fn get_string(&self, scope: &str, key: &str) -> Result<Option<String>, BiogateError> {
        Ok(self
            .get(scope, key)
            .await?
            .and_then(|v| v.as_str().map(str::to_owned)))
    }

    /// Read a boolean value, falling back to `default` when absent or not a boolean.
    async fn get_bool(&self, scope: &str, key: &str, default: bool) -> Result<bool, BiogateError> {
        Ok(self
            .get(scope, key)
            .await?
            .and_then(|v| v.as_bool())
            .unwrap_or(default))
    }

    /// Enumerate the keys of a scope.
    async fn keys(&self, scope: &str) -> Result<Vec<String>, BiogateError> {
        Ok(self
            .entries(scope)
            .await?
            .into_iter()
            .map(|(k, _)| k)
            .collect())
    }
}
