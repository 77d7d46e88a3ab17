// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the PreferenceStore trait.

use async_trait::async_trait;
use rusqlite::params;
use tracing::{debug, warn};

use biogate_config::model::StorageConfig;
use biogate_core::{
    AdapterType, BiogateError, HealthStatus, PluginAdapter, PrefEdit, PrefOp, PrefValue,
    PreferenceStore,
};

use crate::database::{map_tr_err, Database};

const KIND_STR: &str = "str";
const KIND_BOOL: &str = "bool";

/// SQLite-backed preference store.
///
/// Each [`PrefEdit`] is applied inside one transaction, so a record write is
/// all-or-nothing even across several keys.
#[derive(Debug, Clone)]
pub struct SqlitePreferences {
    db: Database,
}

impl SqlitePreferences {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open the database named by the storage configuration.
    pub async fn open(config: &StorageConfig) -> Result<Self, BiogateError> {
        let db = Database::open(&config.database_path, config.wal_mode).await?;
        Ok(Self::new(db))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

fn encode(value: &PrefValue) -> (&'static str, String) {
    match value {
        PrefValue::Str(s) => (KIND_STR, s.clone()),
        PrefValue::Bool(b) => (KIND_BOOL, b.to_string()),
    }
}

fn decode(kind: &str, value: String) -> Option<PrefValue> {
    match (kind, value.as_str()) {
        (KIND_STR, _) => Some(PrefValue::Str(value)),
        (KIND_BOOL, "true") => Some(PrefValue::Bool(true)),
        (KIND_BOOL, "false") => Some(PrefValue::Bool(false)),
        _ => None,
    }
}

#[async_trait]
impl PluginAdapter for SqlitePreferences {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Preferences
    }

    async fn health_check(&self) -> Result<HealthStatus, BiogateError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl PreferenceStore for SqlitePreferences {
    async fn get(&self, scope: &str, key: &str) -> Result<Option<PrefValue>, BiogateError> {
        let scope_owned = scope.to_string();
        let key_owned = key.to_string();
        let row = self
            .db
            .connection()
            .call(move |conn| -> Result<Option<(String, String)>, rusqlite::Error> {
                let result = conn.query_row(
                    "SELECT kind, value FROM preferences WHERE scope = ?1 AND key = ?2",
                    params![scope_owned, key_owned],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                );
                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .await
            .map_err(map_tr_err)?;

        match row {
            None => Ok(None),
            Some((kind, value)) => {
                decode(&kind, value)
                    .map(Some)
                    .ok_or_else(|| BiogateError::CorruptRecord {
                        key: key.to_string(),
                        reason: format!("unrecognised value of kind `{kind}`"),
                    })
            }
        }
    }

    async fn apply(&self, scope: &str, edit: PrefEdit) -> Result<(), BiogateError> {
        if edit.is_empty() {
            return Ok(());
        }
        let scope_owned = scope.to_string();
        let ops = edit.into_ops();
        let count = ops.len();
        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let tx = conn.transaction()?;
                for op in &ops {
                    match op {
                        PrefOp::Put(key, value) => {
                            let (kind, text) = encode(value);
                            tx.execute(
                                "INSERT INTO preferences (scope, key, kind, value) VALUES (?1, ?2, ?3, ?4)
                                 ON CONFLICT(scope, key) DO UPDATE SET
                                     kind = excluded.kind,
                                     value = excluded.value,
                                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                                params![scope_owned, key, kind, text],
                            )?;
                        }
                        PrefOp::Remove(key) => {
                            tx.execute(
                                "DELETE FROM preferences WHERE scope = ?1 AND key = ?2",
                                params![scope_owned, key],
                            )?;
                        }
                    }
                }
                tx.commit()
            })
            .await
            .map_err(map_tr_err)?;
        debug!(scope = %scope, ops = count, "preference edit applied");
        Ok(())
    }

    async fn clear(&self, scope: &str) -> Result<(), BiogateError> {
        let scope_owned = scope.to_string();
        let removed = self
            .db
            .connection()
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                conn.execute(
                    "DELETE FROM preferences WHERE scope = ?1",
                    params![scope_owned],
                )
            })
            .await
            .map_err(map_tr_err)?;
        debug!(scope = %scope, removed, "preference scope cleared");
        Ok(())
    }

    async fn entries(&self, scope: &str) -> Result<Vec<(String, PrefValue)>, BiogateError> {
        let scope_owned = scope.to_string();
        let rows = self
            .db
            .connection()
            .call(move |conn| -> Result<Vec<(String, String, String)>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT key, kind, value FROM preferences WHERE scope = ?1 ORDER BY key",
                )?;
                let rows = stmt.query_map(params![scope_owned], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)?;

        Ok(rows
            .into_iter()
            .filter_map(|(key, kind, value)| match decode(&kind, value) {
                Some(v) => Some((key, v)),
                None => {
                    warn!(scope = %scope, key = %key, kind = %kind, "skipping undecodable preference");
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn open_temp() -> (SqlitePreferences, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.db");
        let config = StorageConfig {
            database_path: path.to_str().unwrap().to_string(),
            wal_mode: true,
        };
        (SqlitePreferences::open(&config).await.unwrap(), dir)
    }

    #[tokio::test]
    async fn put_get_remove() {
        let (prefs, _dir) = open_temp().await;
        prefs
            .apply(
                "2botbiometry_0",
                PrefEdit::new().put_string("42", "cafe").put_bool("42_requested", true),
            )
            .await
            .unwrap();

        assert_eq!(
            prefs.get_string("2botbiometry_0", "42").await.unwrap().as_deref(),
            Some("cafe")
        );
        assert!(prefs.get_bool("2botbiometry_0", "42_requested", false).await.unwrap());
        assert_eq!(prefs.get("2botbiometry_1", "42").await.unwrap(), None);

        prefs
            .apply("2botbiometry_0", PrefEdit::new().remove("42"))
            .await
            .unwrap();
        assert_eq!(prefs.get("2botbiometry_0", "42").await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_overwrites_kind_and_value() {
        let (prefs, _dir) = open_temp().await;
        prefs
            .apply("s", PrefEdit::new().put_bool("k", true))
            .await
            .unwrap();
        prefs
            .apply("s", PrefEdit::new().put_string("k", "v"))
            .await
            .unwrap();
        assert_eq!(
            prefs.get("s", "k").await.unwrap(),
            Some(PrefValue::Str("v".into()))
        );
        // A string under the key never reads as a boolean.
        assert!(!prefs.get_bool("s", "k", false).await.unwrap());
    }

    #[tokio::test]
    async fn entries_are_scoped_and_sorted() {
        let (prefs, _dir) = open_temp().await;
        prefs
            .apply("a", PrefEdit::new().put_string("2", "x").put_string("1", "y"))
            .await
            .unwrap();
        prefs
            .apply("b", PrefEdit::new().put_string("3", "z"))
            .await
            .unwrap();

        let keys = prefs.keys("a").await.unwrap();
        assert_eq!(keys, vec!["1".to_string(), "2".to_string()]);

        prefs.clear("a").await.unwrap();
        assert!(prefs.entries("a").await.unwrap().is_empty());
        assert_eq!(prefs.keys("b").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.db");
        let config = StorageConfig {
            database_path: path.to_str().unwrap().to_string(),
            wal_mode: true,
        };
        {
            let prefs = SqlitePreferences::open(&config).await.unwrap();
            prefs
                .apply("s", PrefEdit::new().put_string("device_id7", "abcd"))
                .await
                .unwrap();
            prefs.database().checkpoint().await.unwrap();
        }
        let prefs = SqlitePreferences::open(&config).await.unwrap();
        assert_eq!(
            prefs.get_string("s", "device_id7").await.unwrap().as_deref(),
            Some("abcd")
        );
    }

    #[tokio::test]
    async fn health_check_reports_healthy() {
        let (prefs, _dir) = open_temp().await;
        assert_eq!(prefs.health_check().await.unwrap(), HealthStatus::Healthy);
        assert_eq!(prefs.adapter_type(), AdapterType::Preferences);
    }
}
