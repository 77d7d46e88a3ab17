// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key store backed by the platform credential store.
//!
//! Each alias becomes one keyring entry under the `biogate` service holding a
//! small JSON document: the hex-encoded key material and its policy. Key
//! material is only decoded for the duration of a single cipher operation.

use async_trait::async_trait;
use biogate_core::{AdapterType, BiogateError, HealthStatus, PluginAdapter};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::{Zeroize, Zeroizing};

use crate::cipher::SealedToken;
use crate::crypto::{self, KEY_LEN};
use crate::keystore::{Authorization, KeyPolicy, KeyState, SecureKeyStore};

/// Keyring service name for every vault key.
pub const DEFAULT_SERVICE: &str = "biogate";

/// Entry used to check whether the platform store is reachable.
const HEALTH_CHECK_USER: &str = "__biogate_health_check";

#[derive(Serialize, Deserialize)]
struct KeyringRecord {
    key: String,
    policy: KeyPolicy,
    #[serde(default)]
    invalidated: bool,
}

impl Drop for KeyringRecord {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// [`SecureKeyStore`] on top of the OS keyring (Keychain, Secret Service,
/// Credential Manager).
#[derive(Debug, Clone)]
pub struct KeyringKeyStore {
    service: String,
}

impl Default for KeyringKeyStore {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE)
    }
}

impl KeyringKeyStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, alias: &str) -> Result<keyring::Entry, BiogateError> {
        keyring::Entry::new(&self.service, alias).map_err(|e| {
            BiogateError::KeyStoreUnavailable(format!("failed to open keyring entry: {e}"))
        })
    }

    fn read(&self, alias: &str) -> Result<Option<KeyringRecord>, BiogateError> {
        let entry = self.entry(alias)?;
        match entry.get_secret() {
            Ok(bytes) => {
                let bytes = Zeroizing::new(bytes);
                let record = serde_json::from_slice(&bytes).map_err(|e| {
                    BiogateError::CorruptRecord {
                        key: alias.to_string(),
                        reason: format!("keyring entry is not a key record: {e}"),
                    }
                })?;
                Ok(Some(record))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(BiogateError::KeyStoreUnavailable(format!(
                "failed to read keyring entry: {e}"
            ))),
        }
    }

    fn write(&self, alias: &str, record: &KeyringRecord) -> Result<(), BiogateError> {
        let json = Zeroizing::new(
            serde_json::to_vec(record).map_err(|e| BiogateError::Internal(e.to_string()))?,
        );
        self.entry(alias)?.set_secret(&json).map_err(|e| {
            BiogateError::KeyStoreUnavailable(format!("failed to write keyring entry: {e}"))
        })
    }

    fn usable_key(
        &self,
        alias: &str,
        authorization: &Authorization,
    ) -> Result<Zeroizing<[u8; KEY_LEN]>, BiogateError> {
        let record = self
            .read(alias)?
            .ok_or_else(|| BiogateError::KeyNotFound(alias.to_string()))?;
        if record.invalidated {
            return Err(BiogateError::KeyInvalidated(alias.to_string()));
        }
        if !authorization.satisfies(&record.policy) {
            return Err(BiogateError::AuthorizationExpired);
        }
        decode_key(alias, &record.key)
    }
}

fn decode_key(alias: &str, encoded: &str) -> Result<Zeroizing<[u8; KEY_LEN]>, BiogateError> {
    let bytes = Zeroizing::new(hex::decode(encoded).map_err(|e| BiogateError::CorruptRecord {
        key: alias.to_string(),
        reason: format!("key material is not hex: {e}"),
    })?);
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    if bytes.len() != KEY_LEN {
        return Err(BiogateError::CorruptRecord {
            key: alias.to_string(),
            reason: format!("key material is {} bytes, expected {KEY_LEN}", bytes.len()),
        });
    }
    key.copy_from_slice(&bytes);
    Ok(key)
}

#[async_trait]
impl PluginAdapter for KeyringKeyStore {
    fn name(&self) -> &str {
        "keyring"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::KeyStore
    }

    async fn health_check(&self) -> Result<HealthStatus, BiogateError> {
        if self.is_supported() {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy(
                "platform keyring is not reachable".to_string(),
            ))
        }
    }
}

impl SecureKeyStore for KeyringKeyStore {
    fn is_supported(&self) -> bool {
        let entry = match self.entry(HEALTH_CHECK_USER) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "keyring health check failed");
                return false;
            }
        };
        match entry.get_secret() {
            Ok(_) | Err(keyring::Error::NoEntry) => true,
            Err(e) => {
                debug!(error = %e, "keyring health check failed");
                false
            }
        }
    }

    fn key_state(&self, alias: &str) -> Result<KeyState, BiogateError> {
        Ok(match self.read(alias)? {
            None => KeyState::Missing,
            Some(record) if record.invalidated => KeyState::Invalidated,
            Some(_) => KeyState::Valid,
        })
    }

    fn generate(&self, alias: &str, policy: &KeyPolicy) -> Result<(), BiogateError> {
        let material = crypto::generate_key()?;
        let record = KeyringRecord {
            key: hex::encode(material.as_slice()),
            policy: policy.clone(),
            invalidated: false,
        };
        self.write(alias, &record)?;
        debug!(alias = %alias, "key stored in platform keyring");
        Ok(())
    }

    fn delete(&self, alias: &str) -> Result<(), BiogateError> {
        match self.entry(alias)?.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => {
                warn!(alias = %alias, error = %e, "keyring delete failed");
                Err(BiogateError::KeyStoreUnavailable(format!(
                    "failed to delete keyring entry: {e}"
                )))
            }
        }
    }

    fn encrypt(
        &self,
        alias: &str,
        authorization: &Authorization,
        plaintext: &[u8],
    ) -> Result<SealedToken, BiogateError> {
        let key = self.usable_key(alias, authorization)?;
        let (ciphertext, iv) = crypto::seal(&key, alias.as_bytes(), plaintext)?;
        Ok(SealedToken {
            ciphertext,
            iv: iv.to_vec(),
        })
    }

    fn decrypt(
        &self,
        alias: &str,
        authorization: &Authorization,
        iv: &[u8],
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, BiogateError> {
        let key = self.usable_key(alias, authorization)?;
        crypto::open(&key, alias.as_bytes(), iv, ciphertext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_key_accepts_exact_length() {
        let key = decode_key("a", &"ab".repeat(KEY_LEN)).unwrap();
        assert_eq!(key[0], 0xab);
    }

    #[test]
    fn decode_key_rejects_bad_input() {
        assert!(matches!(
            decode_key("a", "zz"),
            Err(BiogateError::CorruptRecord { .. })
        ));
        assert!(matches!(
            decode_key("a", "abcd"),
            Err(BiogateError::CorruptRecord { reason, .. }) if reason.contains("2 bytes")
        ));
    }

    #[test]
    fn record_json_roundtrip_keeps_policy() {
        let record = KeyringRecord {
            key: "00".repeat(KEY_LEN),
            policy: KeyPolicy::default(),
            invalidated: false,
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: KeyringRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.policy, KeyPolicy::default());
        assert!(!back.invalidated);
    }

    #[test]
    fn record_without_invalidated_flag_defaults_to_valid() {
        let json = format!(
            r#"{{"key":"{}","policy":{{"user_authentication_required":true,"validity_secs":60,"invalidated_by_enrollment":true}}}}"#,
            "00".repeat(KEY_LEN)
        );
        let record: KeyringRecord = serde_json::from_str(&json).unwrap();
        assert!(!record.invalidated);
    }
}
