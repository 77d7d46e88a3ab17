// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-local key store.
//!
//! Keys live in memory and vanish with the process. Enforces the same policy
//! checks as a hardware store, including invalidation on enrollment change,
//! which makes it the backend of choice for tests and demos.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use biogate_core::{AdapterType, BiogateError, HealthStatus, PluginAdapter};
use tracing::debug;
use zeroize::Zeroizing;

use crate::cipher::SealedToken;
use crate::crypto::{self, KEY_LEN};
use crate::keystore::{Authorization, KeyPolicy, KeyState, SecureKeyStore};

struct StoredKey {
    material: Zeroizing<[u8; KEY_LEN]>,
    policy: KeyPolicy,
    invalidated: bool,
}

/// In-memory [`SecureKeyStore`].
#[derive(Default)]
pub struct SoftwareKeyStore {
    keys: Mutex<HashMap<String, StoredKey>>,
    generated: AtomicUsize,
}

impl SoftwareKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a change of the enrolled biometrics.
    ///
    /// Every key whose policy asks for it becomes permanently unusable.
    /// Returns how many keys were invalidated.
    pub fn change_enrollment(&self) -> usize {
        let mut keys = self.lock();
        let mut count = 0;
        for key in keys.values_mut() {
            if key.policy.invalidated_by_enrollment && !key.invalidated {
                key.invalidated = true;
                count += 1;
            }
        }
        debug!(count, "enrollment changed, keys invalidated");
        count
    }

    /// Number of keys generated over the store's lifetime.
    pub fn generated_count(&self) -> usize {
        self.generated.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredKey>> {
        self.keys.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn usable<'a>(
        keys: &'a HashMap<String, StoredKey>,
        alias: &str,
        authorization: &Authorization,
    ) -> Result<&'a StoredKey, BiogateError> {
        let key = keys
            .get(alias)
            .ok_or_else(|| BiogateError::KeyNotFound(alias.to_string()))?;
        if key.invalidated {
            return Err(BiogateError::KeyInvalidated(alias.to_string()));
        }
        if !authorization.satisfies(&key.policy) {
            return Err(BiogateError::AuthorizationExpired);
        }
        Ok(key)
    }
}

#[async_trait]
impl PluginAdapter for SoftwareKeyStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::KeyStore
    }

    async fn health_check(&self) -> Result<HealthStatus, BiogateError> {
        Ok(HealthStatus::Degraded(
            "keys are process-local and lost on exit".to_string(),
        ))
    }
}

impl SecureKeyStore for SoftwareKeyStore {
    fn is_supported(&self) -> bool {
        true
    }

    fn key_state(&self, alias: &str) -> Result<KeyState, BiogateError> {
        Ok(match self.lock().get(alias) {
            None => KeyState::Missing,
            Some(key) if key.invalidated => KeyState::Invalidated,
            Some(_) => KeyState::Valid,
        })
    }

    fn generate(&self, alias: &str, policy: &KeyPolicy) -> Result<(), BiogateError> {
        let material = crypto::generate_key()?;
        self.lock().insert(
            alias.to_string(),
            StoredKey {
                material,
                policy: policy.clone(),
                invalidated: false,
            },
        );
        self.generated.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn delete(&self, alias: &str) -> Result<(), BiogateError> {
        self.lock().remove(alias);
        Ok(())
    }

    fn encrypt(
        &self,
        alias: &str,
        authorization: &Authorization,
        plaintext: &[u8],
    ) -> Result<SealedToken, BiogateError> {
        let keys = self.lock();
        let key = Self::usable(&keys, alias, authorization)?;
        let (ciphertext, iv) = crypto::seal(&key.material, alias.as_bytes(), plaintext)?;
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
        let keys = self.lock();
        let key = Self::usable(&keys, alias, authorization)?;
        crypto::open(&key.material, alias.as_bytes(), iv, ciphertext)
    }
}
