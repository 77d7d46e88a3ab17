// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Secure key store abstraction and per-identity key lifecycle.
//!
//! A [`SecureKeyStore`] holds symmetric keys that never leave it: callers name
//! a key by alias and hand over plaintext or ciphertext. Every use requires an
//! [`Authorization`], which only the authentication gate can mint.
//!
//! [`KeyVault`] maps identities onto aliases and owns creation, lookup and
//! deletion of those keys.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use biogate_config::model::VaultConfig;
use biogate_core::{BiogateError, Identity, PluginAdapter};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::cipher::SealedToken;

/// Alias prefixes written by older releases, followed by the bare subject id.
/// Only ever deleted, never read.
const LEGACY_ALIAS_PREFIXES: [&str; 2] = ["bot_", "2bot_"];

/// Proof that an authentication challenge succeeded at a point in time.
///
/// Has no public constructor: holding one means the gate let the user through.
#[derive(Debug, Clone, Copy)]
pub struct Authorization {
    issued_at: Instant,
}

impl Authorization {
    pub(crate) fn issue() -> Self {
        Self {
            issued_at: Instant::now(),
        }
    }

    #[cfg(test)]
    pub(crate) fn issued_at_instant(issued_at: Instant) -> Self {
        Self { issued_at }
    }

    /// When the challenge succeeded.
    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }

    /// Time elapsed since the challenge succeeded.
    pub fn age(&self) -> Duration {
        self.issued_at.elapsed()
    }

    /// Whether this authorization is still usable for a key with the given policy.
    ///
    /// A key without a validity window accepts any authorization; binding to a
    /// single challenge is enforced by the single-use cipher instead.
    pub fn satisfies(&self, policy: &KeyPolicy) -> bool {
        if !policy.user_authentication_required {
            return true;
        }
        match policy.validity() {
            Some(window) => self.age() <= window,
            None => true,
        }
    }
}

/// Usage policy attached to a key when it is generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPolicy {
    /// Every encrypt/decrypt requires an [`Authorization`].
    pub user_authentication_required: bool,
    /// Seconds an authorization stays usable; `None` means per-use.
    pub validity_secs: Option<u64>,
    /// Changing the enrolled biometrics permanently invalidates the key.
    pub invalidated_by_enrollment: bool,
}

impl KeyPolicy {
    pub fn from_config(config: &VaultConfig) -> Self {
        Self {
            user_authentication_required: true,
            validity_secs: (config.auth_validity_secs > 0).then_some(config.auth_validity_secs),
            invalidated_by_enrollment: config.invalidate_on_enrollment,
        }
    }

    pub fn validity(&self) -> Option<Duration> {
        self.validity_secs.map(Duration::from_secs)
    }
}

impl Default for KeyPolicy {
    fn default() -> Self {
        Self::from_config(&VaultConfig::default())
    }
}

/// Lifecycle state of a key alias inside the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Missing,
    Valid,
    /// Present but unusable forever; must be deleted and regenerated.
    Invalidated,
}

/// A hardware-backed (or hardware-like) store of symmetric keys.
///
/// Key material never crosses this interface. Implementations check the
/// presented [`Authorization`] against the key's [`KeyPolicy`] on every use.
pub trait SecureKeyStore: PluginAdapter {
    /// Whether this store can hold user-authenticated keys on this platform.
    fn is_supported(&self) -> bool;

    fn key_state(&self, alias: &str) -> Result<KeyState, BiogateError>;

    /// Generate a new key under `alias`, replacing any existing one.
    fn generate(&self, alias: &str, policy: &KeyPolicy) -> Result<(), BiogateError>;

    /// Delete the key under `alias`. Deleting a missing key is not an error.
    fn delete(&self, alias: &str) -> Result<(), BiogateError>;

    fn encrypt(
        &self,
        alias: &str,
        authorization: &Authorization,
        plaintext: &[u8],
    ) -> Result<SealedToken, BiogateError>;

    fn decrypt(
        &self,
        alias: &str,
        authorization: &Authorization,
        iv: &[u8],
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, BiogateError>;
}

/// Reference to a key that existed (or was created) when the handle was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyHandle {
    alias: String,
}

impl KeyHandle {
    pub fn alias(&self) -> &str {
        &self.alias
    }
}

/// Owns the per-identity keys of one vault.
pub struct KeyVault {
    store: Arc<dyn SecureKeyStore>,
    prefix: String,
    policy: KeyPolicy,
    /// Latest successful authorization per alias, for the store-without-prompt path.
    grants: Mutex<HashMap<String, Authorization>>,
}

impl KeyVault {
    pub fn new(store: Arc<dyn SecureKeyStore>, prefix: impl Into<String>, policy: KeyPolicy) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            policy,
            grants: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(store: Arc<dyn SecureKeyStore>, config: &VaultConfig) -> Self {
        Self::new(
            store,
            config.key_alias_prefix.clone(),
            KeyPolicy::from_config(config),
        )
    }

    /// Key alias of an identity: `<prefix><account>_<subject>`.
    pub fn alias(&self, identity: Identity) -> String {
        format!("{}{}_{}", self.prefix, identity.account, identity.subject)
    }

    pub fn policy(&self) -> &KeyPolicy {
        &self.policy
    }

    pub fn store(&self) -> &Arc<dyn SecureKeyStore> {
        &self.store
    }

    /// Return the identity's key, generating it when missing or invalidated.
    pub fn get_or_create_key(&self, identity: Identity) -> Result<KeyHandle, BiogateError> {
        let alias = self.alias(identity);
        match self.store.key_state(&alias)? {
            KeyState::Valid => {}
            KeyState::Missing => {
                debug!(alias = %alias, "generating vault key");
                self.store.generate(&alias, &self.policy)?;
            }
            KeyState::Invalidated => {
                warn!(alias = %alias, "vault key was invalidated, regenerating");
                self.forget_grant(&alias);
                self.store.delete(&alias)?;
                self.store.generate(&alias, &self.policy)?;
            }
        }
        Ok(KeyHandle { alias })
    }

    /// Return the identity's existing key. Never generates one.
    pub fn existing_key(&self, identity: Identity) -> Result<KeyHandle, BiogateError> {
        let alias = self.alias(identity);
        match self.store.key_state(&alias)? {
            KeyState::Valid => Ok(KeyHandle { alias }),
            KeyState::Missing => Err(BiogateError::KeyNotFound(alias)),
            KeyState::Invalidated => Err(BiogateError::KeyInvalidated(alias)),
        }
    }

    /// Delete the identity's key and any key left under a legacy alias.
    ///
    /// Best effort: failures are logged, never returned.
    pub fn delete_key(&self, identity: Identity) {
        let alias = self.alias(identity);
        self.forget_grant(&alias);
        let legacy = LEGACY_ALIAS_PREFIXES
            .iter()
            .map(|p| format!("{p}{}", identity.subject));
        for alias in std::iter::once(alias.clone()).chain(legacy) {
            if let Err(e) = self.store.delete(&alias) {
                warn!(alias = %alias, error = %e, "failed to delete vault key");
            }
        }
        info!(identity = %identity, "vault key deleted");
    }

    pub(crate) fn record_grant(&self, handle: &KeyHandle, authorization: Authorization) {
        self.grants
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(handle.alias.clone(), authorization);
    }

    /// The last authorization granted for this key, if still inside the window.
    pub(crate) fn fresh_grant(&self, handle: &KeyHandle) -> Option<Authorization> {
        let grants = self.grants.lock().unwrap_or_else(|e| e.into_inner());
        grants
            .get(&handle.alias)
            .copied()
            .filter(|auth| self.policy.validity_secs.is_some() && auth.satisfies(&self.policy))
    }

    fn forget_grant(&self, alias: &str) {
        self.grants
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(alias);
    }
}

impl std::fmt::Debug for KeyVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyVault")
            .field("store", &self.store.name())
            .field("prefix", &self.prefix)
            .field("policy", &self.policy)
            .finish()
    }
}
