// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The vault service: reveal and store flows, status, and enumeration.
//!
//! Reveal and store never return `Err` for crypto or persistence failures.
//! Those are logged and reported as an unsuccessful outcome, with any staged
//! plaintext dropped and the persisted record left as it was. The only error
//! they surface is [`BiogateError::ChallengeInProgress`].

use std::sync::Arc;

use biogate_config::model::{AuthConfig, BiogateConfig};
use biogate_core::{BiogateError, BiometryStatus, Identity, PreferenceStore};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::gate::{AuthenticationGate, BiometricAuthenticator, Challenge, GateState, PromptInfo};
use crate::keystore::SecureKeyStore;
use crate::record::{CredentialRecord, TokenState};
use crate::store::CredentialStore;
use crate::strategy::{select_strategy, VaultMode, VaultStrategy};

/// Outcome of a reveal.
#[derive(Debug)]
pub struct TokenReveal {
    pub success: bool,
    /// Present only on success, and only when a token is stored.
    pub token: Option<SecretString>,
}

impl TokenReveal {
    fn failed() -> Self {
        Self {
            success: false,
            token: None,
        }
    }
}

/// One row of [`VaultService::list_protected_identities`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProtectedIdentity {
    pub account: i32,
    pub subject: i64,
    pub enabled: bool,
}

impl ProtectedIdentity {
    pub fn identity(&self) -> Identity {
        Identity::new(self.account, self.subject)
    }
}

/// Orchestrates the key vault, authentication gate and credential store.
pub struct VaultService {
    store: CredentialStore,
    gate: AuthenticationGate,
    strategy: Box<dyn VaultStrategy>,
    prompt: AuthConfig,
    skip_prompt_when_fresh: bool,
}

impl VaultService {
    /// Build the service, choosing the strategy from the key store and config.
    pub fn new(
        prefs: Arc<dyn PreferenceStore>,
        keystore: Option<Arc<dyn SecureKeyStore>>,
        authenticator: Arc<dyn BiometricAuthenticator>,
        config: &BiogateConfig,
    ) -> Self {
        let strategy = select_strategy(keystore, &config.vault);
        Self::with_strategy(prefs, strategy, authenticator, config)
    }

    pub fn with_strategy(
        prefs: Arc<dyn PreferenceStore>,
        strategy: Box<dyn VaultStrategy>,
        authenticator: Arc<dyn BiometricAuthenticator>,
        config: &BiogateConfig,
    ) -> Self {
        Self {
            store: CredentialStore::new(prefs),
            gate: AuthenticationGate::new(authenticator),
            strategy,
            prompt: config.auth.clone(),
            skip_prompt_when_fresh: config.vault.skip_prompt_when_fresh,
        }
    }

    pub fn mode(&self) -> VaultMode {
        self.strategy.mode()
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    fn prompt(&self, reason: &str, display_name: Option<&str>) -> PromptInfo {
        let title = display_name
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.prompt.title);
        PromptInfo::new(title, reason, &self.prompt.negative_button)
    }

    /// Reveal the identity's token after a successful challenge.
    pub async fn request_token(
        &self,
        identity: Identity,
        reason: &str,
        display_name: Option<&str>,
    ) -> Result<TokenReveal, BiogateError> {
        let record = match self.store.load_recovering(identity).await {
            Ok(record) => record,
            Err(e) => {
                error!(account = identity.account, subject = identity.subject, error = %e, "failed to load credential record");
                return Ok(TokenReveal::failed());
            }
        };

        let cipher = match self.strategy.prepare_reveal(identity, &record) {
            Ok(cipher) => cipher,
            Err(e) => {
                warn!(account = identity.account, subject = identity.subject, error = %e, "cannot prepare decryption");
                return Ok(TokenReveal::failed());
            }
        };

        let challenge = self
            .gate
            .challenge(self.prompt(reason, display_name), cipher)
            .await?;
        let (authorization, cipher) = match challenge {
            Challenge::Granted {
                authorization,
                cipher,
            } => (authorization, cipher),
            Challenge::Failed { .. } | Challenge::Cancelled => {
                debug!(account = identity.account, subject = identity.subject, outcome = "denied", "token not revealed");
                return Ok(TokenReveal::failed());
            }
        };
        self.strategy.granted(identity, authorization);

        match self.strategy.reveal(&record, cipher) {
            Ok(token) => {
                info!(
                    account = identity.account,
                    subject = identity.subject,
                    outcome = "revealed",
                    has_token = token.is_some(),
                    "token released"
                );
                Ok(TokenReveal {
                    success: true,
                    token,
                })
            }
            Err(e) => {
                warn!(account = identity.account, subject = identity.subject, error = %e, "token reveal failed");
                Ok(TokenReveal::failed())
            }
        }
    }

    /// Store, replace or revoke (`None` or empty) the identity's token.
    ///
    /// Returns `Ok(true)` only once the new record is persisted.
    pub async fn update_token(
        &self,
        identity: Identity,
        reason: &str,
        display_name: Option<&str>,
        token: Option<SecretString>,
    ) -> Result<bool, BiogateError> {
        let token = token.filter(|t| !t.expose_secret().is_empty());
        let record = match self.store.load_recovering(identity).await {
            Ok(record) => record,
            Err(e) => {
                error!(account = identity.account, subject = identity.subject, error = %e, "failed to load credential record");
                return Ok(false);
            }
        };

        if let Some(token) = &token {
            if let Some(stored) = self.store_without_prompt(identity, &record, token).await {
                return Ok(stored);
            }
        }

        let cipher = match &token {
            Some(_) => match self.strategy.prepare_store(identity) {
                Ok(cipher) => cipher,
                Err(e) => {
                    warn!(account = identity.account, subject = identity.subject, error = %e, "cannot prepare encryption");
                    return Ok(false);
                }
            },
            None => None,
        };

        let challenge = self
            .gate
            .challenge(self.prompt(reason, display_name), cipher)
            .await?;
        let (authorization, cipher) = match challenge {
            Challenge::Granted {
                authorization,
                cipher,
            } => (authorization, cipher),
            Challenge::Failed { .. } | Challenge::Cancelled => {
                debug!(account = identity.account, subject = identity.subject, outcome = "denied", "token not stored");
                return Ok(false);
            }
        };
        self.strategy.granted(identity, authorization);

        let sealed = match &token {
            None => TokenState::Absent,
            Some(token) => match self.strategy.seal(token, cipher) {
                Ok(sealed) => sealed,
                Err(e) => {
                    warn!(account = identity.account, subject = identity.subject, error = %e, "token encryption failed");
                    return Ok(false);
                }
            },
        };
        Ok(self.commit(identity, record, sealed).await)
    }

    /// The store path that skips the prompt. `None` means "prompt instead".
    async fn store_without_prompt(
        &self,
        identity: Identity,
        record: &CredentialRecord,
        token: &SecretString,
    ) -> Option<bool> {
        if !self.skip_prompt_when_fresh {
            return None;
        }
        let cipher = self.strategy.fresh_store_cipher(identity)?;
        match self.strategy.seal(token, Some(cipher)) {
            Ok(sealed) => {
                debug!(account = identity.account, subject = identity.subject, "storing under a fresh authorization");
                Some(self.commit(identity, record.clone(), sealed).await)
            }
            Err(e) => {
                debug!(account = identity.account, subject = identity.subject, error = %e, "fresh authorization unusable, prompting");
                None
            }
        }
    }

    /// Swap in the staged token and persist the whole record in one batch.
    async fn commit(&self, identity: Identity, base: CredentialRecord, token: TokenState) -> bool {
        let revoked = token.is_absent();
        let staged = CredentialRecord {
            access_requested: base.access_requested || !revoked,
            disabled: base.disabled,
            token,
        };
        match self.store.save(identity, &staged).await {
            Ok(()) => {
                info!(
                    account = identity.account,
                    subject = identity.subject,
                    outcome = if revoked { "revoked" } else { "stored" },
                    "credential updated"
                );
                true
            }
            Err(e) => {
                error!(account = identity.account, subject = identity.subject, error = %e, "failed to persist credential record");
                false
            }
        }
    }

    /// Status snapshot for the UI layer. Creates the device id if needed.
    pub async fn status(&self, identity: Identity) -> Result<BiometryStatus, BiogateError> {
        let availability = self.gate.availability().await;
        let record = self.store.load_recovering(identity).await?;
        let device_id = self.store.device_id(identity).await?;
        Ok(BiometryStatus {
            available: availability.is_available(),
            kind: availability.kind().map(str::to_owned),
            access_requested: record.access_requested,
            access_granted: record.access_granted() && !record.disabled,
            token_saved: record.token_saved(),
            device_id,
        })
    }

    /// Identities of the account that were asked and granted.
    pub async fn list_protected_identities(
        &self,
        account: i32,
    ) -> Result<Vec<ProtectedIdentity>, BiogateError> {
        Ok(self
            .store
            .protected_subjects(account)
            .await?
            .into_iter()
            .map(|(identity, enabled)| ProtectedIdentity {
                account: identity.account,
                subject: identity.subject,
                enabled,
            })
            .collect())
    }

    pub async fn mark_requested(&self, identity: Identity) -> Result<(), BiogateError> {
        self.store.mark_requested(identity).await
    }

    pub async fn set_disabled(&self, identity: Identity, disabled: bool) -> Result<(), BiogateError> {
        self.store.set_disabled(identity, disabled).await
    }

    /// Delete the record, then the backing key and its legacy aliases.
    pub async fn remove(&self, identity: Identity) -> Result<(), BiogateError> {
        self.store.remove(identity).await?;
        self.strategy.forget(identity);
        Ok(())
    }

    pub async fn clear_all(&self, accounts: impl IntoIterator<Item = i32>) -> Result<(), BiogateError> {
        self.store.clear_all(accounts).await
    }

    pub async fn device_id(&self, identity: Identity) -> Result<String, BiogateError> {
        self.store.device_id(identity).await
    }
}

impl std::fmt::Debug for VaultService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultService")
            .field("mode", &self.strategy.mode())
            .field("gate", &self.gate)
            .field("store", &self.store)
            .finish()
    }
}
