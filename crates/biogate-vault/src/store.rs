// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential persistence on top of a [`PreferenceStore`].
//!
//! One scope per account, `2botbiometry_<account>`, with these keys per
//! subject `S`:
//!
//! | key              | value                                              |
//! |------------------|----------------------------------------------------|
//! | `S`              | hex ciphertext, legacy plaintext, or `""`          |
//! | `S_iv`           | hex iv, or `""` when the token is not sealed       |
//! | `S_requested`    | bool                                               |
//! | `S_disabled`     | bool                                               |
//! | `device_idS`     | hex device id, written once                        |
//!
//! A record is always written as one [`PrefEdit`] batch.

use std::sync::Arc;

use biogate_core::{BiogateError, Identity, PluginAdapter, PrefEdit, PreferenceStore};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::cipher::SealedToken;
use crate::crypto;
use crate::record::{CredentialRecord, TokenState};

const SCOPE_PREFIX: &str = "2botbiometry_";
const REQUESTED_SUFFIX: &str = "_requested";
const DEVICE_ID_LEN: usize = 32;

pub fn scope(account: i32) -> String {
    format!("{SCOPE_PREFIX}{account}")
}

fn token_key(subject: i64) -> String {
    subject.to_string()
}

fn iv_key(subject: i64) -> String {
    format!("{subject}_iv")
}

fn requested_key(subject: i64) -> String {
    format!("{subject}{REQUESTED_SUFFIX}")
}

fn disabled_key(subject: i64) -> String {
    format!("{subject}_disabled")
}

fn device_id_key(subject: i64) -> String {
    format!("device_id{subject}")
}

/// Encode a token into its `(token, iv)` preference values.
/// `None` when nothing is stored.
pub(crate) fn encode_token(token: &TokenState) -> Option<(String, String)> {
    match token {
        TokenState::Absent => None,
        TokenState::Empty => Some((String::new(), String::new())),
        TokenState::Plain(plain) => Some((plain.to_string(), String::new())),
        TokenState::Sealed(sealed) => {
            Some((hex::encode(&sealed.ciphertext), hex::encode(&sealed.iv)))
        }
    }
}

/// Decode the persisted token and iv values. An empty iv marks a token that
/// was never sealed.
pub(crate) fn decode_token(
    subject: i64,
    token: Option<String>,
    iv: Option<String>,
) -> Result<TokenState, BiogateError> {
    let Some(token) = token else {
        return Ok(TokenState::Absent);
    };
    if token.is_empty() {
        return Ok(TokenState::Empty);
    }
    match iv.filter(|iv| !iv.is_empty()) {
        None => Ok(TokenState::Plain(Zeroizing::new(token))),
        Some(iv) => {
            let ciphertext = hex::decode(&token).map_err(|e| BiogateError::CorruptRecord {
                key: token_key(subject),
                reason: format!("sealed token is not hex: {e}"),
            })?;
            let iv = hex::decode(&iv).map_err(|e| BiogateError::CorruptRecord {
                key: iv_key(subject),
                reason: format!("iv is not hex: {e}"),
            })?;
            Ok(TokenState::Sealed(SealedToken { ciphertext, iv }))
        }
    }
}

/// Flags persisted next to the token; they decode independently of it.
struct Flags {
    requested: bool,
    disabled: bool,
}

impl Flags {
    fn with_token(self, token: TokenState) -> CredentialRecord {
        CredentialRecord {
            access_requested: self.requested || !token.is_absent(),
            disabled: self.disabled,
            token,
        }
    }
}

/// Loads and saves [`CredentialRecord`]s.
#[derive(Clone)]
pub struct CredentialStore {
    prefs: Arc<dyn PreferenceStore>,
}

impl CredentialStore {
    pub fn new(prefs: Arc<dyn PreferenceStore>) -> Self {
        Self { prefs }
    }

    pub fn preferences(&self) -> &Arc<dyn PreferenceStore> {
        &self.prefs
    }

    /// Load a record. Never-seen identities load as the zero record.
    pub async fn load(&self, identity: Identity) -> Result<CredentialRecord, BiogateError> {
        let (flags, token) = self.load_parts(identity).await?;
        Ok(flags.with_token(token?))
    }

    /// Like [`load`](Self::load), but an undecodable token loads as absent
    /// with the record marked requested. The flags are kept as stored.
    pub async fn load_recovering(
        &self,
        identity: Identity,
    ) -> Result<CredentialRecord, BiogateError> {
        let (flags, token) = self.load_parts(identity).await?;
        match token {
            Ok(token) => Ok(flags.with_token(token)),
            Err(BiogateError::CorruptRecord { key, reason }) => {
                warn!(
                    account = identity.account,
                    subject = identity.subject,
                    key = %key,
                    reason = %reason,
                    "corrupt credential record, treating token as absent"
                );
                Ok(CredentialRecord {
                    access_requested: true,
                    disabled: flags.disabled,
                    token: TokenState::Absent,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn load_parts(
        &self,
        identity: Identity,
    ) -> Result<(Flags, Result<TokenState, BiogateError>), BiogateError> {
        let scope = scope(identity.account);
        let subject = identity.subject;
        let token = self.prefs.get_string(&scope, &token_key(subject)).await?;
        let iv = self.prefs.get_string(&scope, &iv_key(subject)).await?;
        let requested = self
            .prefs
            .get_bool(&scope, &requested_key(subject), false)
            .await?;
        let disabled = self
            .prefs
            .get_bool(&scope, &disabled_key(subject), false)
            .await?;
        Ok((
            Flags {
                requested,
                disabled,
            },
            decode_token(subject, token, iv),
        ))
    }

    /// Persist a record as a single atomic batch.
    pub async fn save(
        &self,
        identity: Identity,
        record: &CredentialRecord,
    ) -> Result<(), BiogateError> {
        let subject = identity.subject;
        let mut edit = PrefEdit::new();

        edit = if record.access_requested {
            edit.put_bool(requested_key(subject), true)
        } else {
            edit.remove(requested_key(subject))
        };
        edit = match encode_token(&record.token) {
            Some((token, iv)) => edit
                .put_string(token_key(subject), token)
                .put_string(iv_key(subject), iv),
            None => edit.remove(token_key(subject)).remove(iv_key(subject)),
        };
        edit = if record.disabled {
            edit.put_bool(disabled_key(subject), true)
        } else {
            edit.remove(disabled_key(subject))
        };

        self.prefs.apply(&scope(identity.account), edit).await?;
        debug!(
            account = identity.account,
            subject,
            granted = record.access_granted(),
            disabled = record.disabled,
            "credential record saved"
        );
        Ok(())
    }

    /// Remember that the user was asked, whatever they answered.
    pub async fn mark_requested(&self, identity: Identity) -> Result<(), BiogateError> {
        let edit = PrefEdit::new().put_bool(requested_key(identity.subject), true);
        self.prefs.apply(&scope(identity.account), edit).await
    }

    /// Set the disabled flag. Enabling an identity that holds no token grants
    /// it with the empty sentinel.
    pub async fn set_disabled(
        &self,
        identity: Identity,
        disabled: bool,
    ) -> Result<(), BiogateError> {
        let scope = scope(identity.account);
        let subject = identity.subject;
        let mut edit = PrefEdit::new();
        if disabled {
            edit = edit.put_bool(disabled_key(subject), true);
        } else {
            edit = edit.remove(disabled_key(subject));
            if self.prefs.get(&scope, &token_key(subject)).await?.is_none() {
                edit = edit
                    .put_string(token_key(subject), "")
                    .put_string(iv_key(subject), "");
            }
        }
        self.prefs.apply(&scope, edit).await?;
        info!(account = identity.account, subject, disabled, "protection toggled");
        Ok(())
    }

    /// Delete the record. The device id survives.
    pub async fn remove(&self, identity: Identity) -> Result<(), BiogateError> {
        let subject = identity.subject;
        let edit = PrefEdit::new()
            .remove(token_key(subject))
            .remove(iv_key(subject))
            .remove(requested_key(subject))
            .remove(disabled_key(subject));
        self.prefs.apply(&scope(identity.account), edit).await?;
        info!(account = identity.account, subject, "credential record removed");
        Ok(())
    }

    /// Wipe every key of the given accounts.
    pub async fn clear_all(
        &self,
        accounts: impl IntoIterator<Item = i32>,
    ) -> Result<(), BiogateError> {
        for account in accounts {
            self.prefs.clear(&scope(account)).await?;
            info!(account, "credential scope cleared");
        }
        Ok(())
    }

    /// The identity's device id, generated on first use and never changed.
    pub async fn device_id(&self, identity: Identity) -> Result<String, BiogateError> {
        let scope = scope(identity.account);
        let key = device_id_key(identity.subject);
        if let Some(existing) = self.prefs.get_string(&scope, &key).await? {
            if !existing.is_empty() {
                return Ok(existing);
            }
        }
        let id = hex::encode(crypto::random_bytes::<DEVICE_ID_LEN>()?);
        self.prefs
            .apply(&scope, PrefEdit::new().put_string(key, id.clone()))
            .await?;
        debug!(account = identity.account, subject = identity.subject, "device id created");
        Ok(id)
    }

    /// Every identity of the account that was asked and granted, with its
    /// enabled flag, ordered by subject.
    ///
    /// Only `_requested` keys seed the scan. Foreign keys and undecodable
    /// records are skipped with a warning.
    pub async fn protected_subjects(
        &self,
        account: i32,
    ) -> Result<Vec<(Identity, bool)>, BiogateError> {
        let keys = self.prefs.keys(&scope(account)).await?;
        let mut subjects: Vec<i64> = keys
            .iter()
            .filter_map(|key| key.strip_suffix(REQUESTED_SUFFIX))
            .filter_map(|raw| match raw.parse::<i64>() {
                Ok(subject) => Some(subject),
                Err(e) => {
                    warn!(account, key = raw, error = %e, "skipping foreign preference key");
                    None
                }
            })
            .collect();
        subjects.sort_unstable();
        subjects.dedup();

        let mut protected = Vec::new();
        for subject in subjects {
            let identity = Identity::new(account, subject);
            match self.load(identity).await {
                Ok(record) if record.is_protected() => protected.push((identity, !record.disabled)),
                Ok(_) => {}
                Err(BiogateError::CorruptRecord { key, reason }) => {
                    warn!(account, subject, key = %key, reason = %reason, "skipping corrupt record");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(protected)
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("preferences", &self.prefs.name())
            .finish()
    }
}
