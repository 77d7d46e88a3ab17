// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability strategies, selected once when the service is built.
//!
//! [`HardwareBackedVault`] seals tokens with a per-identity key and only
//! reveals them through a cipher bound to the challenge.
//! [`LegacyPlaintextVault`] keeps tokens unencrypted; the challenge still
//! gates every reveal and store but binds no cipher.

use std::sync::Arc;

use biogate_config::model::{KeyStoreBackend, VaultConfig};
use biogate_core::{BiogateError, Identity, PluginAdapter};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::cipher::{BoundCipher, UnboundCipher};
use crate::keystore::{Authorization, KeyVault, SecureKeyStore};
use crate::record::{CredentialRecord, TokenState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultMode {
    HardwareBacked,
    LegacyPlaintext,
}

impl std::fmt::Display for VaultMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::HardwareBacked => "hardware-backed",
            Self::LegacyPlaintext => "legacy-plaintext",
        })
    }
}

/// How tokens are protected at rest.
pub trait VaultStrategy: Send + Sync {
    fn mode(&self) -> VaultMode;

    /// Cipher to bind into a reveal challenge. `None` when the stored record
    /// needs no decryption.
    fn prepare_reveal(
        &self,
        identity: Identity,
        record: &CredentialRecord,
    ) -> Result<Option<UnboundCipher>, BiogateError>;

    /// Cipher to bind into a store challenge for a non-empty token.
    fn prepare_store(&self, identity: Identity) -> Result<Option<UnboundCipher>, BiogateError>;

    /// A cipher usable without a new challenge, when the identity's key still
    /// holds a fresh authorization.
    fn fresh_store_cipher(&self, identity: Identity) -> Option<BoundCipher>;

    /// Remember a successful challenge for the identity's key.
    fn granted(&self, identity: Identity, authorization: Authorization);

    /// Turn the stored token into plaintext after a successful challenge.
    fn reveal(
        &self,
        record: &CredentialRecord,
        cipher: Option<BoundCipher>,
    ) -> Result<Option<SecretString>, BiogateError>;

    /// Turn a non-empty plaintext token into its stored form.
    fn seal(
        &self,
        token: &SecretString,
        cipher: Option<BoundCipher>,
    ) -> Result<TokenState, BiogateError>;

    /// Drop the identity's key material, if any. Best effort.
    fn forget(&self, identity: Identity);
}

fn utf8_token(bytes: Zeroizing<Vec<u8>>) -> Result<SecretString, BiogateError> {
    let text = std::str::from_utf8(&bytes).map_err(|e| BiogateError::CorruptRecord {
        key: "token".to_string(),
        reason: format!("decrypted token is not UTF-8: {e}"),
    })?;
    Ok(SecretString::from(text.to_string()))
}

/// Tokens sealed under a per-identity key in a [`SecureKeyStore`].
#[derive(Debug)]
pub struct HardwareBackedVault {
    keys: KeyVault,
}

impl HardwareBackedVault {
    pub fn new(keys: KeyVault) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &KeyVault {
        &self.keys
    }
}

impl VaultStrategy for HardwareBackedVault {
    fn mode(&self) -> VaultMode {
        VaultMode::HardwareBacked
    }

    fn prepare_reveal(
        &self,
        identity: Identity,
        record: &CredentialRecord,
    ) -> Result<Option<UnboundCipher>, BiogateError> {
        match &record.token {
            TokenState::Sealed(sealed) => {
                let key = self.keys.existing_key(identity)?;
                Ok(Some(UnboundCipher::decrypt(
                    self.keys.store().clone(),
                    key,
                    sealed.iv.clone(),
                )))
            }
            _ => Ok(None),
        }
    }

    fn prepare_store(&self, identity: Identity) -> Result<Option<UnboundCipher>, BiogateError> {
        let key = self.keys.get_or_create_key(identity)?;
        Ok(Some(UnboundCipher::encrypt(self.keys.store().clone(), key)))
    }

    fn fresh_store_cipher(&self, identity: Identity) -> Option<BoundCipher> {
        let key = match self.keys.existing_key(identity) {
            Ok(key) => key,
            Err(_) => return None,
        };
        let authorization = self.keys.fresh_grant(&key)?;
        Some(UnboundCipher::encrypt(self.keys.store().clone(), key).bind(authorization))
    }

    fn granted(&self, identity: Identity, authorization: Authorization) {
        if let Ok(key) = self.keys.existing_key(identity) {
            self.keys.record_grant(&key, authorization);
        }
    }

    fn reveal(
        &self,
        record: &CredentialRecord,
        cipher: Option<BoundCipher>,
    ) -> Result<Option<SecretString>, BiogateError> {
        match &record.token {
            TokenState::Absent | TokenState::Empty => Ok(None),
            TokenState::Plain(plain) => Ok(Some(SecretString::from(plain.to_string()))),
            TokenState::Sealed(sealed) => {
                let cipher = cipher.ok_or(BiogateError::CryptoMismatch)?;
                utf8_token(cipher.decrypt(&sealed.ciphertext)?).map(Some)
            }
        }
    }

    fn seal(
        &self,
        token: &SecretString,
        cipher: Option<BoundCipher>,
    ) -> Result<TokenState, BiogateError> {
        let cipher = cipher.ok_or(BiogateError::CryptoMismatch)?;
        let sealed = cipher.encrypt(token.expose_secret().as_bytes())?;
        Ok(TokenState::Sealed(sealed))
    }

    fn forget(&self, identity: Identity) {
        self.keys.delete_key(identity);
    }
}

/// Tokens stored as-is behind the challenge.
#[derive(Debug, Default)]
pub struct LegacyPlaintextVault;

impl VaultStrategy for LegacyPlaintextVault {
    fn mode(&self) -> VaultMode {
        VaultMode::LegacyPlaintext
    }

    fn prepare_reveal(
        &self,
        _identity: Identity,
        _record: &CredentialRecord,
    ) -> Result<Option<UnboundCipher>, BiogateError> {
        Ok(None)
    }

    fn prepare_store(&self, _identity: Identity) -> Result<Option<UnboundCipher>, BiogateError> {
        Ok(None)
    }

    fn fresh_store_cipher(&self, _identity: Identity) -> Option<BoundCipher> {
        None
    }

    fn granted(&self, _identity: Identity, _authorization: Authorization) {}

    fn reveal(
        &self,
        record: &CredentialRecord,
        _cipher: Option<BoundCipher>,
    ) -> Result<Option<SecretString>, BiogateError> {
        match &record.token {
            TokenState::Absent => Ok(None),
            TokenState::Empty => Ok(Some(SecretString::from(String::new()))),
            TokenState::Plain(plain) => Ok(Some(SecretString::from(plain.to_string()))),
            TokenState::Sealed(_) => Err(BiogateError::Unsupported(
                "sealed token needs a hardware-backed key store".to_string(),
            )),
        }
    }

    fn seal(
        &self,
        token: &SecretString,
        _cipher: Option<BoundCipher>,
    ) -> Result<TokenState, BiogateError> {
        Ok(TokenState::Plain(Zeroizing::new(
            token.expose_secret().to_string(),
        )))
    }

    fn forget(&self, _identity: Identity) {}
}

/// Pick the strategy for this process.
///
/// A missing key store, the `none` backend, or a store that reports itself
/// unsupported all select the legacy plaintext vault.
pub fn select_strategy(
    keystore: Option<Arc<dyn SecureKeyStore>>,
    config: &VaultConfig,
) -> Box<dyn VaultStrategy> {
    let store = match (config.keystore, keystore) {
        (KeyStoreBackend::None, _) | (_, None) => {
            info!("no secure key store configured, using legacy plaintext vault");
            return Box::new(LegacyPlaintextVault);
        }
        (_, Some(store)) => store,
    };
    if !store.is_supported() {
        warn!(
            keystore = store.name(),
            error = %BiogateError::KeyStoreUnavailable(store.name().to_string()),
            "falling back to legacy plaintext vault"
        );
        return Box::new(LegacyPlaintextVault);
    }
    info!(keystore = store.name(), "using hardware-backed vault");
    Box::new(HardwareBackedVault::new(KeyVault::from_config(store, config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::SealedToken;
    use crate::keystore::{KeyPolicy, KeyState};
    use crate::memory_keystore::SoftwareKeyStore;

    fn hardware() -> HardwareBackedVault {
        HardwareBackedVault::new(KeyVault::from_config(
            Arc::new(SoftwareKeyStore::new()),
            &VaultConfig::default(),
        ))
    }

    #[test]
    fn hardware_seal_then_reveal() {
        let vault = hardware();
        let id = Identity::new(0, 1);
        let cipher = vault
            .prepare_store(id)
            .unwrap()
            .unwrap()
            .bind(Authorization::issue());
        let token = vault
            .seal(&SecretString::from("123:abc".to_string()), Some(cipher))
            .unwrap();
        let record = CredentialRecord {
            access_requested: true,
            disabled: false,
            token,
        };

        let cipher = vault
            .prepare_reveal(id, &record)
            .unwrap()
            .unwrap()
            .bind(Authorization::issue());
        let revealed = vault.reveal(&record, Some(cipher)).unwrap().unwrap();
        assert_eq!(revealed.expose_secret(), "123:abc");
    }

    #[test]
    fn hardware_reveal_without_cipher_is_a_mismatch() {
        let record = CredentialRecord {
            token: TokenState::Sealed(SealedToken {
                ciphertext: vec![1; 20],
                iv: vec![0; 12],
            }),
            ..CredentialRecord::default()
        };
        assert!(matches!(
            hardware().reveal(&record, None),
            Err(BiogateError::CryptoMismatch)
        ));
    }

    #[test]
    fn hardware_reveal_of_sealed_record_without_key_fails_early() {
        let record = CredentialRecord {
            token: TokenState::Sealed(SealedToken {
                ciphertext: vec![1; 20],
                iv: vec![0; 12],
            }),
            ..CredentialRecord::default()
        };
        assert!(matches!(
            hardware().prepare_reveal(Identity::new(0, 1), &record),
            Err(BiogateError::KeyNotFound(_))
        ));
    }

    #[test]
    fn hardware_empty_and_absent_reveal_nothing() {
        let vault = hardware();
        let mut record = CredentialRecord::default();
        assert!(vault.reveal(&record, None).unwrap().is_none());
        record.token = TokenState::Empty;
        assert!(vault.reveal(&record, None).unwrap().is_none());
    }

    #[test]
    fn hardware_reveals_records_written_in_legacy_mode() {
        let record = CredentialRecord {
            token: TokenState::Plain(Zeroizing::new("old".to_string())),
            ..CredentialRecord::default()
        };
        let vault = hardware();
        assert!(vault.prepare_reveal(Identity::new(0, 1), &record).unwrap().is_none());
        assert_eq!(
            vault.reveal(&record, None).unwrap().unwrap().expose_secret(),
            "old"
        );
    }

    #[test]
    fn fresh_cipher_only_after_grant() {
        let vault = hardware();
        let id = Identity::new(0, 1);
        assert!(vault.fresh_store_cipher(id).is_none());
        vault.prepare_store(id).unwrap();
        assert!(vault.fresh_store_cipher(id).is_none());
        vault.granted(id, Authorization::issue());
        assert!(vault.fresh_store_cipher(id).is_some());
    }

    #[test]
    fn legacy_reveals_verbatim() {
        let vault = LegacyPlaintextVault;
        let mut record = CredentialRecord::default();
        assert!(vault.reveal(&record, None).unwrap().is_none());
        record.token = TokenState::Empty;
        assert_eq!(vault.reveal(&record, None).unwrap().unwrap().expose_secret(), "");
        record.token = vault.seal(&SecretString::from("plain".to_string()), None).unwrap();
        assert_eq!(
            vault.reveal(&record, None).unwrap().unwrap().expose_secret(),
            "plain"
        );
    }

    #[test]
    fn selection_follows_backend_and_support() {
        let store: Arc<dyn SecureKeyStore> = Arc::new(SoftwareKeyStore::new());
        let config = VaultConfig {
            keystore: KeyStoreBackend::Memory,
            ..VaultConfig::default()
        };
        assert_eq!(
            select_strategy(Some(store.clone()), &config).mode(),
            VaultMode::HardwareBacked
        );
        assert_eq!(
            select_strategy(None, &config).mode(),
            VaultMode::LegacyPlaintext
        );
        let none = VaultConfig {
            keystore: KeyStoreBackend::None,
            ..VaultConfig::default()
        };
        assert_eq!(
            select_strategy(Some(store), &none).mode(),
            VaultMode::LegacyPlaintext
        );
    }

    /// A key store on a platform without hardware-backed keys.
    struct NoHardware;

    #[async_trait::async_trait]
    impl PluginAdapter for NoHardware {
        fn name(&self) -> &str {
            "no-hardware"
        }

        fn adapter_type(&self) -> biogate_core::AdapterType {
            biogate_core::AdapterType::KeyStore
        }

        async fn health_check(&self) -> Result<biogate_core::HealthStatus, BiogateError> {
            Ok(biogate_core::HealthStatus::Unhealthy("no hardware".into()))
        }
    }

    impl SecureKeyStore for NoHardware {
        fn is_supported(&self) -> bool {
            false
        }

        fn key_state(&self, _alias: &str) -> Result<KeyState, BiogateError> {
            Err(BiogateError::KeyStoreUnavailable("no-hardware".into()))
        }

        fn generate(&self, _alias: &str, _policy: &KeyPolicy) -> Result<(), BiogateError> {
            Err(BiogateError::KeyStoreUnavailable("no-hardware".into()))
        }

        fn delete(&self, _alias: &str) -> Result<(), BiogateError> {
            Ok(())
        }

        fn encrypt(
            &self,
            _alias: &str,
            _authorization: &Authorization,
            _plaintext: &[u8],
        ) -> Result<SealedToken, BiogateError> {
            Err(BiogateError::KeyStoreUnavailable("no-hardware".into()))
        }

        fn decrypt(
            &self,
            _alias: &str,
            _authorization: &Authorization,
            _iv: &[u8],
            _ciphertext: &[u8],
        ) -> Result<Zeroizing<Vec<u8>>, BiogateError> {
            Err(BiogateError::KeyStoreUnavailable("no-hardware".into()))
        }
    }

    #[test]
    fn unsupported_store_selects_legacy() {
        let config = VaultConfig::default();
        assert_eq!(
            select_strategy(Some(Arc::new(NoHardware)), &config).mode(),
            VaultMode::LegacyPlaintext
        );
    }
}
