// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cipher operations tied to an authentication challenge.
//!
//! An [`UnboundCipher`] names a key and a direction. It becomes a
//! [`BoundCipher`] only when a challenge succeeds, and a bound cipher is
//! consumed by its single encrypt or decrypt call.

use std::fmt;
use std::sync::Arc;

use biogate_core::BiogateError;
use zeroize::Zeroizing;

use crate::keystore::{Authorization, KeyHandle, SecureKeyStore};

/// Ciphertext and the iv it was produced with.
#[derive(Clone, PartialEq, Eq)]
pub struct SealedToken {
    pub ciphertext: Vec<u8>,
    pub iv: Vec<u8>,
}

impl fmt::Debug for SealedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedToken")
            .field("ciphertext", &format_args!("<{} bytes>", self.ciphertext.len()))
            .field("iv", &hex::encode(&self.iv))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CipherDirection {
    Encrypt,
    /// Decrypt with the iv persisted alongside the ciphertext.
    Decrypt { iv: Vec<u8> },
}

/// A cipher operation waiting for a successful challenge.
pub struct UnboundCipher {
    store: Arc<dyn SecureKeyStore>,
    key: KeyHandle,
    direction: CipherDirection,
}

impl UnboundCipher {
    pub fn encrypt(store: Arc<dyn SecureKeyStore>, key: KeyHandle) -> Self {
        Self {
            store,
            key,
            direction: CipherDirection::Encrypt,
        }
    }

    pub fn decrypt(store: Arc<dyn SecureKeyStore>, key: KeyHandle, iv: Vec<u8>) -> Self {
        Self {
            store,
            key,
            direction: CipherDirection::Decrypt { iv },
        }
    }

    pub fn direction(&self) -> &CipherDirection {
        &self.direction
    }

    pub fn key(&self) -> &KeyHandle {
        &self.key
    }

    pub(crate) fn bind(self, authorization: Authorization) -> BoundCipher {
        BoundCipher {
            inner: self,
            authorization,
        }
    }
}

impl fmt::Debug for UnboundCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnboundCipher")
            .field("key", &self.key)
            .field("direction", &self.direction)
            .finish()
    }
}

/// A cipher released by a successful challenge. Usable exactly once.
pub struct BoundCipher {
    inner: UnboundCipher,
    authorization: Authorization,
}

impl BoundCipher {
    pub fn direction(&self) -> &CipherDirection {
        &self.inner.direction
    }

    pub fn key(&self) -> &KeyHandle {
        &self.inner.key
    }

    pub fn authorization(&self) -> Authorization {
        self.authorization
    }

    pub fn encrypt(self, plaintext: &[u8]) -> Result<SealedToken, BiogateError> {
        match self.inner.direction {
            CipherDirection::Encrypt => self.inner.store.encrypt(
                self.inner.key.alias(),
                &self.authorization,
                plaintext,
            ),
            CipherDirection::Decrypt { .. } => Err(BiogateError::Internal(
                "cipher was bound for decryption".to_string(),
            )),
        }
    }

    pub fn decrypt(self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, BiogateError> {
        match &self.inner.direction {
            CipherDirection::Decrypt { iv } => self.inner.store.decrypt(
                self.inner.key.alias(),
                &self.authorization,
                iv,
                ciphertext,
            ),
            CipherDirection::Encrypt => Err(BiogateError::Internal(
                "cipher was bound for encryption".to_string(),
            )),
        }
    }
}

impl fmt::Debug for BoundCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundCipher")
            .field("key", &self.inner.key)
            .field("direction", &self.inner.direction)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::{KeyPolicy, KeyVault};
    use crate::memory_keystore::SoftwareKeyStore;
    use biogate_core::Identity;

    fn setup() -> (Arc<dyn SecureKeyStore>, KeyHandle) {
        let store: Arc<dyn SecureKeyStore> = Arc::new(SoftwareKeyStore::new());
        let vault = KeyVault::new(store.clone(), "9bot_", KeyPolicy::default());
        let key = vault.get_or_create_key(Identity::new(0, 1)).unwrap();
        (store, key)
    }

    #[test]
    fn bound_pair_roundtrips() {
        let (store, key) = setup();
        let sealed = UnboundCipher::encrypt(store.clone(), key.clone())
            .bind(Authorization::issue())
            .encrypt(b"token")
            .unwrap();
        let plain = UnboundCipher::decrypt(store, key, sealed.iv.clone())
            .bind(Authorization::issue())
            .decrypt(&sealed.ciphertext)
            .unwrap();
        assert_eq!(plain.as_slice(), b"token");
    }

    #[test]
    fn direction_is_enforced() {
        let (store, key) = setup();
        let err = UnboundCipher::encrypt(store, key)
            .bind(Authorization::issue())
            .decrypt(b"abc")
            .unwrap_err();
        assert!(err.to_string().contains("bound for encryption"));
    }

    #[test]
    fn debug_output_hides_ciphertext() {
        let sealed = SealedToken {
            ciphertext: vec![1, 2, 3],
            iv: vec![0xab],
        };
        let shown = format!("{sealed:?}");
        assert!(shown.contains("<3 bytes>"));
        assert!(shown.contains("ab"));
    }
}
