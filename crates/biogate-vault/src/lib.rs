// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Biometric-gated credential vault.
//!
//! Stores one opaque token per identity, encrypted with a key that lives in a
//! secure key store and can only be used after a successful authentication
//! challenge. The pieces, leaf first:
//!
//! - [`keystore`]: the [`SecureKeyStore`] collaborator trait and the
//!   [`KeyVault`] that owns one key per identity.
//! - [`cipher`]: single-use cipher operations bound to a challenge.
//! - [`gate`]: the [`AuthenticationGate`] state machine around the
//!   [`BiometricAuthenticator`] collaborator.
//! - [`record`] and [`store`]: persisted per-identity state.
//! - [`strategy`]: hardware-backed vs legacy plaintext behavior, chosen once.
//! - [`service`]: the [`VaultService`] orchestrating reveal and store flows.

pub mod cipher;
pub mod crypto;
pub mod gate;
pub mod keyring_keystore;
pub mod keystore;
pub mod memory_keystore;
pub mod record;
pub mod service;
pub mod store;
pub mod strategy;

pub use cipher::{BoundCipher, CipherDirection, SealedToken, UnboundCipher};
pub use gate::{
    AuthOutcome, AuthenticationGate, Availability, BiometricAuthenticator, Challenge,
    ChallengeResponder, GateState, PromptInfo,
};
pub use keyring_keystore::KeyringKeyStore;
pub use keystore::{Authorization, KeyHandle, KeyPolicy, KeyState, KeyVault, SecureKeyStore};
pub use memory_keystore::SoftwareKeyStore;
pub use record::{CredentialRecord, TokenState};
pub use service::{ProtectedIdentity, TokenReveal, VaultService};
pub use store::CredentialStore;
pub use strategy::{
    select_strategy, HardwareBackedVault, LegacyPlaintextVault, VaultMode, VaultStrategy,
};
