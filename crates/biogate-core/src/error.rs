// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the biogate credential vault.

use thiserror::Error;

/// The primary error type used across all biogate crates.
///
/// The vault service never lets these escape its reveal/store operations;
/// they are logged and collapsed into a failed outcome there.
#[derive(Debug, Error)]
pub enum BiogateError {
    /// Configuration errors (invalid TOML, unknown backend, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Persistence backend errors (database connection, query failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The secure key store cannot be opened on this platform.
    #[error("key store unavailable: {0}")]
    KeyStoreUnavailable(String),

    /// No key exists under the given alias.
    #[error("no key found for alias {0}")]
    KeyNotFound(String),

    /// The key was invalidated, e.g. by biometric re-enrollment.
    #[error("key {0} was permanently invalidated")]
    KeyInvalidated(String),

    /// The authorization presented to the key store is outside the key's validity window.
    #[error("authorization is no longer fresh enough for this key")]
    AuthorizationExpired,

    /// The authentication challenge did not succeed.
    #[error("authentication challenge failed: {0}")]
    ChallengeFailed(String),

    /// A challenge was started while another one is still outstanding.
    #[error("an authentication challenge is already outstanding")]
    ChallengeInProgress,

    /// Ciphertext exists but no bound cipher was produced for it.
    #[error("bound cipher missing while a sealed token exists")]
    CryptoMismatch,

    /// A persisted value could not be decoded.
    #[error("corrupt record at `{key}`: {reason}")]
    CorruptRecord { key: String, reason: String },

    /// Cipher operation failure (wrong key, tampered data, RNG failure).
    #[error("crypto error: {0}")]
    Crypto(String),

    /// The requested capability is not supported by this backend.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BiogateError {
    /// Wrap any error as a storage error.
    pub fn storage<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            source: Box::new(source),
        }
    }
}
