// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-identity credential record.

use std::fmt;

use zeroize::Zeroizing;

use crate::cipher::SealedToken;

/// What is stored in place of the token.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum TokenState {
    /// Access never granted, or revoked.
    #[default]
    Absent,
    /// Access granted without a token.
    Empty,
    /// Unencrypted token written by the legacy plaintext vault.
    Plain(Zeroizing<String>),
    Sealed(SealedToken),
}

impl TokenState {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// A non-empty token is stored, sealed or not.
    pub fn is_saved(&self) -> bool {
        match self {
            Self::Absent | Self::Empty => false,
            Self::Plain(token) => !token.is_empty(),
            Self::Sealed(_) => true,
        }
    }
}

impl fmt::Debug for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("Absent"),
            Self::Empty => f.write_str("Empty"),
            Self::Plain(_) => f.write_str("Plain(<redacted>)"),
            Self::Sealed(sealed) => f.debug_tuple("Sealed").field(sealed).finish(),
        }
    }
}

/// Everything persisted for one identity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CredentialRecord {
    /// The user was asked for access at least once.
    pub access_requested: bool,
    /// Stored but temporarily not offered to the user.
    pub disabled: bool,
    pub token: TokenState,
}

impl CredentialRecord {
    /// Access was granted: a token, possibly empty, has been stored.
    pub fn access_granted(&self) -> bool {
        !self.token.is_absent()
    }

    pub fn token_saved(&self) -> bool {
        self.token.is_saved()
    }

    /// Shown to the user when enumerating protected identities.
    pub fn is_protected(&self) -> bool {
        self.access_requested && self.access_granted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn granted_is_derived_from_token() {
        let mut record = CredentialRecord::default();
        assert!(!record.access_granted());
        record.token = TokenState::Empty;
        assert!(record.access_granted());
        assert!(!record.token_saved());
        record.token = TokenState::Plain(Zeroizing::new("t".to_string()));
        assert!(record.token_saved());
    }

    #[test]
    fn empty_plain_token_is_not_saved() {
        assert!(!TokenState::Plain(Zeroizing::new(String::new())).is_saved());
    }

    #[test]
    fn protected_needs_request_and_grant() {
        let record = CredentialRecord {
            access_requested: true,
            disabled: true,
            token: TokenState::Empty,
        };
        assert!(record.is_protected());
        let record = CredentialRecord {
            access_requested: true,
            ..CredentialRecord::default()
        };
        assert!(!record.is_protected());
    }

    #[test]
    fn debug_never_prints_plaintext() {
        let state = TokenState::Plain(Zeroizing::new("123:secret".to_string()));
        assert_eq!(format!("{state:?}"), "Plain(<redacted>)");
    }
}
