// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the biogate credential vault.
//!
//! This crate provides the error type, identity and status types, and the
//! adapter traits that the storage and vault crates build on. External
//! collaborators (persistence backends) implement traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::BiogateError;
pub use types::{AdapterType, BiometryStatus, HealthStatus, Identity, PrefValue};

pub use traits::{PluginAdapter, PrefEdit, PrefOp, PreferenceStore};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_type_round_trips_through_strings() {
        use std::str::FromStr;

        let variants = [
            AdapterType::Preferences,
            AdapterType::KeyStore,
            AdapterType::Authenticator,
        ];

        for variant in &variants {
            let s = variant.to_string();
            let parsed = AdapterType::from_str(&s).expect("should parse back");
            assert_eq!(*variant, parsed);
        }
    }

    #[test]
    fn identity_display_is_account_slash_subject() {
        let id = Identity::new(2, 777000);
        assert_eq!(id.to_string(), "2/777000");
    }

    #[test]
    fn status_serializes_type_field_only_when_available() {
        let status = BiometryStatus {
            available: false,
            kind: None,
            access_requested: true,
            access_granted: false,
            token_saved: false,
            device_id: "ab".into(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert!(json.get("type").is_none());
        assert_eq!(json["access_requested"], true);

        let status = BiometryStatus {
            available: true,
            kind: Some("unknown".into()),
            ..status
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["type"], "unknown");
        assert_eq!(json["device_id"], "ab");
    }

    #[test]
    fn error_messages_do_not_hide_the_kind() {
        let err = BiogateError::CorruptRecord {
            key: "42_iv".into(),
            reason: "odd length".into(),
        };
        assert!(err.to_string().contains("42_iv"));
        assert!(BiogateError::ChallengeInProgress.to_string().contains("outstanding"));
    }
}
