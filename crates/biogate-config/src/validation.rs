// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use argon2::password_hash::PasswordHash;

use crate::diagnostic::ConfigError;
use crate::model::BiogateConfig;

/// Longest validity window a key may be configured with.
const MAX_AUTH_VALIDITY_SECS: u64 = 3600;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration. Collects every failure instead of
/// stopping at the first.
pub fn validate_config(config: &BiogateConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.general.log_level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "general.log_level must be one of {}, got `{}`",
                LOG_LEVELS.join(", "),
                config.general.log_level
            ),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.vault.key_alias_prefix.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "vault.key_alias_prefix must not be empty".to_string(),
        });
    }

    if config.vault.auth_validity_secs > MAX_AUTH_VALIDITY_SECS {
        errors.push(ConfigError::Validation {
            message: format!(
                "vault.auth_validity_secs must be at most {MAX_AUTH_VALIDITY_SECS}, got {}",
                config.vault.auth_validity_secs
            ),
        });
    }

    if config.vault.skip_prompt_when_fresh && config.vault.auth_validity_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "vault.skip_prompt_when_fresh needs a non-zero vault.auth_validity_secs"
                .to_string(),
        });
    }

    if config.auth.max_attempts < 1 {
        errors.push(ConfigError::Validation {
            message: "auth.max_attempts must be at least 1".to_string(),
        });
    }

    if let Some(hash) = config.auth.pin_hash.as_deref()
        && !hash.is_empty()
        && let Err(e) = PasswordHash::new(hash)
    {
        errors.push(ConfigError::Validation {
            message: format!("auth.pin_hash is not a valid PHC string: {e}"),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(errors: &[ConfigError]) -> Vec<String> {
        errors.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&BiogateConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_failure() {
        let mut config = BiogateConfig::default();
        config.storage.database_path = "  ".into();
        config.vault.key_alias_prefix = String::new();
        config.auth.max_attempts = 0;

        let errors = validate_config(&config).unwrap_err();
        let msgs = messages(&errors);
        assert_eq!(errors.len(), 3, "{msgs:?}");
        assert!(msgs.iter().any(|m| m.contains("database_path")));
        assert!(msgs.iter().any(|m| m.contains("key_alias_prefix")));
        assert!(msgs.iter().any(|m| m.contains("max_attempts")));
    }

    #[test]
    fn rejects_long_validity_window() {
        let mut config = BiogateConfig::default();
        config.vault.auth_validity_secs = 86_400;
        let errors = validate_config(&config).unwrap_err();
        assert!(messages(&errors)[0].contains("auth_validity_secs"));
    }

    #[test]
    fn skip_prompt_needs_a_window() {
        let mut config = BiogateConfig::default();
        config.vault.skip_prompt_when_fresh = true;
        config.vault.auth_validity_secs = 0;
        assert!(validate_config(&config).is_err());

        config.vault.auth_validity_secs = 30;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_pin_hash_means_unset() {
        let mut config = BiogateConfig::default();
        config.auth.pin_hash = Some(String::new());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_garbage_pin_hash() {
        let mut config = BiogateConfig::default();
        config.auth.pin_hash = Some("not-a-hash".into());
        let errors = validate_config(&config).unwrap_err();
        assert!(messages(&errors)[0].contains("pin_hash"));
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut config = BiogateConfig::default();
        config.general.log_level = "verbose".into();
        assert!(validate_config(&config).is_err());
    }
}
