// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./biogate.toml` > `~/.config/biogate/biogate.toml` > `/etc/biogate/biogate.toml`
//! with environment variable overrides via the `BIOGATE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::BiogateConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/biogate/biogate.toml`
/// 3. `~/.config/biogate/biogate.toml`
/// 4. `./biogate.toml`
/// 5. `BIOGATE_*` environment variables
pub fn load_config() -> Result<BiogateConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<BiogateConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BiogateConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<BiogateConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BiogateConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for XDG config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(BiogateConfig::default()))
        .merge(Toml::file("/etc/biogate/biogate.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("biogate/biogate.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("biogate.toml"))
        .merge(env_provider())
}

/// Environment provider with explicit section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` so that underscore-containing
/// keys survive: `BIOGATE_VAULT_KEY_ALIAS_PREFIX` maps to `vault.key_alias_prefix`.
/// `BIOGATE_AUTH_PIN` is read by the console authenticator and ignored here.
fn env_provider() -> Env {
    Env::prefixed("BIOGATE_")
        .ignore(&["auth_pin"])
        .map(|key| {
            let key_str = key.as_str();
            let mapped = key_str
                .replacen("general_", "general.", 1)
                .replacen("storage_", "storage.", 1)
                .replacen("vault_", "vault.", 1)
                .replacen("auth_", "auth.", 1);
            mapped.into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KeyStoreBackend;

    #[test]
    fn env_overrides_map_underscored_keys() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("BIOGATE_VAULT_KEY_ALIAS_PREFIX", "xbot_");
            jail.set_env("BIOGATE_VAULT_KEYSTORE", "memory");
            jail.set_env("BIOGATE_AUTH_MAX_ATTEMPTS", "5");
            jail.create_file("biogate.toml", "[general]\nlog_level = \"debug\"\n")?;

            let config = load_config_from_path(Path::new("biogate.toml"))?;
            assert_eq!(config.vault.key_alias_prefix, "xbot_");
            assert_eq!(config.vault.keystore, KeyStoreBackend::Memory);
            assert_eq!(config.auth.max_attempts, 5);
            assert_eq!(config.general.log_level, "debug");
            Ok(())
        });
    }

    #[test]
    fn auth_pin_env_is_not_treated_as_config() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("BIOGATE_AUTH_PIN", "1234");
            jail.create_file("biogate.toml", "")?;

            let config = load_config_from_path(Path::new("biogate.toml"))?;
            assert!(config.auth.pin_hash.is_none());
            Ok(())
        });
    }
}
