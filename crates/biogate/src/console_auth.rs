// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Console authenticator: a PIN prompt standing in for the biometric sensor.
//!
//! The PIN is checked against the Argon2id hash in `auth.pin_hash`. It is read
//! from `BIOGATE_AUTH_PIN` (headless use) or from the terminal via
//! `rpassword`. Without a configured hash the authenticator reports itself
//! unavailable and fails every challenge.

use std::io::IsTerminal;
use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use biogate_config::model::AuthConfig;
use biogate_core::{AdapterType, BiogateError, HealthStatus, PluginAdapter};
use biogate_vault::{Availability, BiometricAuthenticator, ChallengeResponder, PromptInfo};
use ring::rand::{SecureRandom, SystemRandom};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

/// Environment variable holding the PIN for non-interactive runs.
pub const AUTH_PIN_ENV_VAR: &str = "BIOGATE_AUTH_PIN";

/// The authenticator cannot run a challenge at all.
pub const ERROR_HW_UNAVAILABLE: i32 = 1;
/// Too many rejected attempts.
pub const ERROR_LOCKOUT: i32 = 7;

/// Where PIN entries come from.
pub trait PinSource: Send + Sync + 'static {
    /// Read the PIN for `attempt` (1-based). `Ok(None)` means the user dismissed the prompt.
    fn read_pin(
        &self,
        prompt: &PromptInfo,
        attempt: u32,
    ) -> Result<Option<SecretString>, BiogateError>;
}

/// `BIOGATE_AUTH_PIN` first, then the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalPin;

impl PinSource for TerminalPin {
    fn read_pin(
        &self,
        prompt: &PromptInfo,
        attempt: u32,
    ) -> Result<Option<SecretString>, BiogateError> {
        if let Ok(pin) = std::env::var(AUTH_PIN_ENV_VAR)
            && !pin.is_empty()
        {
            if attempt > 1 {
                return Err(BiogateError::ChallengeFailed(format!(
                    "PIN from {AUTH_PIN_ENV_VAR} was rejected"
                )));
            }
            return Ok(Some(SecretString::from(pin)));
        }

        if std::io::stdin().is_terminal() {
            if attempt == 1 {
                eprintln!("{}", prompt.title);
                if !prompt.description.is_empty() {
                    eprintln!("{}", prompt.description);
                }
            }
            eprint!("PIN (empty for {}): ", prompt.negative_button);
            let pin = rpassword::read_password()
                .map_err(|e| BiogateError::ChallengeFailed(format!("failed to read PIN: {e}")))?;
            if pin.is_empty() {
                return Ok(None);
            }
            return Ok(Some(SecretString::from(pin)));
        }

        Err(BiogateError::ChallengeFailed(format!(
            "No PIN provided. Set {AUTH_PIN_ENV_VAR} or run interactively."
        )))
    }
}

/// Hash a PIN for `auth.pin_hash`.
pub fn hash_pin(pin: &SecretString) -> Result<String, BiogateError> {
    let mut salt = [0u8; 16];
    SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| BiogateError::Crypto("system RNG failure".to_string()))?;
    let salt = SaltString::encode_b64(&salt)
        .map_err(|e| BiogateError::Crypto(format!("invalid salt: {e}")))?;
    let hash = Argon2::default()
        .hash_password(pin.expose_secret().as_bytes(), &salt)
        .map_err(|e| BiogateError::Crypto(format!("Argon2id hashing failed: {e}")))?;
    Ok(hash.to_string())
}

/// Check a PIN against a PHC hash string.
pub fn verify_pin(pin_hash: &str, pin: &SecretString) -> Result<bool, BiogateError> {
    let parsed = PasswordHash::new(pin_hash)
        .map_err(|e| BiogateError::Config(format!("auth.pin_hash is not a PHC string: {e}")))?;
    Ok(Argon2::default()
        .verify_password(pin.expose_secret().as_bytes(), &parsed)
        .is_ok())
}

/// [`BiometricAuthenticator`] backed by a PIN prompt.
pub struct ConsoleAuthenticator {
    pin_hash: Option<String>,
    max_attempts: u32,
    source: Arc<dyn PinSource>,
}

impl ConsoleAuthenticator {
    pub fn new(pin_hash: Option<String>, max_attempts: u32, source: Arc<dyn PinSource>) -> Self {
        Self {
            pin_hash: pin_hash.filter(|h| !h.is_empty()),
            max_attempts: max_attempts.max(1),
            source,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.pin_hash.clone(),
            config.max_attempts,
            Arc::new(TerminalPin),
        )
    }
}

fn run_challenge(
    pin_hash: &str,
    max_attempts: u32,
    source: &dyn PinSource,
    prompt: &PromptInfo,
    responder: ChallengeResponder,
) {
    for attempt in 1..=max_attempts {
        let pin = match source.read_pin(prompt, attempt) {
            Ok(Some(pin)) => pin,
            Ok(None) => return responder.cancel(),
            Err(e) => return responder.fail(ERROR_HW_UNAVAILABLE, e.to_string()),
        };
        match verify_pin(pin_hash, &pin) {
            Ok(true) => return responder.succeed(),
            Ok(false) => responder.attempt_rejected(),
            Err(e) => return responder.fail(ERROR_HW_UNAVAILABLE, e.to_string()),
        }
    }
    responder.fail(ERROR_LOCKOUT, "too many failed attempts");
}

#[async_trait]
impl PluginAdapter for ConsoleAuthenticator {
    fn name(&self) -> &str {
        "console-pin"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Authenticator
    }

    async fn health_check(&self) -> Result<HealthStatus, BiogateError> {
        Ok(match &self.pin_hash {
            Some(_) => HealthStatus::Healthy,
            None => HealthStatus::Degraded("auth.pin_hash is not set".to_string()),
        })
    }
}

#[async_trait]
impl BiometricAuthenticator for ConsoleAuthenticator {
    async fn availability(&self) -> Availability {
        match &self.pin_hash {
            Some(_) => Availability::Available {
                kind: "pin".to_string(),
            },
            None => Availability::Unavailable {
                reason: "no PIN configured".to_string(),
            },
        }
    }

    fn authenticate(&self, prompt: PromptInfo, responder: ChallengeResponder) {
        let Some(pin_hash) = self.pin_hash.clone() else {
            responder.fail(ERROR_HW_UNAVAILABLE, "no PIN configured (auth.pin_hash)");
            return;
        };
        debug!(challenge = responder.challenge_id(), "console PIN challenge");
        let max_attempts = self.max_attempts;
        let source = self.source.clone();
        tokio::task::spawn_blocking(move || {
            run_challenge(&pin_hash, max_attempts, source.as_ref(), &prompt, responder)
        });
    }
}
