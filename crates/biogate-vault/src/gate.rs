// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication gate.
//!
//! Runs one challenge at a time against a [`BiometricAuthenticator`] and
//! turns its outcome into a [`Challenge`]. The authenticator reports through a
//! [`ChallengeResponder`], which is consumed by the terminal report, so every
//! challenge resolves exactly once. A responder dropped without a report
//! resolves the challenge as cancelled.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use biogate_core::{BiogateError, PluginAdapter};
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::cipher::{BoundCipher, UnboundCipher};
use crate::keystore::Authorization;

/// Whether the device can run a strong biometric challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Availability {
    /// Strong biometrics enrolled. `kind` is "fingerprint", "face", "iris" or
    /// "biometric" when the modality is unknown or mixed.
    Available { kind: String },
    Unavailable { reason: String },
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }

    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::Available { kind } => Some(kind),
            Self::Unavailable { .. } => None,
        }
    }
}

/// What the user is shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptInfo {
    pub title: String,
    pub description: String,
    pub negative_button: String,
    /// Only strong biometrics may satisfy the prompt. Always true for vault
    /// challenges; device credentials are not accepted.
    pub strong_biometric_only: bool,
    /// A cipher operation is waiting on this challenge.
    pub crypto_bound: bool,
}

impl PromptInfo {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        negative_button: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            negative_button: negative_button.into(),
            strong_biometric_only: true,
            crypto_bound: false,
        }
    }
}

/// Terminal outcome of a single challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Succeeded,
    Failed { code: i32, message: String },
    Cancelled,
}

/// Reporting handle given to the authenticator for one challenge.
///
/// Rejected attempts may be reported any number of times; the challenge stays
/// open. The first terminal report consumes the responder.
#[derive(Debug)]
pub struct ChallengeResponder {
    challenge_id: u64,
    tx: oneshot::Sender<AuthOutcome>,
}

impl ChallengeResponder {
    pub fn challenge_id(&self) -> u64 {
        self.challenge_id
    }

    /// A single attempt was not recognized. Non-terminal.
    pub fn attempt_rejected(&self) {
        debug!(challenge = self.challenge_id, "authentication attempt rejected");
    }

    pub fn succeed(self) {
        self.report(AuthOutcome::Succeeded);
    }

    pub fn fail(self, code: i32, message: impl Into<String>) {
        self.report(AuthOutcome::Failed {
            code,
            message: message.into(),
        });
    }

    pub fn cancel(self) {
        self.report(AuthOutcome::Cancelled);
    }

    fn report(self, outcome: AuthOutcome) {
        if self.tx.send(outcome).is_err() {
            debug!(
                challenge = self.challenge_id,
                "challenge outcome arrived after the caller went away"
            );
        }
    }
}

/// Platform biometric prompt.
#[async_trait]
pub trait BiometricAuthenticator: PluginAdapter {
    async fn availability(&self) -> Availability;

    /// Show the prompt. Must return promptly; the outcome is reported later,
    /// from any thread, through `responder`.
    fn authenticate(&self, prompt: PromptInfo, responder: ChallengeResponder);
}

/// Observable gate state.
///
/// A terminal state (`Succeeded`, `Failed`, `Cancelled`) stays visible after
/// the outcome is delivered and counts as idle: the next challenge may start
/// from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Idle,
    Challenging,
    Succeeded,
    Failed,
    Cancelled,
}

/// Result of a resolved challenge.
#[derive(Debug)]
pub enum Challenge {
    Granted {
        authorization: Authorization,
        cipher: Option<BoundCipher>,
    },
    Failed {
        code: i32,
        message: String,
    },
    Cancelled,
}

impl Challenge {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }
}

/// Serializes authentication challenges against one authenticator.
pub struct AuthenticationGate {
    authenticator: Arc<dyn BiometricAuthenticator>,
    state: Mutex<GateState>,
    next_id: AtomicU64,
}

impl AuthenticationGate {
    pub fn new(authenticator: Arc<dyn BiometricAuthenticator>) -> Self {
        Self {
            authenticator,
            state: Mutex::new(GateState::Idle),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn state(&self) -> GateState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub async fn availability(&self) -> Availability {
        self.authenticator.availability().await
    }

    pub fn authenticator(&self) -> &Arc<dyn BiometricAuthenticator> {
        &self.authenticator
    }

    /// Run one challenge, optionally releasing `cipher` on success.
    ///
    /// Fails with [`BiogateError::ChallengeInProgress`] while another
    /// challenge is outstanding. Dropping the returned future resolves the
    /// challenge as cancelled.
    pub async fn challenge(
        &self,
        mut prompt: PromptInfo,
        cipher: Option<UnboundCipher>,
    ) -> Result<Challenge, BiogateError> {
        self.begin()?;
        let mut guard = ChallengeGuard {
            gate: self,
            finished: false,
        };

        let challenge_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        prompt.crypto_bound = cipher.is_some();
        prompt.strong_biometric_only = true;
        debug!(
            challenge = challenge_id,
            authenticator = self.authenticator.name(),
            crypto_bound = prompt.crypto_bound,
            "starting authentication challenge"
        );

        let (tx, rx) = oneshot::channel();
        self.authenticator
            .authenticate(prompt, ChallengeResponder { challenge_id, tx });

        let outcome = match rx.await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    challenge = challenge_id,
                    "authenticator dropped the challenge without reporting"
                );
                AuthOutcome::Cancelled
            }
        };

        guard.finished = true;
        let result = match outcome {
            AuthOutcome::Succeeded => {
                self.finish(GateState::Succeeded);
                let authorization = Authorization::issue();
                info!(challenge = challenge_id, "authentication succeeded");
                Challenge::Granted {
                    authorization,
                    cipher: cipher.map(|c| c.bind(authorization)),
                }
            }
            AuthOutcome::Failed { code, message } => {
                self.finish(GateState::Failed);
                warn!(challenge = challenge_id, code, reason = %message, "authentication failed");
                Challenge::Failed { code, message }
            }
            AuthOutcome::Cancelled => {
                self.finish(GateState::Cancelled);
                warn!(challenge = challenge_id, "authentication cancelled by the user");
                Challenge::Cancelled
            }
        };
        Ok(result)
    }

    fn begin(&self) -> Result<(), BiogateError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == GateState::Challenging {
            return Err(BiogateError::ChallengeInProgress);
        }
        *state = GateState::Challenging;
        Ok(())
    }

    fn finish(&self, terminal: GateState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = terminal;
    }
}

impl std::fmt::Debug for AuthenticationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationGate")
            .field("authenticator", &self.authenticator.name())
            .field("state", &self.state())
            .finish()
    }
}

/// Marks the gate cancelled if the challenge future is dropped mid-flight.
struct ChallengeGuard<'a> {
    gate: &'a AuthenticationGate,
    finished: bool,
}

impl Drop for ChallengeGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.gate.finish(GateState::Cancelled);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use biogate_core::{AdapterType, HealthStatus, Identity};
    use tracing_test::traced_test;

    use super::*;
    use crate::cipher::UnboundCipher;
    use crate::keystore::{KeyPolicy, KeyVault, SecureKeyStore};
    use crate::memory_keystore::SoftwareKeyStore;

    /// Authenticator that hands responders to the test instead of resolving them.
    #[derive(Default)]
    struct ParkedAuthenticator {
        parked: std::sync::Mutex<Vec<ChallengeResponder>>,
        prompts: std::sync::Mutex<Vec<PromptInfo>>,
        immediate: Option<AuthOutcome>,
    }

    impl ParkedAuthenticator {
        fn resolving(outcome: AuthOutcome) -> Self {
            Self {
                immediate: Some(outcome),
                ..Self::default()
            }
        }

        async fn take(&self) -> ChallengeResponder {
            loop {
                if let Some(r) = self.parked.lock().unwrap().pop() {
                    return r;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
    }

    #[async_trait]
    impl PluginAdapter for ParkedAuthenticator {
        fn name(&self) -> &str {
            "parked"
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::Authenticator
        }
        async fn health_check(&self) -> Result<HealthStatus, BiogateError> {
            Ok(HealthStatus::Healthy)
        }
    }

    #[async_trait]
    impl BiometricAuthenticator for ParkedAuthenticator {
        async fn availability(&self) -> Availability {
            Availability::Available {
                kind: "fingerprint".into(),
            }
        }

        fn authenticate(&self, prompt: PromptInfo, responder: ChallengeResponder) {
            self.prompts.lock().unwrap().push(prompt);
            match self.immediate.clone() {
                Some(AuthOutcome::Succeeded) => responder.succeed(),
                Some(AuthOutcome::Failed { code, message }) => responder.fail(code, message),
                Some(AuthOutcome::Cancelled) => responder.cancel(),
                None => self.parked.lock().unwrap().push(responder),
            }
        }
    }

    fn prompt() -> PromptInfo {
        PromptInfo::new("biogate", "unlock bot token", "Back")
    }

    #[tokio::test]
    async fn success_grants_and_binds_cipher() {
        let auth = Arc::new(ParkedAuthenticator::resolving(AuthOutcome::Succeeded));
        let gate = AuthenticationGate::new(auth.clone());
        let store: Arc<dyn SecureKeyStore> = Arc::new(SoftwareKeyStore::new());
        let key = KeyVault::new(store.clone(), "9bot_", KeyPolicy::default())
            .get_or_create_key(Identity::new(0, 1))
            .unwrap();

        let result = gate
            .challenge(prompt(), Some(UnboundCipher::encrypt(store, key)))
            .await
            .unwrap();

        match result {
            Challenge::Granted {
                cipher: Some(cipher),
                ..
            } => assert!(cipher.encrypt(b"token").is_ok()),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(gate.state(), GateState::Succeeded);
        let prompts = auth.prompts.lock().unwrap();
        assert!(prompts[0].crypto_bound);
        assert!(prompts[0].strong_biometric_only);
    }

    #[tokio::test]
    async fn failure_carries_code_and_message() {
        let auth = Arc::new(ParkedAuthenticator::resolving(AuthOutcome::Failed {
            code: 7,
            message: "lockout".into(),
        }));
        let gate = AuthenticationGate::new(auth);
        let result = gate.challenge(prompt(), None).await.unwrap();
        assert!(matches!(result, Challenge::Failed { code: 7, .. }));
        assert_eq!(gate.state(), GateState::Failed);
    }

    #[tokio::test]
    #[traced_test]
    async fn failed_and_cancelled_outcomes_log_as_warnings() {
        let failing = AuthenticationGate::new(Arc::new(ParkedAuthenticator::resolving(
            AuthOutcome::Failed {
                code: 5,
                message: "sensor unavailable".into(),
            },
        )));
        failing.challenge(prompt(), None).await.unwrap();
        let cancelling = AuthenticationGate::new(Arc::new(ParkedAuthenticator::resolving(
            AuthOutcome::Cancelled,
        )));
        cancelling.challenge(prompt(), None).await.unwrap();

        logs_assert(|lines: &[&str]| {
            let warned = |needle: &str| {
                lines
                    .iter()
                    .any(|line| line.contains("WARN") && line.contains(needle))
            };
            match (
                warned("authentication failed"),
                warned("authentication cancelled"),
            ) {
                (true, true) => Ok(()),
                seen => Err(format!("missing warnings (failed, cancelled): {seen:?}")),
            }
        });
        assert!(logs_contain("sensor unavailable"));
    }

    #[tokio::test]
    async fn terminal_state_accepts_the_next_challenge() {
        let auth = Arc::new(ParkedAuthenticator::default());
        let gate = Arc::new(AuthenticationGate::new(auth.clone()));
        assert_eq!(gate.state(), GateState::Idle);

        for expected in [GateState::Cancelled, GateState::Succeeded] {
            let pending = {
                let gate = gate.clone();
                tokio::spawn(async move { gate.challenge(prompt(), None).await })
            };
            let responder = auth.take().await;
            match expected {
                GateState::Cancelled => responder.cancel(),
                _ => responder.succeed(),
            }
            pending.await.unwrap().unwrap();
            assert_eq!(gate.state(), expected);
        }
    }

    #[tokio::test]
    async fn second_challenge_while_outstanding_is_rejected() {
        let auth = Arc::new(ParkedAuthenticator::default());
        let gate = Arc::new(AuthenticationGate::new(auth.clone()));

        let first = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.challenge(prompt(), None).await })
        };
        let responder = auth.take().await;
        assert_eq!(gate.state(), GateState::Challenging);

        let err = gate.challenge(prompt(), None).await.unwrap_err();
        assert!(matches!(err, BiogateError::ChallengeInProgress));

        responder.attempt_rejected();
        responder.attempt_rejected();
        assert_eq!(gate.state(), GateState::Challenging);
        responder.succeed();

        assert!(first.await.unwrap().unwrap().is_granted());
        assert_eq!(gate.state(), GateState::Succeeded);
    }

    #[tokio::test]
    async fn dropped_responder_resolves_as_cancelled() {
        let auth = Arc::new(ParkedAuthenticator::default());
        let gate = Arc::new(AuthenticationGate::new(auth.clone()));
        let pending = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.challenge(prompt(), None).await })
        };
        drop(auth.take().await);
        let result = pending.await.unwrap().unwrap();
        assert!(matches!(result, Challenge::Cancelled));
        assert_eq!(gate.state(), GateState::Cancelled);
    }

    #[tokio::test]
    async fn abandoned_future_frees_the_gate() {
        let auth = Arc::new(ParkedAuthenticator::default());
        let gate = Arc::new(AuthenticationGate::new(auth.clone()));
        let pending = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.challenge(prompt(), None).await })
        };
        let responder = auth.take().await;
        pending.abort();
        let _ = pending.await;
        assert_eq!(gate.state(), GateState::Cancelled);

        // A late report after the caller left is ignored.
        responder.succeed();
        assert_eq!(gate.state(), GateState::Cancelled);
    }

    #[test]
    fn availability_accessors() {
        let available = Availability::Available {
            kind: "face".into(),
        };
        assert!(available.is_available());
        assert_eq!(available.kind(), Some("face"));
        let unavailable = Availability::Unavailable {
            reason: "none enrolled".into(),
        };
        assert_eq!(unavailable.kind(), None);
    }
}
