// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock biometric authenticator for deterministic testing.
//!
//! `MockAuthenticator` implements `BiometricAuthenticator` by replaying a
//! FIFO queue of scripted outcomes. Outcomes are reported from a spawned task,
//! the way a platform prompt reports from its own thread. When the queue is
//! empty every challenge succeeds.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use biogate_core::{AdapterType, BiogateError, HealthStatus, PluginAdapter};
use biogate_vault::{Availability, BiometricAuthenticator, ChallengeResponder, PromptInfo};

/// What the mock does with the next challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedOutcome {
    Succeed,
    Fail { code: i32, message: String },
    Cancel,
    /// Drop the responder without reporting.
    Drop,
    /// Reject `n` attempts, then succeed.
    RejectThenSucceed(usize),
    /// Keep the responder until [`MockAuthenticator::release`] is called.
    Hold,
}

impl ScriptedOutcome {
    pub fn fail(code: i32, message: impl Into<String>) -> Self {
        Self::Fail {
            code,
            message: message.into(),
        }
    }
}

/// A biometric prompt that answers from a script.
pub struct MockAuthenticator {
    script: Mutex<VecDeque<ScriptedOutcome>>,
    availability: Mutex<Availability>,
    prompts: Mutex<Vec<PromptInfo>>,
    held: Mutex<Vec<ChallengeResponder>>,
    challenges: AtomicUsize,
}

impl MockAuthenticator {
    /// Create a mock with an empty script and fingerprint hardware.
    pub fn new() -> Self {
        Self::with_outcomes(Vec::new())
    }

    /// Create a mock pre-loaded with the given outcomes.
    pub fn with_outcomes(outcomes: Vec<ScriptedOutcome>) -> Self {
        Self {
            script: Mutex::new(VecDeque::from(outcomes)),
            availability: Mutex::new(Availability::Available {
                kind: "fingerprint".to_string(),
            }),
            prompts: Mutex::new(Vec::new()),
            held: Mutex::new(Vec::new()),
            challenges: AtomicUsize::new(0),
        }
    }

    /// Append an outcome to the script.
    pub fn push(&self, outcome: ScriptedOutcome) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(outcome);
    }

    pub fn set_availability(&self, availability: Availability) {
        *self.availability.lock().unwrap_or_else(|e| e.into_inner()) = availability;
    }

    /// Number of challenges started so far.
    pub fn challenge_count(&self) -> usize {
        self.challenges.load(Ordering::SeqCst)
    }

    /// Every prompt shown so far, oldest first.
    pub fn prompts(&self) -> Vec<PromptInfo> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of challenges parked by [`ScriptedOutcome::Hold`].
    pub fn held_count(&self) -> usize {
        self.held.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Resolve the oldest held challenge with `outcome`.
    ///
    /// Returns false when nothing is held.
    pub fn release(&self, outcome: ScriptedOutcome) -> bool {
        let responder = {
            let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
            if held.is_empty() {
                return false;
            }
            held.remove(0)
        };
        respond(responder, outcome);
        true
    }

    fn next_outcome(&self) -> ScriptedOutcome {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(ScriptedOutcome::Succeed)
    }
}

impl Default for MockAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

fn respond(responder: ChallengeResponder, outcome: ScriptedOutcome) {
    match outcome {
        ScriptedOutcome::Succeed => responder.succeed(),
        ScriptedOutcome::Fail { code, message } => responder.fail(code, message),
        ScriptedOutcome::Cancel => responder.cancel(),
        ScriptedOutcome::Drop => drop(responder),
        ScriptedOutcome::RejectThenSucceed(n) => {
            for _ in 0..n {
                responder.attempt_rejected();
            }
            responder.succeed();
        }
        ScriptedOutcome::Hold => drop(responder),
    }
}

#[async_trait]
impl PluginAdapter for MockAuthenticator {
    fn name(&self) -> &str {
        "mock-authenticator"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Authenticator
    }

    async fn health_check(&self) -> Result<HealthStatus, BiogateError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl BiometricAuthenticator for MockAuthenticator {
    async fn availability(&self) -> Availability {
        self.availability
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn authenticate(&self, prompt: PromptInfo, responder: ChallengeResponder) {
        self.challenges.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt);

        match self.next_outcome() {
            ScriptedOutcome::Hold => self
                .held
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(responder),
            outcome => {
                tokio::spawn(async move { respond(responder, outcome) });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_script_defaults_to_success() {
        let mock = MockAuthenticator::new();
        assert_eq!(mock.next_outcome(), ScriptedOutcome::Succeed);
    }

    #[test]
    fn script_is_fifo() {
        let mock = MockAuthenticator::with_outcomes(vec![
            ScriptedOutcome::Cancel,
            ScriptedOutcome::fail(5, "sensor"),
        ]);
        assert_eq!(mock.next_outcome(), ScriptedOutcome::Cancel);
        assert_eq!(mock.next_outcome(), ScriptedOutcome::fail(5, "sensor"));
        assert_eq!(mock.next_outcome(), ScriptedOutcome::Succeed);
    }

    #[test]
    fn release_without_held_challenge_is_false() {
        assert!(!MockAuthenticator::new().release(ScriptedOutcome::Succeed));
    }

    #[tokio::test]
    async fn availability_is_configurable() {
        let mock = MockAuthenticator::new();
        assert_eq!(mock.availability().await.kind(), Some("fingerprint"));
        mock.set_availability(Availability::Unavailable {
            reason: "no sensor".into(),
        });
        assert!(!mock.availability().await.is_available());
    }
}
