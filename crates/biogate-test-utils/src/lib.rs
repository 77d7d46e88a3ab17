// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for biogate integration tests.
//!
//! Provides mock collaborators and a harness wiring them into a
//! [`VaultService`](biogate_vault::VaultService) without touching the
//! platform keyring or a real biometric sensor.
//!
//! # Components
//!
//! - [`MockAuthenticator`] - Biometric prompt replaying scripted outcomes
//! - [`FlakyPreferences`] - Preference store wrapper that can fail writes on demand
//! - [`TestHarness`] - Assembled vault service with handles on every collaborator

pub mod flaky_prefs;
pub mod harness;
pub mod mock_authenticator;

pub use flaky_prefs::FlakyPreferences;
pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_authenticator::{MockAuthenticator, ScriptedOutcome};
