// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter traits for external collaborators.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod preferences;

pub use adapter::PluginAdapter;
pub use preferences::{PrefEdit, PrefOp, PreferenceStore};
