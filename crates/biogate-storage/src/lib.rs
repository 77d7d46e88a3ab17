// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Preference persistence for the biogate credential vault.
//!
//! Provides a WAL-mode SQLite [`PreferenceStore`](biogate_core::PreferenceStore)
//! with embedded migrations and a single-writer concurrency model via
//! `tokio-rusqlite`, plus an in-memory store for ephemeral use.

pub mod database;
pub mod memory;
pub mod migrations;
pub mod sqlite;

pub use database::Database;
pub use memory::MemoryPreferences;
pub use sqlite::SqlitePreferences;
