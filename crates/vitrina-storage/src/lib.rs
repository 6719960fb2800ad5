// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence layer for the Vitrina commerce agent.
//!
//! Provides a WAL-mode SQLite catalog repository with embedded migrations,
//! plus two implementations of the key-value cache used for sessions,
//! markers, album buffers and locks: a SQLite-backed one sharing the catalog
//! database and an in-process one for single-node or test deployments.

pub mod cache;
pub mod catalog;
pub mod database;
pub mod memory;
pub mod migrations;
pub mod queries;

pub use cache::SqliteCache;
pub use catalog::SqliteCatalog;
pub use database::Database;
pub use memory::MemoryCache;
