// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Vitrina integration tests.
//!
//! Provides mock collaborators and a test harness for fast, deterministic
//! tests without a WhatsApp bridge, a model provider or a database.
//!
//! # Components
//!
//! - [`MockInference`] - scripted classifier replies with failure injection
//! - [`MockMessenger`] - captures outbound messages, fake media decryption
//! - [`MemoryCatalog`] - in-memory product and category repository
//! - [`MockEnricher`] - canned listing generation
//! - [`TestHarness`] - the whole pipeline wired over the mocks

pub mod harness;
pub mod memory_catalog;
pub mod mock_enricher;
pub mod mock_inference;
pub mod mock_messenger;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use harness::{TEST_ADMIN, TEST_PHONE, TestHarness};
pub use memory_catalog::MemoryCatalog;
pub use mock_enricher::MockEnricher;
pub use mock_inference::MockInference;
pub use mock_messenger::{MockMessenger, SentMessage};

/// Locks a mock's state, ignoring poisoning from a panicked test thread.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
