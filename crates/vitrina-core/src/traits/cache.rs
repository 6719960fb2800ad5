// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key-value cache trait backing sessions, markers, album buffers and locks.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::VitrinaError;
use crate::traits::adapter::PluginAdapter;

/// Shared key-value store with per-key expiry.
///
/// Expired keys behave exactly like absent keys for every operation.
#[async_trait]
pub trait CacheAdapter: PluginAdapter {
    /// Returns the value stored under `key`, if present and not expired.
    async fn get(&self, key: &str) -> Result<Option<String>, VitrinaError>;

    /// Stores `value` under `key`, replacing any previous value and resetting its TTL.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), VitrinaError>;

    /// Stores `value` only if `key` is absent. Returns true when the value was written.
    ///
    /// Must be atomic with respect to concurrent callers.
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, VitrinaError>;

    /// Removes `key`. Returns true when a live value was removed.
    async fn delete(&self, key: &str) -> Result<bool, VitrinaError>;

    /// Returns true when `key` holds a live value.
    async fn exists(&self, key: &str) -> Result<bool, VitrinaError>;

    /// Lists live keys starting with `prefix`.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, VitrinaError>;
}
