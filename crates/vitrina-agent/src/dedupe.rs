// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! At-most-once processing of inbound message ids.

use std::sync::Arc;
use std::time::Duration;

use vitrina_core::{CacheAdapter, MessageId, VitrinaError};

fn processed_key(id: &MessageId) -> String {
    format!("processed:{id}")
}

/// Short-lived markers keyed by provider message id.
pub struct IdempotencyGuard {
    cache: Arc<dyn CacheAdapter>,
    ttl: Duration,
}

impl IdempotencyGuard {
    pub fn new(cache: Arc<dyn CacheAdapter>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    pub async fn already_processed(&self, id: &MessageId) -> Result<bool, VitrinaError> {
        self.cache.exists(&processed_key(id)).await
    }

    pub async fn mark_processed(&self, id: &MessageId) -> Result<(), VitrinaError> {
        self.cache.set(&processed_key(id), "1", self.ttl).await
    }

    /// Atomic check-and-mark. Returns true for the first delivery of `id` only.
    pub async fn try_claim(&self, id: &MessageId) -> Result<bool, VitrinaError> {
        self.cache.set_nx(&processed_key(id), "1", self.ttl).await
    }
}
