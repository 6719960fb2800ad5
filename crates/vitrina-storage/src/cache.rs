// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the CacheAdapter trait.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use vitrina_core::{AdapterType, CacheAdapter, HealthStatus, PluginAdapter, VitrinaError};

use crate::database::Database;
use crate::queries::kv;

/// Key-value cache stored in the `kv_cache` table of the catalog database.
///
/// Survives restarts, so sessions and pending markers outlive a redeploy.
pub struct SqliteCache {
    db: Arc<Database>,
}

impl SqliteCache {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Deletes expired rows. Returns how many were removed.
    pub async fn purge_expired(&self) -> Result<usize, VitrinaError> {
        kv::purge_expired(&self.db, kv::now_ms()).await
    }
}

fn expiry(now: i64, ttl: Duration) -> i64 {
    now.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
}

#[async_trait]
impl PluginAdapter for SqliteCache {
    fn name(&self) -> &str {
        "sqlite-cache"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Cache
    }

    async fn health_check(&self) -> Result<HealthStatus, VitrinaError> {
        kv::get(&self.db, "__health__", kv::now_ms()).await?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), VitrinaError> {
        let purged = self.purge_expired().await?;
        debug!(purged, "cache shutdown: expired rows purged");
        Ok(())
    }
}

#[async_trait]
impl CacheAdapter for SqliteCache {
    async fn get(&self, key: &str) -> Result<Option<String>, VitrinaError> {
        kv::get(&self.db, key, kv::now_ms()).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), VitrinaError> {
        kv::set(&self.db, key, value, expiry(kv::now_ms(), ttl)).await
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, VitrinaError> {
        let now = kv::now_ms();
        kv::set_nx(&self.db, key, value, now, expiry(now, ttl)).await
    }

    async fn delete(&self, key: &str) -> Result<bool, VitrinaError> {
        kv::delete(&self.db, key, kv::now_ms()).await
    }

    async fn exists(&self, key: &str) -> Result<bool, VitrinaError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, VitrinaError> {
        let now = kv::now_ms();
        // Sweeps call this periodically; piggyback expiry cleanup on it.
        kv::purge_expired(&self.db, now).await?;
        kv::keys(&self.db, prefix, now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn cache() -> SqliteCache {
        SqliteCache::new(Arc::new(Database::open_in_memory().await.unwrap()))
    }

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn set_get_delete() {
        let cache = cache().await;
        cache.set("session:549", "{}", MINUTE).await.unwrap();
        assert_eq!(cache.get("session:549").await.unwrap().as_deref(), Some("{}"));
        assert!(cache.exists("session:549").await.unwrap());
        assert!(cache.delete("session:549").await.unwrap());
        assert!(!cache.delete("session:549").await.unwrap());
        assert!(cache.get("session:549").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn zero_ttl_is_immediately_expired() {
        let cache = cache().await;
        cache.set("k", "v", Duration::ZERO).await.unwrap();
        assert!(cache.get("k").await.unwrap().is_none());
        assert!(!cache.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn set_nx_only_writes_once() {
        let cache = cache().await;
        assert!(cache.set_nx("lock:a", "1", MINUTE).await.unwrap());
        assert!(!cache.set_nx("lock:a", "2", MINUTE).await.unwrap());
        assert_eq!(cache.get("lock:a").await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn set_nx_replaces_expired_value() {
        let cache = cache().await;
        cache.set("lock:a", "stale", Duration::ZERO).await.unwrap();
        assert!(cache.set_nx("lock:a", "fresh", MINUTE).await.unwrap());
        assert_eq!(cache.get("lock:a").await.unwrap().as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn concurrent_set_nx_has_single_winner() {
        let cache = Arc::new(cache().await);
        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache.set_nx("lock:race", &i.to_string(), MINUTE).await.unwrap()
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn keys_lists_live_prefix_matches() {
        let cache = cache().await;
        cache.set("session:1", "a", MINUTE).await.unwrap();
        cache.set("session:2", "b", MINUTE).await.unwrap();
        cache.set("session:3", "c", Duration::ZERO).await.unwrap();
        cache.set("processed:x", "1", MINUTE).await.unwrap();
        let keys = cache.keys("session:").await.unwrap();
        assert_eq!(keys, vec!["session:1".to_string(), "session:2".to_string()]);
    }
}
