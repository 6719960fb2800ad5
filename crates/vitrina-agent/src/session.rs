// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-phone conversation sessions stored in the key-value cache.
//!
//! Every save refreshes the TTL, so an abandoned conversation disappears on
//! its own even if the timeout sweep never reaches it. Concurrent
//! read-modify-write for the same phone is not serialized.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};
use vitrina_core::types::SESSION_SCHEMA_VERSION;
use vitrina_core::{CacheAdapter, ConversationSession, SessionState, VitrinaError};

/// Key prefix shared by every stored session.
pub const SESSION_PREFIX: &str = "session:";

pub fn session_key(phone: &str) -> String {
    format!("{SESSION_PREFIX}{phone}")
}

/// Marker set by the timeout sweep after the inactivity warning.
pub fn warned_key(phone: &str) -> String {
    format!("timeout:warned:{phone}")
}

/// CRUD over [`ConversationSession`] records.
pub struct SessionStore {
    cache: Arc<dyn CacheAdapter>,
    ttl: Duration,
    default_admin_id: String,
}

impl SessionStore {
    pub fn new(cache: Arc<dyn CacheAdapter>, ttl: Duration, default_admin_id: impl Into<String>) -> Self {
        Self {
            cache,
            ttl,
            default_admin_id: default_admin_id.into(),
        }
    }

    pub fn cache(&self) -> &Arc<dyn CacheAdapter> {
        &self.cache
    }

    /// Loads the session for `phone`, back-filling fields from older schemas.
    ///
    /// A record that no longer deserializes is discarded and reported as absent.
    pub async fn get(&self, phone: &str) -> Result<Option<ConversationSession>, VitrinaError> {
        let key = session_key(phone);
        let Some(raw) = self.cache.get(&key).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<ConversationSession>(&raw) {
            Ok(mut session) => {
                if self.ensure_fields(&mut session) {
                    debug!(phone, "session upgraded from older schema");
                }
                Ok(Some(session))
            }
            Err(e) => {
                warn!(error = %e, "discarding unreadable session");
                self.cache.delete(&key).await?;
                Ok(None)
            }
        }
    }

    /// Writes the session and restarts its TTL window.
    pub async fn save(&self, session: &ConversationSession) -> Result<(), VitrinaError> {
        let raw = serde_json::to_string(session)?;
        self.cache.set(&session_key(&session.phone), &raw, self.ttl).await
    }

    /// Removes the session together with its timeout marker.
    pub async fn delete(&self, phone: &str) -> Result<bool, VitrinaError> {
        let existed = self.cache.delete(&session_key(phone)).await?;
        self.cache.delete(&warned_key(phone)).await?;
        Ok(existed)
    }

    /// A fresh `idle` session. Not persisted until [`save`](Self::save).
    pub fn create_new(&self, admin_id: Option<&str>, phone: &str) -> ConversationSession {
        let admin_id = admin_id.unwrap_or(&self.default_admin_id);
        ConversationSession::new(admin_id, phone, Utc::now())
    }

    /// Loads the session or creates a fresh one. The flag is true when created.
    pub async fn get_or_create(&self, phone: &str) -> Result<(ConversationSession, bool), VitrinaError> {
        match self.get(phone).await? {
            Some(session) => Ok((session, false)),
            None => Ok((self.create_new(None, phone), true)),
        }
    }

    /// Normalizes a session read from storage. Returns true if anything changed.
    ///
    /// Sessions written before `schema_version` existed have it at 0 and may
    /// lack an owner; transient fields that contradict the state are dropped.
    pub fn ensure_fields(&self, session: &mut ConversationSession) -> bool {
        let mut changed = false;
        if session.admin_id.is_empty() {
            session.admin_id = self.default_admin_id.clone();
            changed = true;
        }
        if session.state != SessionState::Editing && session.selected_product_id.is_some() {
            session.selected_product_id = None;
            changed = true;
        }
        if !matches!(session.state, SessionState::Searching | SessionState::Selecting)
            && !session.search_results.is_empty()
        {
            session.search_results.clear();
            changed = true;
        }
        if session.schema_version < SESSION_SCHEMA_VERSION {
            session.schema_version = SESSION_SCHEMA_VERSION;
            changed = true;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrina_core::SearchResult;
    use vitrina_storage::MemoryCache;

    fn store() -> SessionStore {
        SessionStore::new(Arc::new(MemoryCache::new()), Duration::from_secs(1800), "tienda")
    }

    #[tokio::test]
    async fn save_then_get_round_trips() {
        let store = store();
        let mut session = store.create_new(None, "549111");
        session.state = SessionState::Collecting;
        session.product_data.images.push("https://cdn.example.com/a.jpg".into());
        store.save(&session).await.unwrap();

        let loaded = store.get("549111").await.unwrap().unwrap();
        assert_eq!(loaded, session);
        assert_eq!(loaded.admin_id, "tienda");
    }

    #[tokio::test]
    async fn delete_cascades_to_warning_marker() {
        let store = store();
        let session = store.create_new(None, "549111");
        store.save(&session).await.unwrap();
        store
            .cache()
            .set(&warned_key("549111"), "x", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(store.delete("549111").await.unwrap());
        assert!(store.get("549111").await.unwrap().is_none());
        assert!(!store.cache().exists(&warned_key("549111")).await.unwrap());
    }

    #[tokio::test]
    async fn legacy_record_is_back_filled() {
        let store = store();
        let legacy = r#"{"phone": "549111", "state": "idle", "selected_product_id": 4,
            "search_results": [{"id": 4, "title": "Gorra", "price": 10.0, "stock": 1, "state": "active"}]}"#;
        store
            .cache()
            .set(&session_key("549111"), legacy, Duration::from_secs(60))
            .await
            .unwrap();

        let session = store.get("549111").await.unwrap().unwrap();
        assert_eq!(session.schema_version, SESSION_SCHEMA_VERSION);
        assert_eq!(session.admin_id, "tienda");
        assert!(session.selected_product_id.is_none());
        assert!(session.search_results.is_empty());
        assert!(session.message_history.is_empty());
    }

    #[tokio::test]
    async fn selecting_keeps_results() {
        let store = store();
        let mut session = store.create_new(None, "549111");
        session.state = SessionState::Selecting;
        session.search_results.push(SearchResult {
            id: 1,
            title: "Cartera".into(),
            price: 100.0,
            stock: 2,
            state: Default::default(),
        });
        assert!(!store.ensure_fields(&mut session));
        assert_eq!(session.search_results.len(), 1);
    }

    #[tokio::test]
    async fn corrupt_record_is_discarded() {
        let store = store();
        store
            .cache()
            .set(&session_key("549111"), "not json", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(store.get("549111").await.unwrap().is_none());
        let (session, created) = store.get_or_create("549111").await.unwrap();
        assert!(created);
        assert_eq!(session.state, SessionState::Idle);
    }
}
