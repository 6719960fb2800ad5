// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end conversation tests.
//!
//! `TestHarness` assembles the full pipeline over mock collaborators and an
//! in-memory cache. [`TestHarness::deliver`] runs a message through the same
//! routing as the agent loop, but inline, so tests can assert right after.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, mpsc};

use vitrina_agent::{
    Adapters, AlbumAggregator, AlbumSettings, ConversationPipeline, IdempotencyGuard, Route,
    SessionStore, TimeoutWorker,
};
use vitrina_config::VitrinaConfig;
use vitrina_core::types::{
    ConversationSession, InboundMessage, MediaAttachment, MessageContent, MessageId,
};
use vitrina_core::VitrinaError;
use vitrina_storage::MemoryCache;

use crate::memory_catalog::MemoryCatalog;
use crate::mock_enricher::MockEnricher;
use crate::mock_inference::MockInference;
use crate::mock_messenger::MockMessenger;

/// Phone number every message builder uses.
pub const TEST_PHONE: &str = "5491122334455";

/// Store owner assigned to harness sessions.
pub const TEST_ADMIN: &str = "tienda-test";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    replies: Vec<String>,
    categories: Vec<String>,
    config: VitrinaConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = VitrinaConfig::default();
        config.agent.default_admin_id = TEST_ADMIN.to_string();
        Self {
            replies: Vec::new(),
            categories: vec!["Accesorios".into(), "Calzado".into(), "Hogar".into()],
            config,
        }
    }

    /// Raw model replies, consumed in order.
    pub fn with_replies<S: Into<String>>(mut self, replies: impl IntoIterator<Item = S>) -> Self {
        self.replies = replies.into_iter().map(Into::into).collect();
        self
    }

    /// Categories seeded into the catalog.
    pub fn with_categories(mut self, titles: &[&str]) -> Self {
        self.categories = titles.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Adjusts the configuration before anything is wired.
    pub fn with_config(mut self, adjust: impl FnOnce(&mut VitrinaConfig)) -> Self {
        adjust(&mut self.config);
        self
    }

    pub fn build(self) -> TestHarness {
        let config = self.config;
        let cache = Arc::new(MemoryCache::new());
        let titles: Vec<&str> = self.categories.iter().map(String::as_str).collect();
        let catalog = Arc::new(MemoryCatalog::with_categories(TEST_ADMIN, &titles));
        let messenger = Arc::new(MockMessenger::new());
        let inference = Arc::new(MockInference::with_replies(self.replies));
        let enricher = Arc::new(MockEnricher::new());

        let adapters = Adapters {
            cache: cache.clone(),
            catalog: catalog.clone(),
            messenger: messenger.clone(),
            inference: inference.clone(),
            enricher: enricher.clone(),
        };
        let store = Arc::new(SessionStore::new(
            cache.clone(),
            Duration::from_secs(config.session.ttl_secs),
            config.agent.default_admin_id.clone(),
        ));
        let pipeline = Arc::new(ConversationPipeline::new(&config, &adapters, store.clone()));
        let guard = IdempotencyGuard::new(
            cache.clone(),
            Duration::from_secs(config.session.processed_ttl_secs),
        );
        let (tx, rx) = mpsc::channel(16);
        let albums = AlbumAggregator::new(
            cache.clone(),
            messenger.clone(),
            tx,
            AlbumSettings::from_config(
                &config.album,
                Duration::from_secs(config.whatsapp.media_timeout_secs),
            ),
        );

        TestHarness {
            inference,
            messenger,
            catalog,
            enricher,
            cache,
            store,
            pipeline,
            guard,
            albums,
            flushed: Mutex::new(rx),
            config,
        }
    }
}

/// A complete conversation stack over mock collaborators.
pub struct TestHarness {
    pub inference: Arc<MockInference>,
    pub messenger: Arc<MockMessenger>,
    pub catalog: Arc<MemoryCatalog>,
    pub enricher: Arc<MockEnricher>,
    pub cache: Arc<MemoryCache>,
    pub store: Arc<SessionStore>,
    pub pipeline: Arc<ConversationPipeline>,
    pub guard: IdempotencyGuard,
    pub albums: AlbumAggregator,
    flushed: Mutex<mpsc::Receiver<InboundMessage>>,
    pub config: VitrinaConfig,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Routes and processes `message` inline. Album images are only buffered.
    pub async fn deliver(&self, message: InboundMessage) -> Result<Route, VitrinaError> {
        let route = vitrina_agent::route(&self.guard, &message).await;
        match route {
            Route::Duplicate => {}
            Route::Album => self.albums.add(message, self.albums.next_seq()).await?,
            Route::Pipeline => self.pipeline.handle(message).await?,
        }
        Ok(route)
    }

    pub async fn send_text(&self, id: &str, text: &str) -> Result<Route, VitrinaError> {
        self.deliver(text_message(id, text)).await
    }

    /// Waits for the next flushed album.
    pub async fn next_album(&self) -> Option<InboundMessage> {
        self.flushed.lock().await.recv().await
    }

    /// Waits for the next flushed album and runs it through the pipeline.
    pub async fn deliver_next_album(&self) -> Result<Option<Route>, VitrinaError> {
        match self.next_album().await {
            Some(album) => self.deliver(album).await.map(Some),
            None => Ok(None),
        }
    }

    /// The stored session for [`TEST_PHONE`].
    pub async fn session(&self) -> Option<ConversationSession> {
        self.store.get(TEST_PHONE).await.ok().flatten()
    }

    pub fn timeout_worker(&self) -> TimeoutWorker {
        TimeoutWorker::new(self.store.clone(), self.messenger.clone(), &self.config.timeout)
    }
}

pub fn text_message(id: &str, text: &str) -> InboundMessage {
    InboundMessage {
        id: MessageId(id.to_string()),
        phone: TEST_PHONE.to_string(),
        content: MessageContent::Text {
            text: text.to_string(),
        },
        album_id: None,
        timestamp: Utc::now(),
    }
}

fn attachment(id: &str, mime: &str) -> MediaAttachment {
    MediaAttachment {
        message_id: id.to_string(),
        url: Some(format!("https://mmg.whatsapp.test/{id}.enc")),
        mime_type: Some(mime.to_string()),
    }
}

/// A single photo, optionally captioned.
pub fn image_message(id: &str, caption: Option<&str>) -> InboundMessage {
    InboundMessage {
        content: MessageContent::Image {
            images: vec![attachment(id, "image/jpeg")],
            resolved: Vec::new(),
            caption: caption.map(str::to_string),
        },
        ..text_message(id, "")
    }
}

/// One photo of album `album_id`.
pub fn album_image(id: &str, album_id: &str, caption: Option<&str>) -> InboundMessage {
    InboundMessage {
        album_id: Some(album_id.to_string()),
        ..image_message(id, caption)
    }
}

pub fn audio_message(id: &str) -> InboundMessage {
    InboundMessage {
        content: MessageContent::Audio {
            media: attachment(id, "audio/ogg; codecs=opus"),
        },
        ..text_message(id, "")
    }
}
