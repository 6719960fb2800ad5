// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Album aggregation.
//!
//! WhatsApp delivers an N-photo album as N separate webhook events. Each
//! image is appended to a cache buffer under a short advisory lock and a
//! debounce timer is (re)armed for the album; when the timer survives the
//! quiet period the buffer is drained into a single image message that
//! re-enters the pipeline through the agent channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vitrina_config::model::AlbumConfig;
use vitrina_core::{
    CacheAdapter, InboundMessage, MediaAttachment, MessageContent, MessageId, MessagingAdapter,
    VitrinaError,
};

fn buffer_key(phone: &str, album_id: &str) -> String {
    format!("album:{phone}:{album_id}")
}

fn lock_key(phone: &str, album_id: &str) -> String {
    format!("lock:album:{phone}:{album_id}")
}

/// One image held in an album buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumImage {
    /// Arrival sequence assigned at dispatch; concurrent adds may land out of order.
    #[serde(default)]
    pub seq: u64,
    pub url: String,
    pub message_id: String,
    #[serde(default)]
    pub caption: Option<String>,
}

/// Images of one album collected so far, in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumBuffer {
    pub images: Vec<AlbumImage>,
    /// First non-empty caption in arrival order.
    pub caption: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AlbumBuffer {
    fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            images: Vec::new(),
            caption: None,
            timestamp,
        }
    }

    /// Inserts `image` in arrival order unless its message id is already buffered.
    fn push(&mut self, image: AlbumImage) -> bool {
        if self.images.iter().any(|i| i.message_id == image.message_id) {
            return false;
        }
        let at = self.images.partition_point(|i| i.seq <= image.seq);
        self.images.insert(at, image);
        self.caption = self
            .images
            .iter()
            .filter_map(|i| i.caption.as_deref().map(str::trim))
            .find(|c| !c.is_empty())
            .map(str::to_string);
        true
    }
}

/// Timing knobs for aggregation.
#[derive(Debug, Clone)]
pub struct AlbumSettings {
    pub debounce: Duration,
    pub buffer_ttl: Duration,
    pub lock_ttl: Duration,
    pub lock_retries: u32,
    pub lock_backoff: Duration,
    pub decrypt_timeout: Duration,
}

impl AlbumSettings {
    pub fn from_config(config: &AlbumConfig, decrypt_timeout: Duration) -> Self {
        Self {
            debounce: Duration::from_millis(config.debounce_ms),
            buffer_ttl: Duration::from_millis(config.buffer_ttl_ms),
            lock_ttl: Duration::from_millis(config.lock_ttl_ms),
            lock_retries: config.lock_retries,
            lock_backoff: Duration::from_millis(config.lock_backoff_ms),
            decrypt_timeout,
        }
    }
}

type TimerKey = (String, String);

struct Inner {
    cache: Arc<dyn CacheAdapter>,
    messenger: Arc<dyn MessagingAdapter>,
    sink: mpsc::Sender<InboundMessage>,
    settings: AlbumSettings,
    /// Pending flush per album; the generation guards against a finished
    /// timer removing its successor.
    timers: DashMap<TimerKey, (u64, CancellationToken)>,
    generation: AtomicU64,
    arrivals: AtomicU64,
}

/// Buffers album images and emits one message per album. Cheap to clone.
#[derive(Clone)]
pub struct AlbumAggregator {
    inner: Arc<Inner>,
}

impl AlbumAggregator {
    pub fn new(
        cache: Arc<dyn CacheAdapter>,
        messenger: Arc<dyn MessagingAdapter>,
        sink: mpsc::Sender<InboundMessage>,
        settings: AlbumSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache,
                messenger,
                sink,
                settings,
                timers: DashMap::new(),
                generation: AtomicU64::new(0),
                arrivals: AtomicU64::new(0),
            }),
        }
    }

    /// Number of albums with a flush pending.
    pub fn pending(&self) -> usize {
        self.inner.timers.len()
    }

    /// Reserves the next arrival sequence number. Take it before handing the
    /// image to a background task.
    pub fn next_seq(&self) -> u64 {
        self.inner.arrivals.fetch_add(1, Ordering::Relaxed)
    }

    /// Adds one album image and re-arms the album's flush timer.
    pub async fn add(&self, message: InboundMessage, seq: u64) -> Result<(), VitrinaError> {
        let InboundMessage {
            phone,
            content,
            album_id,
            timestamp,
            ..
        } = message;
        let (Some(album_id), MessageContent::Image { images, caption, .. }) = (album_id, content) else {
            return Err(VitrinaError::Internal("album aggregator fed a non-album message".into()));
        };

        // Decrypt before taking the lock: the lock must not span provider calls.
        let mut entries = Vec::with_capacity(images.len());
        for attachment in &images {
            match self.resolve(attachment).await {
                Some(url) => entries.push(AlbumImage {
                    seq,
                    url,
                    message_id: attachment.message_id.clone(),
                    caption: caption.clone(),
                }),
                None => warn!(message_id = %attachment.message_id, "album image without a usable URL"),
            }
        }
        if entries.is_empty() {
            return Ok(());
        }

        let lock = lock_key(&phone, &album_id);
        let token = self.acquire(&lock).await?;
        let appended = self.append(&phone, &album_id, entries, timestamp).await;
        self.release(&lock, &token).await;
        let count = appended?;
        debug!(%album_id, buffered = count, "album image buffered");

        self.schedule_flush(phone, album_id);
        Ok(())
    }

    async fn resolve(&self, attachment: &MediaAttachment) -> Option<String> {
        let timeout = self.inner.settings.decrypt_timeout;
        match tokio::time::timeout(timeout, self.inner.messenger.decrypt_media(attachment)).await {
            Ok(Ok(url)) => return Some(url),
            Ok(Err(e)) => warn!(error = %e, "media decryption failed, using raw URL"),
            Err(_) => warn!(?timeout, "media decryption timed out, using raw URL"),
        }
        attachment.url.clone()
    }

    async fn acquire(&self, key: &str) -> Result<String, VitrinaError> {
        let settings = &self.inner.settings;
        let token = uuid::Uuid::new_v4().to_string();
        for attempt in 0..=settings.lock_retries {
            if self.inner.cache.set_nx(key, &token, settings.lock_ttl).await? {
                return Ok(token);
            }
            if attempt < settings.lock_retries {
                tokio::time::sleep(settings.lock_backoff * (attempt + 1)).await;
            }
        }
        warn!(key, retries = settings.lock_retries, "album lock contended, dropping image");
        Err(VitrinaError::LockContention { key: key.to_string() })
    }

    /// Releases the lock if it is still ours; an expired lock may belong to someone else.
    async fn release(&self, key: &str, token: &str) {
        let cache = &self.inner.cache;
        let result = match cache.get(key).await {
            Ok(Some(holder)) if holder == token => cache.delete(key).await.map(|_| ()),
            Ok(_) => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(key, error = %e, "failed to release album lock");
        }
    }

    async fn append(
        &self,
        phone: &str,
        album_id: &str,
        entries: Vec<AlbumImage>,
        timestamp: DateTime<Utc>,
    ) -> Result<usize, VitrinaError> {
        let key = buffer_key(phone, album_id);
        let mut buffer = match self.inner.cache.get(&key).await? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(%album_id, error = %e, "unreadable album buffer replaced");
                AlbumBuffer::new(timestamp)
            }),
            None => AlbumBuffer::new(timestamp),
        };
        for entry in entries {
            buffer.push(entry);
        }
        let raw = serde_json::to_string(&buffer)?;
        self.inner
            .cache
            .set(&key, &raw, self.inner.settings.buffer_ttl)
            .await?;
        Ok(buffer.images.len())
    }

    fn schedule_flush(&self, phone: String, album_id: String) {
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let key = (phone, album_id);
        if let Some((_, previous)) = self
            .inner
            .timers
            .insert(key.clone(), (generation, cancel.clone()))
        {
            previous.cancel();
        }

        let this = self.clone();
        let debounce = self.inner.settings.debounce;
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(debounce) => {}
            }
            this.inner.timers.remove_if(&key, |_, (g, _)| *g == generation);
            let (phone, album_id) = key;
            if let Err(e) = this.flush(&phone, &album_id).await {
                warn!(%album_id, error = %e, "album flush failed");
            }
        });
    }

    /// Drains the album buffer and emits the aggregated message.
    ///
    /// Returns false when there was nothing to flush, which is the case for
    /// every caller after the first.
    pub async fn flush(&self, phone: &str, album_id: &str) -> Result<bool, VitrinaError> {
        let lock = lock_key(phone, album_id);
        let token = self.acquire(&lock).await?;
        let drained = self.drain(phone, album_id).await;
        self.release(&lock, &token).await;
        let Some(buffer) = drained? else {
            debug!(%album_id, "album already flushed");
            return Ok(false);
        };

        let (images, resolved): (Vec<MediaAttachment>, Vec<String>) = buffer
            .images
            .into_iter()
            .map(|image| {
                let attachment = MediaAttachment {
                    message_id: image.message_id,
                    url: Some(image.url.clone()),
                    mime_type: None,
                };
                (attachment, image.url)
            })
            .unzip();
        let message = InboundMessage {
            id: MessageId(format!("album:{album_id}")),
            phone: phone.to_string(),
            content: MessageContent::Image {
                images,
                resolved,
                caption: buffer.caption,
            },
            album_id: Some(album_id.to_string()),
            timestamp: buffer.timestamp,
        };
        info!(%album_id, "album flushed");
        self.inner
            .sink
            .send(message)
            .await
            .map_err(|_| VitrinaError::Internal("agent channel closed".into()))?;
        Ok(true)
    }

    async fn drain(&self, phone: &str, album_id: &str) -> Result<Option<AlbumBuffer>, VitrinaError> {
        let key = buffer_key(phone, album_id);
        let Some(raw) = self.inner.cache.get(&key).await? else {
            return Ok(None);
        };
        if !self.inner.cache.delete(&key).await? {
            return Ok(None);
        }
        let buffer: AlbumBuffer = serde_json::from_str(&raw)?;
        Ok((!buffer.images.is_empty()).then_some(buffer))
    }

    /// Cancels every pending flush timer. Buffers expire on their own TTL.
    pub fn cancel_all(&self) {
        for entry in self.inner.timers.iter() {
            entry.value().1.cancel();
        }
        self.inner.timers.clear();
    }
}
