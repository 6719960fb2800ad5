// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock messaging adapter that captures outbound messages.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use vitrina_core::traits::adapter::PluginAdapter;
use vitrina_core::traits::messaging::MessagingAdapter;
use vitrina_core::types::{AdapterType, HealthStatus, MediaAttachment};
use vitrina_core::VitrinaError;

use crate::lock;

/// A message passed to `send_text` or `send_image`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: String,
    /// Text body, or the caption of an image.
    pub body: String,
    pub image_url: Option<String>,
}

/// Captures sends; decrypts media to `https://media.test/<message_id>.jpg`.
pub struct MockMessenger {
    sent: Mutex<Vec<SentMessage>>,
    fail_sends: AtomicBool,
    fail_decrypt: AtomicBool,
    decrypt_calls: AtomicUsize,
}

impl MockMessenger {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
            fail_decrypt: AtomicBool::new(false),
            decrypt_calls: AtomicUsize::new(0),
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        lock(&self.sent).clone()
    }

    /// Bodies of everything sent, in order.
    pub fn bodies(&self) -> Vec<String> {
        lock(&self.sent).iter().map(|m| m.body.clone()).collect()
    }

    pub fn last_body(&self) -> Option<String> {
        lock(&self.sent).last().map(|m| m.body.clone())
    }

    pub fn clear(&self) {
        lock(&self.sent).clear();
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_decrypt(&self, fail: bool) {
        self.fail_decrypt.store(fail, Ordering::SeqCst);
    }

    pub fn decrypt_calls(&self) -> usize {
        self.decrypt_calls.load(Ordering::SeqCst)
    }

    fn record(&self, to: &str, body: &str, image_url: Option<&str>) -> Result<(), VitrinaError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(VitrinaError::Messaging {
                message: "mock send failure".into(),
                source: None,
            });
        }
        lock(&self.sent).push(SentMessage {
            to: to.to_string(),
            body: body.to_string(),
            image_url: image_url.map(str::to_string),
        });
        Ok(())
    }
}

impl Default for MockMessenger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockMessenger {
    fn name(&self) -> &str {
        "mock-messenger"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Messaging
    }

    async fn health_check(&self) -> Result<HealthStatus, VitrinaError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), VitrinaError> {
        Ok(())
    }
}

#[async_trait]
impl MessagingAdapter for MockMessenger {
    async fn send_text(&self, to: &str, body: &str) -> Result<(), VitrinaError> {
        self.record(to, body, None)
    }

    async fn send_image(&self, to: &str, url: &str, caption: Option<&str>) -> Result<(), VitrinaError> {
        self.record(to, caption.unwrap_or_default(), Some(url))
    }

    async fn decrypt_media(&self, media: &MediaAttachment) -> Result<String, VitrinaError> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_decrypt.load(Ordering::SeqCst) {
            return Err(VitrinaError::Messaging {
                message: "mock decrypt failure".into(),
                source: None,
            });
        }
        Ok(format!("https://media.test/{}.jpg", media.message_id))
    }
}
