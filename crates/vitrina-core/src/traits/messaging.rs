// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound messaging gateway trait (WhatsApp bridge).

use async_trait::async_trait;

use crate::error::VitrinaError;
use crate::traits::adapter::PluginAdapter;
use crate::types::MediaAttachment;

/// Sends messages to a phone number and resolves inbound media.
#[async_trait]
pub trait MessagingAdapter: PluginAdapter {
    /// Sends a plain text message.
    async fn send_text(&self, to: &str, body: &str) -> Result<(), VitrinaError>;

    /// Sends an image by public URL with an optional caption.
    async fn send_image(
        &self,
        to: &str,
        url: &str,
        caption: Option<&str>,
    ) -> Result<(), VitrinaError>;

    /// Decrypts an inbound media object and returns a publicly reachable URL.
    async fn decrypt_media(&self, media: &MediaAttachment) -> Result<String, VitrinaError>;
}
