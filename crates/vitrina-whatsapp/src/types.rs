// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the WhatsApp gateway REST API and its webhook payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// --- Outbound requests ---

#[derive(Debug, Serialize)]
pub struct SendTextRequest<'a> {
    pub number: &'a str,
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SendMediaRequest<'a> {
    pub number: &'a str,
    pub mediatype: &'static str,
    pub media: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaLookupRequest<'a> {
    pub message: MediaLookupMessage<'a>,
    pub convert_to_mp4: bool,
}

#[derive(Debug, Serialize)]
pub struct MediaLookupMessage<'a> {
    pub key: MediaLookupKey<'a>,
}

#[derive(Debug, Serialize)]
pub struct MediaLookupKey<'a> {
    pub id: &'a str,
}

/// Reply of the media decryption endpoint.
///
/// Gateways with object storage enabled return `mediaUrl`; others only the
/// inline base64 payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaLookupResponse {
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub base64: Option<String>,
    #[serde(default)]
    pub mimetype: Option<String>,
}

// --- Webhook payloads ---

/// Top-level webhook envelope. `data` is decoded per event.
#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    #[serde(default)]
    pub instance: Option<String>,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertData {
    pub key: MessageKey,
    #[serde(default)]
    pub message: Option<WaMessage>,
    /// Seconds since epoch, sent as a number or a string.
    #[serde(default)]
    pub message_timestamp: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    pub remote_jid: String,
    #[serde(default)]
    pub from_me: bool,
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaMessage {
    #[serde(default)]
    pub conversation: Option<String>,
    #[serde(default)]
    pub extended_text_message: Option<ExtendedText>,
    #[serde(default)]
    pub image_message: Option<MediaMessage>,
    #[serde(default)]
    pub audio_message: Option<MediaMessage>,
    #[serde(default)]
    pub message_context_info: Option<ContextInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ExtendedText {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MediaMessage {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextInfo {
    #[serde(default)]
    pub message_association: Option<MessageAssociation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageAssociation {
    #[serde(default)]
    pub parent_message_key: Option<ParentKey>,
}

#[derive(Debug, Deserialize)]
pub struct ParentKey {
    pub id: String,
}
