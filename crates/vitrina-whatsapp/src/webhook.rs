// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook envelope classification and normalization.
//!
//! Converts gateway payloads into provider-independent [`InboundMessage`]
//! records. Anything the pipeline does not handle (own messages, group chats,
//! connection events, stickers) is dropped here with a debug log.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::{debug, warn};
use vitrina_core::{InboundMessage, MediaAttachment, MessageContent, MessageId, VitrinaError};

use crate::types::{UpsertData, WaMessage, WebhookEnvelope};

/// Webhook event kinds the gateway emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    MessagesUpsert,
    SessionStatus,
    QrUpdated,
    Other(String),
}

impl WebhookEvent {
    /// Parses an event name. `MESSAGES_UPSERT` and `messages.upsert` are
    /// equivalent.
    pub fn parse(name: &str) -> Self {
        let normalized = name.trim().to_ascii_lowercase().replace('_', ".");
        match normalized.as_str() {
            "messages.upsert" => Self::MessagesUpsert,
            "session.status" | "connection.update" => Self::SessionStatus,
            "qr.updated" | "qrcode.updated" => Self::QrUpdated,
            _ => Self::Other(normalized),
        }
    }
}

/// Normalizes a raw webhook body into zero or more inbound messages.
///
/// Returns an error only when the body is not a recognizable envelope.
pub fn normalize_payload(payload: &Value) -> Result<Vec<InboundMessage>, VitrinaError> {
    let envelope: WebhookEnvelope = serde_json::from_value(payload.clone())?;
    match WebhookEvent::parse(&envelope.event) {
        WebhookEvent::MessagesUpsert => {}
        WebhookEvent::SessionStatus | WebhookEvent::QrUpdated => {
            debug!(event = %envelope.event, instance = ?envelope.instance, "connection event ignored");
            return Ok(Vec::new());
        }
        WebhookEvent::Other(name) => {
            debug!(event = %name, "unhandled webhook event");
            return Ok(Vec::new());
        }
    }

    let items: Vec<&Value> = match &envelope.data {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![&envelope.data],
        _ => return Ok(Vec::new()),
    };

    let mut messages = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<UpsertData>(item.clone()) {
            Ok(data) => {
                if let Some(message) = normalize_upsert(data) {
                    messages.push(message);
                }
            }
            Err(e) => warn!(error = %e, "malformed messages.upsert item skipped"),
        }
    }
    Ok(messages)
}

fn normalize_upsert(data: UpsertData) -> Option<InboundMessage> {
    if data.key.from_me {
        return None;
    }
    let phone = phone_from_jid(&data.key.remote_jid)?;
    let message = data.message.unwrap_or_default();
    let album_id = album_id(&message);
    let content = match extract_content(&data.key.id, message) {
        Some(content) => content,
        None => {
            debug!(message_id = %data.key.id, "unsupported message content dropped");
            return None;
        }
    };

    Some(InboundMessage {
        id: MessageId(data.key.id),
        phone,
        content,
        album_id,
        timestamp: parse_timestamp(data.message_timestamp.as_ref()),
    })
}

/// Strips the JID suffix. Group and broadcast chats yield `None`.
pub fn phone_from_jid(jid: &str) -> Option<String> {
    let (user, server) = jid.split_once('@').unwrap_or((jid, "s.whatsapp.net"));
    if server == "g.us" || server == "broadcast" || server == "newsletter" {
        return None;
    }
    // Multi-device JIDs carry a ":<device>" suffix on the user part.
    let phone = user.split(':').next().unwrap_or(user);
    (!phone.is_empty()).then(|| phone.to_string())
}

fn album_id(message: &WaMessage) -> Option<String> {
    message
        .message_context_info
        .as_ref()?
        .message_association
        .as_ref()?
        .parent_message_key
        .as_ref()
        .map(|key| key.id.clone())
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

fn extract_content(message_id: &str, message: WaMessage) -> Option<MessageContent> {
    if let Some(image) = message.image_message {
        return Some(MessageContent::Image {
            images: vec![MediaAttachment {
                message_id: message_id.to_string(),
                url: image.url,
                mime_type: image.mimetype,
            }],
            resolved: Vec::new(),
            caption: non_empty(image.caption),
        });
    }
    if let Some(audio) = message.audio_message {
        return Some(MessageContent::Audio {
            media: MediaAttachment {
                message_id: message_id.to_string(),
                url: audio.url,
                mime_type: audio.mimetype,
            },
        });
    }
    let text = non_empty(message.conversation)
        .or_else(|| non_empty(message.extended_text_message.and_then(|e| e.text)))?;
    Some(MessageContent::Text { text })
}

fn parse_timestamp(raw: Option<&Value>) -> DateTime<Utc> {
    let secs = match raw {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse::<i64>().ok(),
        _ => None,
    };
    secs.and_then(|s| Utc.timestamp_opt(s, 0).single())
        .unwrap_or_else(Utc::now)
}
