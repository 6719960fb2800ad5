// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp gateway adapter for the Vitrina agent.
//!
//! [`WhatsAppClient`] implements [`MessagingAdapter`] over the gateway's REST
//! API; [`webhook`] turns its webhook deliveries into [`InboundMessage`]s.
//!
//! [`InboundMessage`]: vitrina_core::InboundMessage

pub mod types;
pub mod webhook;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use tracing::{debug, info};
use vitrina_config::model::WhatsAppConfig;
use vitrina_core::{
    AdapterType, HealthStatus, MediaAttachment, MessagingAdapter, PluginAdapter, VitrinaError,
};

use crate::types::{
    MediaLookupKey, MediaLookupMessage, MediaLookupRequest, MediaLookupResponse, SendMediaRequest,
    SendTextRequest,
};

pub use webhook::{normalize_payload, WebhookEvent};

/// REST client for one gateway instance.
///
/// API key resolution order: config -> `WHATSAPP_API_KEY` env var -> none.
pub struct WhatsAppClient {
    client: reqwest::Client,
    base_url: String,
    instance: String,
    media_timeout: Duration,
}

impl WhatsAppClient {
    pub fn new(config: &WhatsAppConfig) -> Result<Self, VitrinaError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = resolve_api_key(&config.api_key) {
            headers.insert(
                "apikey",
                HeaderValue::from_str(&key).map_err(|e| {
                    VitrinaError::Config(format!("invalid whatsapp api key header value: {e}"))
                })?,
            );
        }
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| messaging_err("failed to build HTTP client", e))?;

        info!(instance = %config.instance, "whatsapp client initialized");
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            instance: config.instance.clone(),
            media_timeout: Duration::from_secs(config.media_timeout_secs),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, path, self.instance)
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<String, VitrinaError> {
        let mut request = self.client.post(self.endpoint(path)).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                VitrinaError::Timeout {
                    duration: timeout.unwrap_or(Duration::from_secs(30)),
                }
            } else {
                messaging_err("gateway request failed", e)
            }
        })?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| messaging_err("failed to read gateway response", e))?;
        if !status.is_success() {
            return Err(VitrinaError::Messaging {
                message: format!("gateway returned {status} for {path}: {text}"),
                source: None,
            });
        }
        Ok(text)
    }
}

fn resolve_api_key(configured: &Option<String>) -> Option<String> {
    configured
        .clone()
        .filter(|k| !k.is_empty())
        .or_else(|| std::env::var("WHATSAPP_API_KEY").ok().filter(|k| !k.is_empty()))
}

fn messaging_err(context: &str, err: impl std::error::Error + Send + Sync + 'static) -> VitrinaError {
    VitrinaError::Messaging {
        message: format!("{context}: {err}"),
        source: Some(Box::new(err)),
    }
}

#[async_trait]
impl PluginAdapter for WhatsAppClient {
    fn name(&self) -> &str {
        "whatsapp"
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
impl MessagingAdapter for WhatsAppClient {
    async fn send_text(&self, to: &str, body: &str) -> Result<(), VitrinaError> {
        self.post("message/sendText", &SendTextRequest { number: to, text: body }, None)
            .await?;
        debug!(to, chars = body.len(), "text sent");
        Ok(())
    }

    async fn send_image(
        &self,
        to: &str,
        url: &str,
        caption: Option<&str>,
    ) -> Result<(), VitrinaError> {
        let body = SendMediaRequest {
            number: to,
            mediatype: "image",
            media: url,
            caption,
        };
        self.post("message/sendMedia", &body, None).await?;
        debug!(to, "image sent");
        Ok(())
    }

    async fn decrypt_media(&self, media: &MediaAttachment) -> Result<String, VitrinaError> {
        let body = MediaLookupRequest {
            message: MediaLookupMessage {
                key: MediaLookupKey {
                    id: &media.message_id,
                },
            },
            convert_to_mp4: false,
        };
        let raw = self
            .post("chat/getBase64FromMediaMessage", &body, Some(self.media_timeout))
            .await?;
        let parsed: MediaLookupResponse = serde_json::from_str(&raw)?;

        if let Some(url) = parsed.media_url.filter(|u| !u.is_empty()) {
            return Ok(url);
        }
        if let Some(data) = parsed.base64.filter(|b| !b.is_empty()) {
            let mime = parsed
                .mimetype
                .or_else(|| media.mime_type.clone())
                .unwrap_or_else(|| "image/jpeg".to_string());
            return Ok(format!("data:{mime};base64,{data}"));
        }
        Err(VitrinaError::Messaging {
            message: format!("gateway returned no media for message {}", media.message_id),
            source: None,
        })
    }
}
