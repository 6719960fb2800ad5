// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible adapters for the Vitrina agent.
//!
//! [`OpenAiProvider`] implements [`InferenceAdapter`] (intent completion and
//! voice-note transcription) and [`enrichment::OpenAiEnricher`] implements
//! the vision-based listing generator. Both share one [`OpenAiClient`].

pub mod client;
pub mod enrichment;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};
use vitrina_config::model::InferenceConfig;
use vitrina_core::{
    AdapterType, HealthStatus, HistoryEntry, InferenceAdapter, PluginAdapter, Role, VitrinaError,
};

pub use crate::client::OpenAiClient;
pub use crate::enrichment::OpenAiEnricher;
use crate::types::{ChatMessage, ChatRequest, ResponseFormat};

/// Chat-completion provider implementing [`InferenceAdapter`].
///
/// API key resolution order: config -> `OPENAI_API_KEY` env var -> error.
pub struct OpenAiProvider {
    client: OpenAiClient,
    model: String,
    transcription_model: String,
    transcription_timeout: Duration,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiProvider {
    /// Creates a provider from the `[inference]` section.
    pub fn new(config: &InferenceConfig) -> Result<Self, VitrinaError> {
        let client = build_client(config)?;
        info!(model = %config.model, "inference provider initialized");
        Ok(Self::with_client(client, config))
    }

    /// Creates a provider around an existing client.
    pub fn with_client(client: OpenAiClient, config: &InferenceConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            transcription_model: config.transcription_model.clone(),
            transcription_timeout: Duration::from_secs(config.transcription_timeout_secs),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    fn to_chat_request(
        &self,
        system_prompt: &str,
        history: &[HistoryEntry],
        user_message: &str,
    ) -> ChatRequest {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::text("system", system_prompt));
        messages.extend(
            history
                .iter()
                .map(|entry| ChatMessage::text(role_name(entry.role), entry.content.clone())),
        );
        messages.push(ChatMessage::text("user", user_message));

        ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            response_format: Some(ResponseFormat::json_object()),
        }
    }
}

/// Builds the shared HTTP client from the `[inference]` section.
pub fn build_client(config: &InferenceConfig) -> Result<OpenAiClient, VitrinaError> {
    let api_key = resolve_api_key(&config.api_key)?;
    OpenAiClient::new(
        &api_key,
        &config.base_url,
        Duration::from_secs(config.timeout_secs),
    )
}

fn resolve_api_key(configured: &Option<String>) -> Result<String, VitrinaError> {
    if let Some(key) = configured
        && !key.is_empty()
    {
        return Ok(key.clone());
    }
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(key),
        _ => Err(VitrinaError::Config(
            "no inference API key configured: set inference.api_key or OPENAI_API_KEY".into(),
        )),
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

#[async_trait]
impl PluginAdapter for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Inference
    }

    async fn health_check(&self) -> Result<HealthStatus, VitrinaError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), VitrinaError> {
        Ok(())
    }
}

#[async_trait]
impl InferenceAdapter for OpenAiProvider {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[HistoryEntry],
        user_message: &str,
    ) -> Result<String, VitrinaError> {
        let request = self.to_chat_request(system_prompt, history, user_message);
        debug!(turns = request.messages.len(), "sending completion");
        self.client.chat(&request).await
    }

    async fn transcribe(&self, audio_url: &str) -> Result<String, VitrinaError> {
        self.client
            .transcribe_url(audio_url, &self.transcription_model, self.transcription_timeout)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: &str) -> OpenAiProvider {
        let config = InferenceConfig {
            model: "gpt-test".into(),
            ..InferenceConfig::default()
        };
        let client = OpenAiClient::new("k", base_url, Duration::from_secs(5)).unwrap();
        OpenAiProvider::with_client(client, &config)
    }

    #[test]
    fn configured_key_wins() {
        let key = resolve_api_key(&Some("sk-config".into())).unwrap();
        assert_eq!(key, "sk-config");
    }

    #[test]
    fn chat_request_orders_system_history_user() {
        let p = provider("http://127.0.0.1:9");
        let now = Utc::now();
        let history = vec![
            HistoryEntry::new(Role::User, "hola", now),
            HistoryEntry::new(Role::Assistant, "¡Hola! ¿En qué te ayudo?", now),
        ];
        let req = p.to_chat_request("sys", &history, "buscá carteras");
        let roles: Vec<&str> = req.messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(req.model, "gpt-test");
        assert!(req.response_format.is_some());
    }

    #[tokio::test]
    async fn complete_posts_json_mode_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-test",
                "response_format": {"type": "json_object"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "{\"action\": \"list_all\"}"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = provider(&server.uri())
            .complete("sys", &[], "mostrame todo")
            .await
            .unwrap();
        assert!(reply.contains("list_all"));
    }

    #[test]
    fn adapter_identity() {
        let p = provider("http://127.0.0.1:9");
        assert_eq!(p.adapter_type(), AdapterType::Inference);
        assert_eq!(p.name(), "openai");
    }
}
