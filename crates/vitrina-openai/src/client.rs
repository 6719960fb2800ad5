// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for OpenAI-compatible APIs.
//!
//! Provides [`OpenAiClient`], which handles authentication, chat completions,
//! and audio transcription. Requests are never retried: callers degrade to
//! their own fallback instead.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use tracing::debug;
use vitrina_core::VitrinaError;

use crate::types::{ApiErrorResponse, ChatRequest, ChatResponse, TranscriptionResponse};

/// HTTP client for chat completion and transcription endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    /// Unauthenticated client for fetching media from third-party URLs.
    media_client: reqwest::Client,
    base_url: String,
}

impl OpenAiClient {
    /// Creates a new client.
    ///
    /// `timeout` bounds every request made by this client.
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, VitrinaError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| {
                VitrinaError::Config(format!("invalid API key header value: {e}"))
            })?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| provider_err("failed to build HTTP client", e))?;

        let media_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| provider_err("failed to build HTTP client", e))?;

        Ok(Self {
            client,
            media_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Sends a chat completion request and returns the first choice's text.
    pub async fn chat(&self, request: &ChatRequest) -> Result<String, VitrinaError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| provider_err("HTTP request failed", e))?;

        let status = response.status();
        debug!(status = %status, model = %request.model, "completion response received");
        let body = response
            .text()
            .await
            .map_err(|e| provider_err("failed to read response body", e))?;

        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| provider_err("failed to parse API response", e))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| VitrinaError::Provider {
                message: "completion returned no content".into(),
                source: None,
            })
    }

    /// Downloads the audio at `audio_url` and transcribes it with `model`.
    pub async fn transcribe_url(
        &self,
        audio_url: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<String, VitrinaError> {
        let download = self
            .media_client
            .get(audio_url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| provider_err("audio download failed", e))?;
        if !download.status().is_success() {
            return Err(VitrinaError::Provider {
                message: format!("audio download returned {}", download.status()),
                source: None,
            });
        }
        let mime = download
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("audio/ogg")
            .to_string();
        let bytes = download
            .bytes()
            .await
            .map_err(|e| provider_err("audio download failed", e))?;
        debug!(size = bytes.len(), mime = %mime, "audio downloaded");

        let part = Part::bytes(bytes.to_vec())
            .file_name(format!("audio.{}", extension_for(&mime)))
            .mime_str(&mime)
            .map_err(|e| provider_err("invalid audio content type", e))?;
        let form = Form::new().text("model", model.to_string()).part("file", part);

        let url = format!("{}/audio/transcriptions", self.base_url);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| provider_err("HTTP request failed", e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| provider_err("failed to read response body", e))?;
        if !status.is_success() {
            return Err(api_error(status, &body));
        }
        let parsed: TranscriptionResponse = serde_json::from_str(&body)
            .map_err(|e| provider_err("failed to parse transcription response", e))?;
        Ok(parsed.text.trim().to_string())
    }
}

fn extension_for(mime: &str) -> &'static str {
    let essence = mime.split(';').next().unwrap_or(mime).trim();
    match essence {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "m4a",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/webm" => "webm",
        _ => "ogg",
    }
}

fn provider_err(context: &str, err: impl std::error::Error + Send + Sync + 'static) -> VitrinaError {
    VitrinaError::Provider {
        message: format!("{context}: {err}"),
        source: Some(Box::new(err)),
    }
}

fn api_error(status: reqwest::StatusCode, body: &str) -> VitrinaError {
    let message = match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api_err) => format!(
            "API error ({}): {}",
            api_err.error.type_.as_deref().unwrap_or("unknown"),
            api_err.error.message
        ),
        Err(_) => format!("API returned {status}: {body}"),
    };
    VitrinaError::Provider {
        message,
        source: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> OpenAiClient {
        OpenAiClient::new("test-api-key", base_url, Duration::from_secs(5)).unwrap()
    }

    fn test_request() -> ChatRequest {
        ChatRequest {
            model: "gpt-test".into(),
            messages: vec![ChatMessage::text("user", "hola")],
            max_tokens: 64,
            temperature: 0.0,
            response_format: None,
        }
    }

    #[tokio::test]
    async fn chat_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-api-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "¡Hola!"}}]
            })))
            .mount(&server)
            .await;

        let reply = test_client(&server.uri()).chat(&test_request()).await.unwrap();
        assert_eq!(reply, "¡Hola!");
    }

    #[tokio::test]
    async fn chat_maps_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "bad key", "type": "invalid_request_error"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .chat(&test_request())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("bad key"), "got: {err}");
    }

    #[tokio::test]
    async fn chat_server_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(1)
            .mount(&server)
            .await;

        let result = test_client(&server.uri()).chat(&test_request()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn chat_empty_content_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": null}}]
            })))
            .mount(&server)
            .await;

        assert!(test_client(&server.uri()).chat(&test_request()).await.is_err());
    }

    #[tokio::test]
    async fn transcribe_downloads_then_uploads() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media/voice.ogg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "audio/ogg; codecs=opus")
                    .set_body_bytes(vec![0u8, 1, 2, 3]),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"text": " cambiale el precio a 1500 "})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let text = client
            .transcribe_url(
                &format!("{}/media/voice.ogg", server.uri()),
                "whisper-1",
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(text, "cambiale el precio a 1500");
    }

    #[test]
    fn audio_extensions() {
        assert_eq!(extension_for("audio/ogg; codecs=opus"), "ogg");
        assert_eq!(extension_for("audio/mpeg"), "mp3");
        assert_eq!(extension_for("application/octet-stream"), "ogg");
    }
}
