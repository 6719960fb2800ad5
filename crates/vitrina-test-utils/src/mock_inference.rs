// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock inference adapter for deterministic testing.
//!
//! `MockInference` implements `InferenceAdapter` with a FIFO of scripted
//! replies (or failures) and records every completion request.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use vitrina_core::traits::adapter::PluginAdapter;
use vitrina_core::traits::inference::InferenceAdapter;
use vitrina_core::types::{AdapterType, HealthStatus, HistoryEntry};
use vitrina_core::VitrinaError;

use crate::lock;

/// One completion request as seen by the mock.
#[derive(Debug, Clone)]
pub struct RecordedCompletion {
    pub system_prompt: String,
    pub history: Vec<HistoryEntry>,
    pub user_message: String,
}

/// A mock language model that returns pre-configured replies.
///
/// Replies are popped from a FIFO queue. When the queue is empty the
/// non-JSON text "mock response" is returned.
pub struct MockInference {
    replies: Mutex<VecDeque<Result<String, String>>>,
    transcription: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
    requests: Mutex<Vec<RecordedCompletion>>,
}

impl MockInference {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            transcription: Mutex::new(None),
            delay: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Pre-loads raw model replies.
    pub fn with_replies<S: Into<String>>(replies: impl IntoIterator<Item = S>) -> Self {
        let mock = Self::new();
        for reply in replies {
            mock.push_reply(reply);
        }
        mock
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        lock(&self.replies).push_back(Ok(reply.into()));
    }

    /// Queues a well-formed classifier reply.
    pub fn push_intent(&self, message: &str, action: &str, data: serde_json::Value, next_state: &str) {
        let reply = serde_json::json!({
            "message": message,
            "action": action,
            "data": data,
            "next_state": next_state,
        });
        self.push_reply(reply.to_string());
    }

    /// Makes the next completion fail with a provider error.
    pub fn push_failure(&self, message: impl Into<String>) {
        lock(&self.replies).push_back(Err(message.into()));
    }

    /// Delays every completion, for timeout tests.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *lock(&self.delay) = delay;
    }

    /// Text returned by `transcribe`; `None` makes transcription fail.
    pub fn set_transcription(&self, text: Option<&str>) {
        *lock(&self.transcription) = text.map(str::to_string);
    }

    pub fn requests(&self) -> Vec<RecordedCompletion> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

impl Default for MockInference {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockInference {
    fn name(&self) -> &str {
        "mock-inference"
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
impl InferenceAdapter for MockInference {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[HistoryEntry],
        user_message: &str,
    ) -> Result<String, VitrinaError> {
        lock(&self.requests).push(RecordedCompletion {
            system_prompt: system_prompt.to_string(),
            history: history.to_vec(),
            user_message: user_message.to_string(),
        });
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let next = lock(&self.replies).pop_front();
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(VitrinaError::Provider {
                message,
                source: None,
            }),
            None => Ok("mock response".to_string()),
        }
    }

    async fn transcribe(&self, _audio_url: &str) -> Result<String, VitrinaError> {
        lock(&self.transcription).clone().ok_or_else(|| VitrinaError::Provider {
            message: "transcription unavailable".into(),
            source: None,
        })
    }
}
