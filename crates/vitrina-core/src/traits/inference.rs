// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Language-model inference trait.

use async_trait::async_trait;

use crate::error::VitrinaError;
use crate::traits::adapter::PluginAdapter;
use crate::types::HistoryEntry;

/// Single-shot text completion and audio transcription.
#[async_trait]
pub trait InferenceAdapter: PluginAdapter {
    /// Runs one non-streaming completion and returns the reply text.
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[HistoryEntry],
        user_message: &str,
    ) -> Result<String, VitrinaError>;

    /// Transcribes the audio at `audio_url` to text.
    async fn transcribe(&self, audio_url: &str) -> Result<String, VitrinaError>;
}
