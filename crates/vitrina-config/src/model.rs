// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Vitrina commerce agent.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Vitrina configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VitrinaConfig {
    /// Agent identity and conversation behavior.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Inbound webhook HTTP server.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// WhatsApp bridge (outbound messages and media decryption).
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// Language-model inference, transcription and enrichment.
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Catalog database and cache backend.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Conversation session lifetimes.
    #[serde(default)]
    pub session: SessionConfig,

    /// Album aggregation timing.
    #[serde(default)]
    pub album: AlbumConfig,

    /// Inactivity warning and close policy.
    #[serde(default)]
    pub timeout: TimeoutConfig,
}

/// Agent identity and conversation behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the agent.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Store owner assigned to new sessions.
    #[serde(default = "default_admin_id")]
    pub default_admin_id: String,

    /// Number of past turns included in each inference prompt.
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Maximum number of products listed per search.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Products with stock at or below this value count as low stock.
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: i64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
            default_admin_id: default_admin_id(),
            history_window: default_history_window(),
            search_limit: default_search_limit(),
            low_stock_threshold: default_low_stock_threshold(),
        }
    }
}

fn default_agent_name() -> String {
    "vitrina".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_admin_id() -> String {
    "default".to_string()
}

fn default_history_window() -> usize {
    10
}

fn default_search_limit() -> usize {
    10
}

fn default_low_stock_threshold() -> i64 {
    5
}

/// Webhook HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Address to bind the server to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path the messaging provider posts events to.
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,

    /// When set, webhook requests must carry a matching `apikey` header.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            webhook_path: default_webhook_path(),
            api_key: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_webhook_path() -> String {
    "/webhook".to_string()
}

/// WhatsApp bridge configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppConfig {
    /// Base URL of the bridge API.
    #[serde(default = "default_whatsapp_base_url")]
    pub base_url: String,

    /// Bridge API key. `None` requires environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Bridge instance name the store's number is connected to.
    #[serde(default = "default_instance")]
    pub instance: String,

    /// Timeout for media decryption calls, in seconds.
    #[serde(default = "default_media_timeout_secs")]
    pub media_timeout_secs: u64,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            base_url: default_whatsapp_base_url(),
            api_key: None,
            instance: default_instance(),
            media_timeout_secs: default_media_timeout_secs(),
        }
    }
}

fn default_whatsapp_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_instance() -> String {
    "vitrina".to_string()
}

fn default_media_timeout_secs() -> u64 {
    15
}

/// Language-model inference configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InferenceConfig {
    /// API key. `None` requires environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_inference_base_url")]
    pub base_url: String,

    /// Chat model used for intent classification.
    #[serde(default = "default_model")]
    pub model: String,

    /// Vision model used for product enrichment.
    #[serde(default = "default_vision_model")]
    pub vision_model: String,

    /// Speech-to-text model.
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,

    /// Maximum tokens to generate per response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Timeout for completion and enrichment calls, in seconds.
    #[serde(default = "default_inference_timeout_secs")]
    pub timeout_secs: u64,

    /// Timeout for transcription calls in seconds, including the audio download.
    #[serde(default = "default_transcription_timeout_secs")]
    pub transcription_timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_inference_base_url(),
            model: default_model(),
            vision_model: default_vision_model(),
            transcription_model: default_transcription_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_inference_timeout_secs(),
            transcription_timeout_secs: default_transcription_timeout_secs(),
        }
    }
}

fn default_inference_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_vision_model() -> String {
    "gpt-4o".to_string()
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.3
}

fn default_inference_timeout_secs() -> u64 {
    45
}

fn default_transcription_timeout_secs() -> u64 {
    60
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// Key-value cache backend: `sqlite` (shared, durable) or `memory`.
    #[serde(default = "default_cache_backend")]
    pub cache_backend: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            cache_backend: default_cache_backend(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("vitrina").join("vitrina.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("vitrina.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

fn default_cache_backend() -> String {
    "sqlite".to_string()
}

/// Conversation session lifetimes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Sliding TTL of a session in seconds, refreshed on every save.
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,

    /// TTL of processed-message markers used for deduplication.
    #[serde(default = "default_processed_ttl_secs")]
    pub processed_ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl_secs(),
            processed_ttl_secs: default_processed_ttl_secs(),
        }
    }
}

fn default_session_ttl_secs() -> u64 {
    1800
}

fn default_processed_ttl_secs() -> u64 {
    600
}

/// Album aggregation timing.
///
/// Images sharing an album id are buffered in the cache and flushed as one
/// message once no new image arrived for `debounce_ms`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AlbumConfig {
    /// Quiet period after the last image before the album is flushed, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Cache TTL of an album buffer. Must exceed `debounce_ms`.
    #[serde(default = "default_buffer_ttl_ms")]
    pub buffer_ttl_ms: u64,

    /// TTL of the per-album advisory lock.
    #[serde(default = "default_lock_ttl_ms")]
    pub lock_ttl_ms: u64,

    /// Lock acquisition attempts before the image is dropped.
    #[serde(default = "default_lock_retries")]
    pub lock_retries: u32,

    /// Base backoff between lock attempts; grows linearly per attempt.
    #[serde(default = "default_lock_backoff_ms")]
    pub lock_backoff_ms: u64,
}

impl Default for AlbumConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            buffer_ttl_ms: default_buffer_ttl_ms(),
            lock_ttl_ms: default_lock_ttl_ms(),
            lock_retries: default_lock_retries(),
            lock_backoff_ms: default_lock_backoff_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    2000
}

fn default_buffer_ttl_ms() -> u64 {
    60_000
}

fn default_lock_ttl_ms() -> u64 {
    5000
}

fn default_lock_retries() -> u32 {
    5
}

fn default_lock_backoff_ms() -> u64 {
    50
}

/// Inactivity timeout policy.
///
/// A session idle for `warn_after_secs` gets one warning; if nothing
/// arrives within `close_after_secs` of it, the session is closed.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Whether the timeout worker runs at all.
    #[serde(default = "default_timeout_enabled")]
    pub enabled: bool,

    /// Seconds between sweeps.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Seconds of inactivity after which a warning is sent.
    #[serde(default = "default_warn_after_secs")]
    pub warn_after_secs: u64,

    /// Seconds after the warning before the session is closed.
    #[serde(default = "default_close_after_secs")]
    pub close_after_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            enabled: default_timeout_enabled(),
            poll_interval_secs: default_poll_interval_secs(),
            warn_after_secs: default_warn_after_secs(),
            close_after_secs: default_close_after_secs(),
        }
    }
}

fn default_timeout_enabled() -> bool {
    true
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_warn_after_secs() -> u64 {
    600
}

fn default_close_after_secs() -> u64 {
    300
}
