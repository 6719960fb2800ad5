// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Vitrina commerce agent.

use thiserror::Error;

/// The primary error type used across all Vitrina adapter traits and pipeline stages.
#[derive(Debug, Error)]
pub enum VitrinaError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (catalog database, key-value cache).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Messaging gateway errors (send failure, media decryption, bad payload).
    #[error("messaging error: {message}")]
    Messaging {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Inference or enrichment provider errors (API failure, empty reply).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// An advisory lock could not be acquired within the retry budget.
    #[error("lock contention on {key}")]
    LockContention { key: String },

    /// The user asked for something that cannot be done. The message is
    /// shown to the user verbatim.
    #[error("{0}")]
    InvalidInput(String),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// JSON encoding or decoding failed.
    #[error("serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl VitrinaError {
    /// Wraps any error as a storage error.
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage {
            source: Box::new(err),
        }
    }

    /// Returns true when the error carries a user-facing corrective message.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}
