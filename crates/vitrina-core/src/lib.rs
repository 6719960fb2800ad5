// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Vitrina conversational commerce agent.
//!
//! This crate provides the adapter traits for every external collaborator
//! (cache, catalog, messaging, inference, enrichment), the shared error type,
//! and the domain types that flow through the conversation pipeline.

pub mod error;
pub mod parse;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::VitrinaError;
pub use types::{
    AdapterType, AiProductResult, Category, ConversationSession, EnrichmentRequest, FieldUpdate,
    HealthStatus, HistoryEntry, InboundMessage, MediaAttachment, MessageContent, MessageId,
    NewProduct, PendingAction, Product, ProductDraft, ProductField, ProductFilter, ProductPatch,
    ProductState, Role, SearchResult, SessionState, Tone,
};

pub use traits::{
    CacheAdapter, CatalogAdapter, EnrichmentAdapter, InferenceAdapter, MessagingAdapter,
    PluginAdapter,
};
