// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the external collaborators of the pipeline.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod cache;
pub mod catalog;
pub mod enrichment;
pub mod inference;
pub mod messaging;

pub use adapter::PluginAdapter;
pub use cache::CacheAdapter;
pub use catalog::CatalogAdapter;
pub use enrichment::EnrichmentAdapter;
pub use inference::InferenceAdapter;
pub use messaging::MessagingAdapter;
