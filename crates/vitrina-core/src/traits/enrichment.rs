// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Product enrichment trait (vision model turning photos into a listing).

use async_trait::async_trait;

use crate::error::VitrinaError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{AiProductResult, EnrichmentRequest, Product, ProductField};

/// Generates product listings from images and free-form context.
#[async_trait]
pub trait EnrichmentAdapter: PluginAdapter {
    /// Produces a full listing for a draft.
    async fn enrich(&self, request: &EnrichmentRequest) -> Result<AiProductResult, VitrinaError>;

    /// Produces a new value for one field of an existing product.
    async fn regenerate_field(
        &self,
        product: &Product,
        field: ProductField,
        instruction: Option<&str>,
    ) -> Result<String, VitrinaError>;
}
