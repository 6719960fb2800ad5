// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock enrichment adapter returning a canned listing.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use vitrina_core::traits::adapter::PluginAdapter;
use vitrina_core::traits::enrichment::EnrichmentAdapter;
use vitrina_core::types::{
    AdapterType, AiProductResult, EnrichmentRequest, HealthStatus, Product, ProductField,
};
use vitrina_core::VitrinaError;

use crate::lock;

pub struct MockEnricher {
    result: Mutex<AiProductResult>,
    last_request: Mutex<Option<EnrichmentRequest>>,
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl MockEnricher {
    /// Listing for a leather handbag in the "Accesorios" category.
    pub fn new() -> Self {
        Self::with_result(AiProductResult {
            title: "Cartera de cuero".into(),
            description: "Cartera de cuero genuino con cierre y correa regulable.".into(),
            price: None,
            category_name: Some("Accesorios".into()),
            tags: vec!["cartera".into(), "cuero".into()],
        })
    }

    pub fn with_result(result: AiProductResult) -> Self {
        Self {
            result: Mutex::new(result),
            last_request: Mutex::new(None),
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of `enrich` calls.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<EnrichmentRequest> {
        lock(&self.last_request).clone()
    }

    fn check(&self) -> Result<(), VitrinaError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(VitrinaError::Provider {
                message: "mock enrichment failure".into(),
                source: None,
            });
        }
        Ok(())
    }
}

impl Default for MockEnricher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockEnricher {
    fn name(&self) -> &str {
        "mock-enricher"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Enrichment
    }

    async fn health_check(&self) -> Result<HealthStatus, VitrinaError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), VitrinaError> {
        Ok(())
    }
}

#[async_trait]
impl EnrichmentAdapter for MockEnricher {
    async fn enrich(&self, request: &EnrichmentRequest) -> Result<AiProductResult, VitrinaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_request) = Some(request.clone());
        self.check()?;
        Ok(lock(&self.result).clone())
    }

    async fn regenerate_field(
        &self,
        _product: &Product,
        field: ProductField,
        _instruction: Option<&str>,
    ) -> Result<String, VitrinaError> {
        self.check()?;
        Ok(format!("regenerated {field}"))
    }
}
