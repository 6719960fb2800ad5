// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory catalog repository mirroring the SQLite one's filtering rules.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use vitrina_core::traits::adapter::PluginAdapter;
use vitrina_core::traits::catalog::CatalogAdapter;
use vitrina_core::types::{
    AdapterType, Category, HealthStatus, NewProduct, Product, ProductFilter, ProductPatch,
    ProductState,
};
use vitrina_core::VitrinaError;

use crate::lock;

#[derive(Default)]
struct Tables {
    products: Vec<Product>,
    categories: Vec<Category>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

pub struct MemoryCatalog {
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            fail_writes: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        }
    }

    /// A catalog pre-seeded with categories owned by `admin_id`.
    pub fn with_categories(admin_id: &str, titles: &[&str]) -> Self {
        let catalog = Self::new();
        {
            let mut tables = lock(&catalog.tables);
            for title in titles {
                let id = tables.next_id();
                tables.categories.push(Category {
                    id,
                    admin_id: admin_id.to_string(),
                    title: title.to_string(),
                });
            }
        }
        catalog
    }

    /// Every product row, deleted ones included, in insertion order.
    pub fn products(&self) -> Vec<Product> {
        lock(&self.tables).products.clone()
    }

    pub fn categories(&self) -> Vec<Category> {
        lock(&self.tables).categories.clone()
    }

    /// Makes every write fail with a storage error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Write calls made while writes were enabled. Seeding through
    /// `with_categories` is not counted.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Fails when writes are disabled; otherwise counts the write.
    fn check_writable(&self) -> Result<(), VitrinaError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(VitrinaError::storage(std::io::Error::other("mock write failure")));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MemoryCatalog {
    fn name(&self) -> &str {
        "memory-catalog"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Catalog
    }

    async fn health_check(&self) -> Result<HealthStatus, VitrinaError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), VitrinaError> {
        Ok(())
    }
}

#[async_trait]
impl CatalogAdapter for MemoryCatalog {
    async fn find_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, VitrinaError> {
        let tables = lock(&self.tables);
        let query = filter
            .query
            .as_deref()
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());
        let matching_categories: Vec<i64> = match &query {
            Some(q) => tables
                .categories
                .iter()
                .filter(|c| c.admin_id == filter.admin_id && c.title.to_lowercase().contains(q))
                .map(|c| c.id)
                .collect(),
            None => Vec::new(),
        };

        let mut found: Vec<Product> = tables
            .products
            .iter()
            .filter(|p| p.admin_id == filter.admin_id && p.state != ProductState::Deleted)
            .filter(|p| match &query {
                Some(q) => {
                    p.title.to_lowercase().contains(q)
                        || p.category_id.is_some_and(|id| matching_categories.contains(&id))
                }
                None => true,
            })
            .filter(|p| filter.category_id.is_none_or(|id| p.category_id == Some(id)))
            .filter(|p| filter.max_stock.is_none_or(|max| p.stock <= max))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        found.truncate(filter.limit.max(1));
        Ok(found)
    }

    async fn get_product(&self, admin_id: &str, id: i64) -> Result<Option<Product>, VitrinaError> {
        Ok(lock(&self.tables)
            .products
            .iter()
            .find(|p| p.admin_id == admin_id && p.id == id)
            .cloned())
    }

    async fn list_categories(&self, admin_id: &str) -> Result<Vec<Category>, VitrinaError> {
        let mut categories: Vec<Category> = lock(&self.tables)
            .categories
            .iter()
            .filter(|c| c.admin_id == admin_id)
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(categories)
    }

    async fn find_category_by_title(
        &self,
        admin_id: &str,
        title: &str,
    ) -> Result<Option<Category>, VitrinaError> {
        let title = title.trim().to_lowercase();
        Ok(lock(&self.tables)
            .categories
            .iter()
            .find(|c| c.admin_id == admin_id && c.title.to_lowercase() == title)
            .cloned())
    }

    async fn create_category(&self, admin_id: &str, title: &str) -> Result<Category, VitrinaError> {
        self.check_writable()?;
        let mut tables = lock(&self.tables);
        let category = Category {
            id: tables.next_id(),
            admin_id: admin_id.to_string(),
            title: title.trim().to_string(),
        };
        tables.categories.push(category.clone());
        Ok(category)
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product, VitrinaError> {
        self.check_writable()?;
        let mut tables = lock(&self.tables);
        let now = Utc::now();
        let row = Product {
            id: tables.next_id(),
            admin_id: product.admin_id,
            title: product.title,
            description: product.description,
            price: product.price,
            stock: product.stock,
            category_id: product.category_id,
            images: product.images,
            state: product.state,
            created_at: now,
            updated_at: now,
        };
        tables.products.push(row.clone());
        Ok(row)
    }

    async fn update_product(
        &self,
        admin_id: &str,
        id: i64,
        patch: ProductPatch,
    ) -> Result<Product, VitrinaError> {
        self.check_writable()?;
        let mut tables = lock(&self.tables);
        let product = tables
            .products
            .iter_mut()
            .find(|p| p.admin_id == admin_id && p.id == id)
            .ok_or_else(|| VitrinaError::NotFound {
                entity: "product",
                id: id.to_string(),
            })?;
        if let Some(title) = patch.title {
            product.title = title;
        }
        if let Some(description) = patch.description {
            product.description = description;
        }
        if let Some(price) = patch.price {
            product.price = price;
        }
        if let Some(stock) = patch.stock {
            product.stock = stock;
        }
        if let Some(category_id) = patch.category_id {
            product.category_id = Some(category_id);
        }
        if let Some(state) = patch.state {
            product.state = state;
        }
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn soft_delete_product(&self, admin_id: &str, id: i64) -> Result<(), VitrinaError> {
        self.update_product(
            admin_id,
            id,
            ProductPatch {
                state: Some(ProductState::Deleted),
                ..Default::default()
            },
        )
        .await
        .map(|_| ())
    }
}
