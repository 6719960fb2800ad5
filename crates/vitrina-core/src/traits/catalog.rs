// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Catalog repository trait over the relational product store.

use async_trait::async_trait;

use crate::error::VitrinaError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Category, NewProduct, Product, ProductFilter, ProductPatch};

/// Repository of products and categories, scoped per store (`admin_id`).
#[async_trait]
pub trait CatalogAdapter: PluginAdapter {
    /// Finds non-deleted products matching `filter`, newest first.
    async fn find_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, VitrinaError>;

    /// Fetches a single product by id, including deleted ones.
    async fn get_product(&self, admin_id: &str, id: i64) -> Result<Option<Product>, VitrinaError>;

    /// Lists the store's categories ordered by title.
    async fn list_categories(&self, admin_id: &str) -> Result<Vec<Category>, VitrinaError>;

    /// Case-insensitive exact title lookup.
    async fn find_category_by_title(
        &self,
        admin_id: &str,
        title: &str,
    ) -> Result<Option<Category>, VitrinaError>;

    /// Creates a category and returns it.
    async fn create_category(&self, admin_id: &str, title: &str) -> Result<Category, VitrinaError>;

    /// Inserts a product and returns the stored row.
    async fn create_product(&self, product: NewProduct) -> Result<Product, VitrinaError>;

    /// Applies `patch` and returns the updated row.
    ///
    /// Fails with [`VitrinaError::NotFound`] when the product does not exist.
    async fn update_product(
        &self,
        admin_id: &str,
        id: i64,
        patch: ProductPatch,
    ) -> Result<Product, VitrinaError>;

    /// Flips the product state to `deleted`.
    async fn soft_delete_product(&self, admin_id: &str, id: i64) -> Result<(), VitrinaError>;
}
