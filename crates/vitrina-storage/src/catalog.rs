// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the CatalogAdapter trait.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use vitrina_core::{
    AdapterType, CatalogAdapter, Category, HealthStatus, NewProduct, PluginAdapter, Product,
    ProductFilter, ProductPatch, VitrinaError,
};

use crate::database::{map_tr_err, Database};
use crate::queries;

/// SQLite-backed catalog repository.
///
/// Delegates every operation to the typed query modules.
pub struct SqliteCatalog {
    db: Arc<Database>,
}

impl SqliteCatalog {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PluginAdapter for SqliteCatalog {
    fn name(&self) -> &str {
        "sqlite-catalog"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Catalog
    }

    async fn health_check(&self) -> Result<HealthStatus, VitrinaError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), VitrinaError> {
        self.db.checkpoint().await?;
        debug!("catalog shutdown: WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl CatalogAdapter for SqliteCatalog {
    async fn find_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, VitrinaError> {
        queries::products::find_products(&self.db, filter).await
    }

    async fn get_product(&self, admin_id: &str, id: i64) -> Result<Option<Product>, VitrinaError> {
        queries::products::get_product(&self.db, admin_id, id).await
    }

    async fn list_categories(&self, admin_id: &str) -> Result<Vec<Category>, VitrinaError> {
        queries::categories::list_categories(&self.db, admin_id).await
    }

    async fn find_category_by_title(
        &self,
        admin_id: &str,
        title: &str,
    ) -> Result<Option<Category>, VitrinaError> {
        queries::categories::find_category_by_title(&self.db, admin_id, title).await
    }

    async fn create_category(&self, admin_id: &str, title: &str) -> Result<Category, VitrinaError> {
        queries::categories::create_category(&self.db, admin_id, title).await
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product, VitrinaError> {
        let created = queries::products::create_product(&self.db, product).await?;
        debug!(id = created.id, state = %created.state, "product created");
        Ok(created)
    }

    async fn update_product(
        &self,
        admin_id: &str,
        id: i64,
        patch: ProductPatch,
    ) -> Result<Product, VitrinaError> {
        queries::products::update_product(&self.db, admin_id, id, patch)
            .await?
            .ok_or_else(|| VitrinaError::NotFound {
                entity: "product",
                id: id.to_string(),
            })
    }

    async fn soft_delete_product(&self, admin_id: &str, id: i64) -> Result<(), VitrinaError> {
        if queries::products::soft_delete_product(&self.db, admin_id, id).await? {
            debug!(id, "product soft-deleted");
            Ok(())
        } else {
            Err(VitrinaError::NotFound {
                entity: "product",
                id: id.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrina_core::ProductState;

    async fn catalog() -> SqliteCatalog {
        SqliteCatalog::new(Arc::new(Database::open_in_memory().await.unwrap()))
    }

    fn new_product(title: &str, stock: i64, category_id: Option<i64>) -> NewProduct {
        NewProduct {
            admin_id: "store-1".into(),
            title: title.into(),
            description: format!("{title} descripción"),
            price: 1000.0,
            stock,
            category_id,
            images: vec![format!("https://cdn.example.com/{title}.jpg")],
            state: ProductState::Active,
        }
    }

    fn filter() -> ProductFilter {
        ProductFilter {
            admin_id: "store-1".into(),
            limit: 10,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn implements_plugin_adapter() {
        let catalog = catalog().await;
        assert_eq!(catalog.adapter_type(), AdapterType::Catalog);
        assert_eq!(catalog.health_check().await.unwrap(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn create_and_get_round_trip() {
        let catalog = catalog().await;
        let created = catalog
            .create_product(new_product("Cartera", 3, None))
            .await
            .unwrap();
        let fetched = catalog
            .get_product("store-1", created.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.images.len(), 1);
        assert!(catalog.get_product("other-store", created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn search_matches_title_and_category_case_insensitively() {
        let catalog = catalog().await;
        let accesorios = catalog.create_category("store-1", "Accesorios").await.unwrap();
        catalog
            .create_product(new_product("Cartera de cuero", 2, Some(accesorios.id)))
            .await
            .unwrap();
        catalog
            .create_product(new_product("Remera", 10, None))
            .await
            .unwrap();

        let by_title = catalog
            .find_products(&ProductFilter {
                query: Some("CARTERA".into()),
                ..filter()
            })
            .await
            .unwrap();
        assert_eq!(by_title.len(), 1);

        let by_category = catalog
            .find_products(&ProductFilter {
                query: Some("accesorios".into()),
                ..filter()
            })
            .await
            .unwrap();
        assert_eq!(by_category.len(), 1);
        assert_eq!(by_category[0].title, "Cartera de cuero");
    }

    #[tokio::test]
    async fn wildcards_in_query_match_literally() {
        let catalog = catalog().await;
        catalog
            .create_product(new_product("Remera", 10, None))
            .await
            .unwrap();
        let found = catalog
            .find_products(&ProductFilter {
                query: Some("%".into()),
                ..filter()
            })
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn low_stock_filter_and_soft_delete() {
        let catalog = catalog().await;
        let low = catalog
            .create_product(new_product("Gorra", 1, None))
            .await
            .unwrap();
        catalog
            .create_product(new_product("Medias", 40, None))
            .await
            .unwrap();

        let low_stock = catalog
            .find_products(&ProductFilter {
                max_stock: Some(5),
                ..filter()
            })
            .await
            .unwrap();
        assert_eq!(low_stock.len(), 1);
        assert_eq!(low_stock[0].id, low.id);

        catalog.soft_delete_product("store-1", low.id).await.unwrap();
        assert_eq!(catalog.find_products(&filter()).await.unwrap().len(), 1);
        let deleted = catalog.get_product("store-1", low.id).await.unwrap().unwrap();
        assert_eq!(deleted.state, ProductState::Deleted);
    }

    #[tokio::test]
    async fn update_applies_only_present_fields() {
        let catalog = catalog().await;
        let created = catalog
            .create_product(new_product("Cartera", 3, None))
            .await
            .unwrap();
        let updated = catalog
            .update_product(
                "store-1",
                created.id,
                ProductPatch {
                    price: Some(1500.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price, 1500.0);
        assert_eq!(updated.title, "Cartera");
        assert_eq!(updated.stock, 3);
    }

    #[tokio::test]
    async fn update_missing_product_is_not_found() {
        let catalog = catalog().await;
        let err = catalog
            .update_product("store-1", 999, ProductPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, VitrinaError::NotFound { entity: "product", .. }));
    }

    #[tokio::test]
    async fn category_lookup_is_case_insensitive_and_create_is_idempotent() {
        let catalog = catalog().await;
        let first = catalog.create_category("store-1", "Calzado").await.unwrap();
        let again = catalog.create_category("store-1", "calzado").await.unwrap();
        assert_eq!(first.id, again.id);
        let found = catalog
            .find_category_by_title("store-1", "CALZADO")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, first.id);
        assert_eq!(catalog.list_categories("store-1").await.unwrap().len(), 1);
    }
}
