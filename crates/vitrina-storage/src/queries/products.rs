// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Product CRUD operations.

use std::str::FromStr;

use rusqlite::{params, OptionalExtension, Row};
use vitrina_core::{NewProduct, Product, ProductFilter, ProductPatch, ProductState, VitrinaError};

use crate::database::{map_tr_err, now_rfc3339, parse_timestamp, Database};

const PRODUCT_COLUMNS: &str = "id, admin_id, title, description, price, stock, category_id, \
                               images, state, created_at, updated_at";

fn product_from_row(row: &Row<'_>) -> Result<Product, rusqlite::Error> {
    let images: String = row.get(7)?;
    let state: String = row.get(8)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;
    Ok(Product {
        id: row.get(0)?,
        admin_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        price: row.get(4)?,
        stock: row.get(5)?,
        category_id: row.get(6)?,
        images: serde_json::from_str(&images).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?,
        state: ProductState::from_str(&state).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?,
        created_at: parse_timestamp(9, &created_at)?,
        updated_at: parse_timestamp(10, &updated_at)?,
    })
}

/// Escapes LIKE wildcards so user text matches literally.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Find non-deleted products matching the filter, most recently updated first.
///
/// The text query matches either the product title or the title of its category.
pub async fn find_products(
    db: &Database,
    filter: &ProductFilter,
) -> Result<Vec<Product>, VitrinaError> {
    let admin_id = filter.admin_id.clone();
    let pattern = filter
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(like_pattern);
    let category_id = filter.category_id;
    let max_stock = filter.max_stock;
    let limit = i64::try_from(filter.limit.max(1)).unwrap_or(i64::MAX);

    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {PRODUCT_COLUMNS} FROM products
                 WHERE admin_id = ?1 AND state != 'deleted'
                   AND (?2 IS NULL
                        OR title LIKE ?2 ESCAPE '\\'
                        OR category_id IN (
                            SELECT id FROM categories
                            WHERE admin_id = ?1 AND title LIKE ?2 ESCAPE '\\'))
                   AND (?3 IS NULL OR category_id = ?3)
                   AND (?4 IS NULL OR stock <= ?4)
                 ORDER BY updated_at DESC, id DESC
                 LIMIT ?5"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                params![admin_id, pattern, category_id, max_stock, limit],
                product_from_row,
            )?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Get a product by id within one store, including deleted products.
pub async fn get_product(
    db: &Database,
    admin_id: &str,
    id: i64,
) -> Result<Option<Product>, VitrinaError> {
    let admin_id = admin_id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE admin_id = ?1 AND id = ?2");
            conn.query_row(&sql, params![admin_id, id], product_from_row)
                .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a product and return the stored row.
pub async fn create_product(db: &Database, product: NewProduct) -> Result<Product, VitrinaError> {
    let images = serde_json::to_string(&product.images)?;
    let now = now_rfc3339();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO products
                    (admin_id, title, description, price, stock, category_id, images, state,
                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                params![
                    product.admin_id,
                    product.title,
                    product.description,
                    product.price,
                    product.stock,
                    product.category_id,
                    images,
                    product.state.to_string(),
                    now,
                ],
            )?;
            let id = conn.last_insert_rowid();
            let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
            conn.query_row(&sql, params![id], product_from_row)
        })
        .await
        .map_err(map_tr_err)
}

/// Apply a partial update. Returns `None` when the product does not exist.
pub async fn update_product(
    db: &Database,
    admin_id: &str,
    id: i64,
    patch: ProductPatch,
) -> Result<Option<Product>, VitrinaError> {
    let admin_id = admin_id.to_string();
    let now = now_rfc3339();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE products SET
                    title = COALESCE(?3, title),
                    description = COALESCE(?4, description),
                    price = COALESCE(?5, price),
                    stock = COALESCE(?6, stock),
                    category_id = COALESCE(?7, category_id),
                    state = COALESCE(?8, state),
                    updated_at = ?9
                 WHERE admin_id = ?1 AND id = ?2",
                params![
                    admin_id,
                    id,
                    patch.title,
                    patch.description,
                    patch.price,
                    patch.stock,
                    patch.category_id,
                    patch.state.map(|s| s.to_string()),
                    now,
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
            let product = tx.query_row(&sql, params![id], product_from_row)?;
            tx.commit()?;
            Ok(Some(product))
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a product as deleted. Returns false when no row matched.
pub async fn soft_delete_product(
    db: &Database,
    admin_id: &str,
    id: i64,
) -> Result<bool, VitrinaError> {
    let admin_id = admin_id.to_string();
    let now = now_rfc3339();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE products SET state = 'deleted', updated_at = ?3
                 WHERE admin_id = ?1 AND id = ?2",
                params![admin_id, id, now],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}
