// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Category lookups.

use rusqlite::{params, OptionalExtension};
use vitrina_core::{Category, VitrinaError};

use crate::database::{map_tr_err, now_rfc3339, Database};

/// List a store's categories ordered by title.
pub async fn list_categories(db: &Database, admin_id: &str) -> Result<Vec<Category>, VitrinaError> {
    let admin_id = admin_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, admin_id, title FROM categories
                 WHERE admin_id = ?1 ORDER BY title COLLATE NOCASE",
            )?;
            let rows = stmt.query_map(params![admin_id], |row| {
                Ok(Category {
                    id: row.get(0)?,
                    admin_id: row.get(1)?,
                    title: row.get(2)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Case-insensitive exact title lookup.
pub async fn find_category_by_title(
    db: &Database,
    admin_id: &str,
    title: &str,
) -> Result<Option<Category>, VitrinaError> {
    let admin_id = admin_id.to_string();
    let title = title.trim().to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, admin_id, title FROM categories
                 WHERE admin_id = ?1 AND title = ?2 COLLATE NOCASE",
                params![admin_id, title],
                |row| {
                    Ok(Category {
                        id: row.get(0)?,
                        admin_id: row.get(1)?,
                        title: row.get(2)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Create a category, or return the existing one with the same title.
pub async fn create_category(
    db: &Database,
    admin_id: &str,
    title: &str,
) -> Result<Category, VitrinaError> {
    let admin_id = admin_id.to_string();
    let title = title.trim().to_string();
    let now = now_rfc3339();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO categories (admin_id, title, created_at)
                 VALUES (?1, ?2, ?3)",
                params![admin_id, title, now],
            )?;
            conn.query_row(
                "SELECT id, admin_id, title FROM categories
                 WHERE admin_id = ?1 AND title = ?2 COLLATE NOCASE",
                params![admin_id, title],
                |row| {
                    Ok(Category {
                        id: row.get(0)?,
                        admin_id: row.get(1)?,
                        title: row.get(2)?,
                    })
                },
            )
        })
        .await
        .map_err(map_tr_err)
}
