// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key-value rows with millisecond expiry.
//!
//! Rows whose `expires_at` is not in the future are treated as absent.

use rusqlite::{params, OptionalExtension};
use vitrina_core::VitrinaError;

use crate::database::{map_tr_err, Database};

/// Current unix time in milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub async fn get(db: &Database, key: &str, now: i64) -> Result<Option<String>, VitrinaError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT value FROM kv_cache WHERE key = ?1 AND expires_at > ?2",
                params![key, now],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set(
    db: &Database,
    key: &str,
    value: &str,
    expires_at: i64,
) -> Result<(), VitrinaError> {
    let key = key.to_string();
    let value = value.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO kv_cache (key, value, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                expires_at = excluded.expires_at",
                params![key, value, expires_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Insert only if no live row exists. Both statements run on the single
/// writer thread, so no other call can interleave.
pub async fn set_nx(
    db: &Database,
    key: &str,
    value: &str,
    now: i64,
    expires_at: i64,
) -> Result<bool, VitrinaError> {
    let key = key.to_string();
    let value = value.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM kv_cache WHERE key = ?1 AND expires_at <= ?2",
                params![key, now],
            )?;
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO kv_cache (key, value, expires_at) VALUES (?1, ?2, ?3)",
                params![key, value, expires_at],
            )?;
            Ok(inserted == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a key. Returns true when the removed row was still live.
pub async fn delete(db: &Database, key: &str, now: i64) -> Result<bool, VitrinaError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| {
            let live = conn.execute(
                "DELETE FROM kv_cache WHERE key = ?1 AND expires_at > ?2",
                params![key, now],
            )?;
            conn.execute("DELETE FROM kv_cache WHERE key = ?1", params![key])?;
            Ok(live > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Live keys starting with `prefix`.
pub async fn keys(db: &Database, prefix: &str, now: i64) -> Result<Vec<String>, VitrinaError> {
    let prefix = prefix.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT key FROM kv_cache
                 WHERE substr(key, 1, length(?1)) = ?1 AND expires_at > ?2
                 ORDER BY key",
            )?;
            let rows = stmt.query_map(params![prefix, now], |row| row.get(0))?;
            rows.collect::<Result<Vec<String>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Remove every expired row. Returns the number removed.
pub async fn purge_expired(db: &Database, now: i64) -> Result<usize, VitrinaError> {
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM kv_cache WHERE expires_at <= ?1", params![now])
        })
        .await
        .map_err(map_tr_err)
}
