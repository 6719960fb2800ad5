// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and migrations.
//!
//! All statements are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes.

use std::path::Path;

use tokio_rusqlite::Connection;
use tracing::{debug, info};
use vitrina_core::VitrinaError;

use crate::migrations;

/// Handle to the catalog database.
///
/// Shared (behind an `Arc`) by the catalog repository and the SQLite cache.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (creating if needed) the database at `path`, applies PRAGMAs and
    /// runs pending migrations.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, VitrinaError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(VitrinaError::storage)?;
        }

        let conn = Connection::open(path).await.map_err(VitrinaError::storage)?;
        let db = Self { conn };
        db.prepare(wal_mode).await?;
        info!(path, wal_mode, "catalog database opened");
        Ok(db)
    }

    /// Opens a private in-memory database. Used by tests and `check-config`.
    pub async fn open_in_memory() -> Result<Self, VitrinaError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(VitrinaError::storage)?;
        let db = Self { conn };
        db.prepare(false).await?;
        Ok(db)
    }

    async fn prepare(&self, wal_mode: bool) -> Result<(), VitrinaError> {
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                if wal_mode {
                    conn.pragma_update(None, "journal_mode", "WAL")?;
                    conn.pragma_update(None, "synchronous", "NORMAL")?;
                }
                conn.pragma_update(None, "foreign_keys", "ON")?;
                conn.busy_timeout(std::time::Duration::from_secs(5))?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        let applied = self
            .conn
            .call(|conn| -> Result<usize, VitrinaError> { migrations::run_migrations(conn) })
            .await
            .map_err(flatten_call_err)?;
        debug!(applied, "migrations complete");
        Ok(())
    }

    /// Returns the underlying async connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Checkpoints the WAL so the main database file is self-contained.
    pub async fn checkpoint(&self) -> Result<(), VitrinaError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

/// Maps a tokio-rusqlite call error into a storage error.
pub(crate) fn map_tr_err(err: tokio_rusqlite::Error<rusqlite::Error>) -> VitrinaError {
    match err {
        tokio_rusqlite::Error::Error(e) => VitrinaError::storage(e),
        other => VitrinaError::Storage {
            source: other.to_string().into(),
        },
    }
}

/// Unwraps errors raised inside a call closure that already produced a [`VitrinaError`].
pub(crate) fn flatten_call_err(err: tokio_rusqlite::Error<VitrinaError>) -> VitrinaError {
    match err {
        tokio_rusqlite::Error::Error(e) => e,
        other => VitrinaError::Storage {
            source: other.to_string().into(),
        },
    }
}

/// Current time as an RFC 3339 string with millisecond precision.
pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Parses a stored timestamp, surfacing corruption as a conversion error.
pub(crate) fn parse_timestamp(
    idx: usize,
    raw: &str,
) -> Result<chrono::DateTime<chrono::Utc>, rusqlite::Error> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
