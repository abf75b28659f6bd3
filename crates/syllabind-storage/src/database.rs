// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! `Database` wraps the only connection; query modules accept `&Database` and
//! go through [`Database::connection`]. Do NOT open additional connections for
//! writes.

use std::path::Path;

use syllabind_core::SyllabindError;
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::migrations;

/// Owner of the single SQLite connection.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (creating if needed) the database at `path`, applies PRAGMAs, and
    /// runs pending migrations.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, SyllabindError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(SyllabindError::storage)?;
            }
        }

        let conn = Connection::open(path)
            .await
            .map_err(|e| map_tr_err(tokio_rusqlite::Error::Error(e)))?;

        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            if wal_mode {
                conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            }
            conn.execute_batch(
                "PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;
                 PRAGMA synchronous = NORMAL;",
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(|conn| migrations::run_migrations(conn))
            .await
            .map_err(|e| match e {
                tokio_rusqlite::Error::Error(inner) => inner,
                other => SyllabindError::Internal(format!("migration call failed: {other}")),
            })?;

        debug!(path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Converts tokio-rusqlite errors into [`SyllabindError::Storage`].
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error) -> SyllabindError {
    match e {
        tokio_rusqlite::Error::Error(inner) => SyllabindError::storage(inner),
        other => SyllabindError::Storage {
            source: other.to_string().into(),
        },
    }
}
