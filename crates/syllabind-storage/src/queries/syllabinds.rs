// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Syllabind reads, plus inserts used by tooling and tests.

use rusqlite::params;
use syllabind_core::SyllabindError;

use crate::database::{Database, map_tr_err};
use crate::models::{SYLLABIND_COLUMNS, Syllabind, syllabind_from_row};

/// Get a syllabind by id.
pub async fn get_syllabind(db: &Database, id: i64) -> Result<Option<Syllabind>, SyllabindError> {
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {SYLLABIND_COLUMNS} FROM syllabinds WHERE id = ?1");
            match conn.query_row(&sql, params![id], syllabind_from_row) {
                Ok(s) => Ok(Some(s)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a syllabind and return it with its assigned id.
pub async fn insert_syllabind(
    db: &Database,
    title: &str,
    description: &str,
    audience_level: &str,
    duration_weeks: u32,
    creator_id: &str,
) -> Result<Syllabind, SyllabindError> {
    let mut syllabind = Syllabind {
        id: 0,
        title: title.to_string(),
        description: description.to_string(),
        audience_level: audience_level.to_string(),
        duration_weeks,
        creator_id: creator_id.to_string(),
    };
    let row = syllabind.clone();
    syllabind.id = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO syllabinds (title, description, audience_level, duration_weeks, creator_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    row.title,
                    row.description,
                    row.audience_level,
                    row.duration_weeks,
                    row.creator_id,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)?;
    Ok(syllabind)
}
