// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Step rows: inserts within a week write, url updates, and loads.

use rusqlite::{Connection, params};
use syllabind_core::SyllabindError;

use crate::database::{Database, map_tr_err};
use crate::models::{STEP_COLUMNS, Step, StepDraft, step_from_row};

/// Insert one step row. Runs on the connection thread, usually inside the
/// transaction that writes its week.
pub(crate) fn insert_step_row(
    conn: &Connection,
    week_id: i64,
    position: u32,
    draft: &StepDraft,
) -> rusqlite::Result<Step> {
    conn.execute(
        "INSERT INTO steps (week_id, position, step_type, title, url, note, author,
                            creation_date, media_type, prompt_text, estimated_minutes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            week_id,
            position,
            draft.step_type.to_string(),
            draft.title,
            draft.url,
            draft.note,
            draft.author,
            draft.creation_date,
            draft.media_type,
            draft.prompt_text,
            draft.estimated_minutes,
        ],
    )?;
    Ok(Step {
        id: conn.last_insert_rowid(),
        position,
        draft: draft.clone(),
    })
}

/// Set a step's url. Returns false when no such step exists.
pub async fn update_step_url(db: &Database, step_id: i64, url: &str) -> Result<bool, SyllabindError> {
    let url = url.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE steps SET url = ?2 WHERE id = ?1",
                params![step_id, url],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Load the steps of the given weeks, ordered by position. Runs on the
/// connection thread.
pub(crate) fn steps_for_weeks(
    conn: &Connection,
    week_ids: &[i64],
) -> rusqlite::Result<Vec<(i64, Step)>> {
    if week_ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; week_ids.len()].join(", ");
    let sql = format!(
        "SELECT {STEP_COLUMNS} FROM steps WHERE week_id IN ({placeholders})
         ORDER BY week_id, position, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(week_ids.iter()), step_from_row)?;
    rows.collect()
}
