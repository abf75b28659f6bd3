// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Week reads, replacement, and pruning.
//!
//! Weeks are unique per `(syllabind_id, week_index)`. Replacing a week keeps
//! the row id and rewrites its steps in the same transaction, so a stored week
//! is either the old one or the complete new one.

use rusqlite::{Connection, params};
use syllabind_core::SyllabindError;

use crate::database::{Database, map_tr_err};
use crate::models::{StepDraft, Week};
use crate::queries::steps::{insert_step_row, steps_for_weeks};

fn weeks_with_steps(
    conn: &Connection,
    syllabind_id: i64,
    week_index: Option<u32>,
) -> rusqlite::Result<Vec<Week>> {
    let mut stmt = conn.prepare(
        "SELECT id, syllabind_id, week_index, title, description FROM weeks
         WHERE syllabind_id = ?1 AND (?2 IS NULL OR week_index = ?2)
         ORDER BY week_index",
    )?;
    let mut weeks = stmt
        .query_map(params![syllabind_id, week_index], |row| {
            Ok(Week {
                id: row.get(0)?,
                syllabind_id: row.get(1)?,
                week_index: row.get(2)?,
                title: row.get(3)?,
                description: row.get(4)?,
                steps: Vec::new(),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let ids: Vec<i64> = weeks.iter().map(|w| w.id).collect();
    for (week_id, step) in steps_for_weeks(conn, &ids)? {
        if let Some(week) = weeks.iter_mut().find(|w| w.id == week_id) {
            week.steps.push(step);
        }
    }
    Ok(weeks)
}

/// List a syllabind's weeks with their steps, ordered by week index.
pub async fn list_weeks(db: &Database, syllabind_id: i64) -> Result<Vec<Week>, SyllabindError> {
    db.connection()
        .call(move |conn| weeks_with_steps(conn, syllabind_id, None))
        .await
        .map_err(map_tr_err)
}

/// Get one week with its steps.
pub async fn get_week(
    db: &Database,
    syllabind_id: i64,
    week_index: u32,
) -> Result<Option<Week>, SyllabindError> {
    db.connection()
        .call(move |conn| {
            Ok(weeks_with_steps(conn, syllabind_id, Some(week_index))?
                .into_iter()
                .next())
        })
        .await
        .map_err(map_tr_err)
}

/// Create or replace a week together with its steps.
///
/// The week row, the removal of its old steps, and every new step share one
/// transaction. A failing step insert rolls the whole week back.
pub async fn replace_week(
    db: &Database,
    syllabind_id: i64,
    week_index: u32,
    title: &str,
    description: &str,
    steps: &[StepDraft],
) -> Result<Week, SyllabindError> {
    let title = title.to_string();
    let description = description.to_string();
    let drafts = steps.to_vec();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let id: i64 = tx.query_row(
                "INSERT INTO weeks (syllabind_id, week_index, title, description)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (syllabind_id, week_index) DO UPDATE SET
                     title = excluded.title,
                     description = excluded.description,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
                 RETURNING id",
                params![syllabind_id, week_index, title, description],
                |row| row.get(0),
            )?;
            tx.execute("DELETE FROM steps WHERE week_id = ?1", params![id])?;
            let mut steps = Vec::with_capacity(drafts.len());
            for (position, draft) in (1u32..).zip(drafts.iter()) {
                steps.push(insert_step_row(&tx, id, position, draft)?);
            }
            tx.commit()?;

            Ok(Week {
                id,
                syllabind_id,
                week_index,
                title,
                description,
                steps,
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Delete weeks (and, by cascade, their steps) past `max_index`.
pub async fn prune_weeks_after(
    db: &Database,
    syllabind_id: i64,
    max_index: u32,
) -> Result<u64, SyllabindError> {
    db.connection()
        .call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM weeks WHERE syllabind_id = ?1 AND week_index > ?2",
                params![syllabind_id, max_index],
            )?;
            Ok(removed as u64)
        })
        .await
        .map_err(map_tr_err)
}
