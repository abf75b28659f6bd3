// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row mapping for storage entities.
//!
//! The canonical types live in `syllabind-core::types`; this module converts
//! rows into them.

use std::str::FromStr;

use rusqlite::Row;
use rusqlite::types::Type;

pub use syllabind_core::types::{AuthIdentity, Step, StepDraft, StepType, Syllabind, Week};

/// Column list matching [`step_from_row`].
pub(crate) const STEP_COLUMNS: &str = "id, position, step_type, title, url, note, author, \
     creation_date, media_type, prompt_text, estimated_minutes, week_id";

/// Column list matching [`syllabind_from_row`].
pub(crate) const SYLLABIND_COLUMNS: &str =
    "id, title, description, audience_level, duration_weeks, creator_id";

pub(crate) fn syllabind_from_row(row: &Row<'_>) -> rusqlite::Result<Syllabind> {
    Ok(Syllabind {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        audience_level: row.get(3)?,
        duration_weeks: row.get(4)?,
        creator_id: row.get(5)?,
    })
}

/// Maps a step row. Returns the owning week id alongside the step.
pub(crate) fn step_from_row(row: &Row<'_>) -> rusqlite::Result<(i64, Step)> {
    let raw_type: String = row.get(2)?;
    let step_type = StepType::from_str(&raw_type)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    let step = Step {
        id: row.get(0)?,
        position: row.get(1)?,
        draft: StepDraft {
            step_type,
            title: row.get(3)?,
            url: row.get(4)?,
            note: row.get(5)?,
            author: row.get(6)?,
            creation_date: row.get(7)?,
            media_type: row.get(8)?,
            prompt_text: row.get(9)?,
            estimated_minutes: row.get(10)?,
        },
    };
    Ok((row.get(11)?, step))
}
