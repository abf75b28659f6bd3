// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage trait for syllabind, week, and step rows.

use async_trait::async_trait;

use crate::error::SyllabindError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{StepDraft, Syllabind, Week};

/// Persistence interface used by the generation pipeline.
///
/// Weeks are keyed by `(syllabind_id, week_index)`; writing a week that
/// already exists replaces its title, description, and steps rather than
/// adding a second row.
#[async_trait]
pub trait SyllabindStore: PluginAdapter {
    /// Initializes the backend (migrations, connections).
    async fn initialize(&self) -> Result<(), SyllabindError>;

    /// Flushes pending writes and releases connections.
    async fn close(&self) -> Result<(), SyllabindError>;

    /// Loads a syllabind by id.
    async fn get_syllabind(&self, id: i64) -> Result<Option<Syllabind>, SyllabindError>;

    /// Lists persisted weeks with their steps, ordered by week index.
    async fn list_weeks(&self, syllabind_id: i64) -> Result<Vec<Week>, SyllabindError>;

    /// Loads one week with its steps.
    async fn get_week(
        &self,
        syllabind_id: i64,
        week_index: u32,
    ) -> Result<Option<Week>, SyllabindError>;

    /// Writes a week and its steps in one transaction.
    ///
    /// An existing week at `week_index` keeps its id; its title, description,
    /// and steps are replaced. Steps take positions `1..=steps.len()` in
    /// slice order. On error nothing is written, so a previously stored week
    /// stays as it was.
    async fn replace_week(
        &self,
        syllabind_id: i64,
        week_index: u32,
        title: &str,
        description: &str,
        steps: &[StepDraft],
    ) -> Result<Week, SyllabindError>;

    /// Sets the url of a step. Returns false if the step does not exist.
    async fn update_step_url(&self, step_id: i64, url: &str) -> Result<bool, SyllabindError>;

    /// Deletes weeks whose index is greater than `max_index`. Returns the count removed.
    async fn prune_weeks_after(
        &self,
        syllabind_id: i64,
        max_index: u32,
    ) -> Result<u64, SyllabindError>;
}
