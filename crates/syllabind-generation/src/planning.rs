// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Planning phase: one forced `plan_curriculum` call.

use std::collections::BTreeMap;
use std::ops::ControlFlow;

use syllabind_core::types::{ProviderMessage, WeekPlan};
use tracing::{debug, warn};

use crate::events::GenerationEvent;
use crate::prompts;
use crate::session::{Flow, GenerationSession, ModelRole, SessionOutcome};
use crate::tools::{PLAN_CURRICULUM, PlannedWeek, ToolInvocation, ToolSet};

/// Turns whatever the model proposed into exactly one entry per week
/// `1..=duration`, in order.
///
/// Entries outside the range are dropped, the first entry for an index wins,
/// and missing weeks get an empty title and description.
pub fn normalize_plan(proposed: Vec<PlannedWeek>, duration: u32) -> Vec<WeekPlan> {
    let mut by_index: BTreeMap<u32, WeekPlan> = BTreeMap::new();
    for week in proposed {
        let index = match u32::try_from(week.week_index) {
            Ok(index) if (1..=duration).contains(&index) => index,
            _ => {
                debug!(week_index = week.week_index, duration, "ignoring out-of-range planned week");
                continue;
            }
        };
        by_index.entry(index).or_insert(WeekPlan {
            week_index: index,
            title: week.title.trim().to_string(),
            description: week.description.trim().to_string(),
        });
    }

    (1..=duration)
        .map(|index| {
            by_index.remove(&index).unwrap_or(WeekPlan {
                week_index: index,
                title: String::new(),
                description: String::new(),
            })
        })
        .collect()
}

impl GenerationSession {
    pub(crate) async fn plan(&mut self) -> Flow<Vec<WeekPlan>> {
        self.sink.emit(GenerationEvent::PlanningStarted {}).await;

        let history = vec![ProviderMessage::user_text(prompts::planning_user(
            &self.syllabind,
        ))];
        let mut retries = 0;
        let turn = match self
            .turn(
                ModelRole::Planning,
                &prompts::planning_system(),
                &history,
                ToolSet::Planning,
                &mut retries,
            )
            .await
        {
            Ok(Some(turn)) => turn,
            Ok(None) => return ControlFlow::Break(SessionOutcome::Cancelled),
            Err(e) => return ControlFlow::Break(self.abort(None, &e).await),
        };

        let call = turn.client_calls().find(|c| c.name == PLAN_CURRICULUM);
        let proposed = match call.map(|c| ToolInvocation::parse(&c.name, &c.input)) {
            Some(Ok(ToolInvocation::PlanCurriculum(input))) => input.weeks,
            Some(Ok(_)) => Vec::new(),
            Some(Err(e)) => {
                warn!(syllabind_id = self.syllabind.id, error = %e, "malformed plan, continuing without one");
                Vec::new()
            }
            None => {
                warn!(syllabind_id = self.syllabind.id, "model did not plan the curriculum, continuing without a plan");
                Vec::new()
            }
        };

        let plan = normalize_plan(proposed, self.syllabind.duration_weeks);
        debug!(
            syllabind_id = self.syllabind.id,
            titled = plan.iter().filter(|w| !w.title.is_empty()).count(),
            "curriculum planned"
        );
        self.sink
            .emit(GenerationEvent::CurriculumPlanned {
                weeks: plan.clone(),
            })
            .await;
        ControlFlow::Continue(plan)
    }
}
