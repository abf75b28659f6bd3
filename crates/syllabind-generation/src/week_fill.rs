// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Week-fill phase: a bounded tool loop that ends in `finalize_week`.

use std::ops::ControlFlow;

use syllabind_core::{SyllabindError, SyllabindStore};
use syllabind_core::types::{ContentBlock, ProviderMessage, Week, WeekPlan};
use tracing::{debug, info, warn};

use crate::GenerationMode;
use crate::driver::ToolCall;
use crate::events::GenerationEvent;
use crate::prompts;
use crate::session::{Flow, GenerationSession, ModelRole, SessionOutcome};
use crate::tools::{FINALIZE_WEEK, FinalizeWeekInput, ToolInvocation, ToolSet};

const SEARCH_ACK: &str =
    "Search noted. Results come from the provider's search tool; continue with what you found.";

fn tool_result(call: &ToolCall, content: impl Into<String>, is_error: bool) -> ContentBlock {
    ContentBlock::ToolResult {
        tool_use_id: call.id.clone(),
        content: content.into(),
        is_error: is_error.then_some(true),
    }
}

/// First non-blank candidate, trimmed.
fn first_non_blank<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

impl GenerationSession {
    /// Fills one week. A failed week is reported and isolated; only
    /// cancellation or a provider failure breaks out of the session.
    pub(crate) async fn fill_week(
        &mut self,
        plan: &[WeekPlan],
        week_index: u32,
        existing: Option<&Week>,
    ) -> Flow {
        self.sink
            .emit(GenerationEvent::WeekStarted { week_index })
            .await;
        info!(syllabind_id = self.syllabind.id, week_index, "filling week");

        let max_iterations = self.ctx.settings.max_week_iterations;
        let system = prompts::week_system();
        let mut history = vec![ProviderMessage::user_text(prompts::week_user(
            &self.syllabind,
            plan,
            week_index,
            existing,
        ))];
        let mut retries = 0;
        let mut last_error: Option<String> = None;

        for iteration in 1..=max_iterations {
            if self.cancel.is_cancelled() {
                return ControlFlow::Break(SessionOutcome::Cancelled);
            }

            let turn = match self
                .turn(
                    ModelRole::Generation,
                    &system,
                    &history,
                    ToolSet::Generation,
                    &mut retries,
                )
                .await
            {
                Ok(Some(turn)) => turn,
                Ok(None) => return ControlFlow::Break(SessionOutcome::Cancelled),
                Err(e) => return ControlFlow::Break(self.abort(Some(week_index), &e).await),
            };
            history.push(turn.assistant_message());

            if turn.tool_calls.is_empty() {
                let message = format!("week {week_index} stalled: the model stopped without finalizing the week");
                warn!(syllabind_id = self.syllabind.id, week_index, iteration, "week stalled");
                self.sink
                    .emit(GenerationEvent::error(Some(week_index), message))
                    .await;
                self.reconcile().await;
                return ControlFlow::Continue(());
            }

            let mut results = Vec::new();
            let mut finalized: Option<Week> = None;
            for call in &turn.tool_calls {
                match ToolInvocation::parse(&call.name, &call.input) {
                    Ok(ToolInvocation::WebSearch(input)) => {
                        debug!(week_index, query = %input.query, server_side = call.server_side, "web search");
                        self.sink
                            .emit(GenerationEvent::Searching { query: input.query })
                            .await;
                        if !call.server_side {
                            results.push(tool_result(call, SEARCH_ACK, false));
                        }
                    }
                    Ok(ToolInvocation::FinalizeWeek(input)) => {
                        if finalized.is_some() {
                            results.push(tool_result(call, "This week is already finalized.", true));
                            continue;
                        }
                        if let Err(e) = input.validate() {
                            debug!(week_index, iteration, error = %e, "rejected finalize_week");
                            results.push(tool_result(call, e.to_string(), true));
                            last_error = Some(e.to_string());
                            continue;
                        }
                        match self.persist_week(plan, week_index, existing, input).await {
                            Ok(week) => finalized = Some(week),
                            Err(e) => {
                                warn!(syllabind_id = self.syllabind.id, week_index, error = %e, "could not save week");
                                self.sink
                                    .emit(self.error_event(Some(week_index), &e))
                                    .await;
                                self.reconcile().await;
                                return ControlFlow::Continue(());
                            }
                        }
                    }
                    Ok(ToolInvocation::Unknown { name }) => {
                        results.push(tool_result(call, format!("Unknown tool: {name}"), true));
                    }
                    Ok(_) => {
                        results.push(tool_result(
                            call,
                            format!("{} is not available while building a week.", call.name),
                            true,
                        ));
                    }
                    Err(e) => {
                        if call.name == FINALIZE_WEEK {
                            last_error = Some(e.to_string());
                        }
                        results.push(tool_result(call, e.to_string(), true));
                    }
                }
            }

            if let Some(week) = finalized {
                let event = match self.mode() {
                    GenerationMode::Full => GenerationEvent::WeekCompleted { week },
                    GenerationMode::RegenerateWeek(_) => {
                        GenerationEvent::WeekRegenerationComplete { week }
                    }
                };
                self.sink.emit(event).await;
                info!(syllabind_id = self.syllabind.id, week_index, iteration, "week finalized");
                return ControlFlow::Continue(());
            }

            if self.cancel.is_cancelled() {
                return ControlFlow::Break(SessionOutcome::Cancelled);
            }

            if !results.is_empty() {
                history.push(ProviderMessage::tool_results(results));
            } else if !turn.is_paused() {
                history.push(ProviderMessage::user_text(prompts::FINALIZE_NUDGE));
            }
        }

        let reason = last_error.unwrap_or_else(|| "no valid finalize_week call".to_string());
        warn!(syllabind_id = self.syllabind.id, week_index, %reason, "week iteration limit reached");
        self.sink
            .emit(GenerationEvent::error(
                Some(week_index),
                format!("week {week_index} was not finalized after {max_iterations} turns: {reason}"),
            ))
            .await;
        self.reconcile().await;
        ControlFlow::Continue(())
    }

    /// Saves a validated week, then reports each newly stored step.
    async fn persist_week(
        &mut self,
        plan: &[WeekPlan],
        week_index: u32,
        existing: Option<&Week>,
        input: FinalizeWeekInput,
    ) -> Result<Week, SyllabindError> {
        let planned = plan.iter().find(|w| w.week_index == week_index);
        let title = first_non_blank([
            input.title.as_deref(),
            existing.map(|w| w.title.as_str()),
            planned.map(|w| w.title.as_str()),
        ])
        .unwrap_or_else(|| format!("Week {week_index}"));
        let description = first_non_blank([
            input.description.as_deref(),
            existing.map(|w| w.description.as_str()),
            planned.map(|w| w.description.as_str()),
        ])
        .unwrap_or_default();

        self.sink
            .emit(GenerationEvent::WeekInfo {
                week_index,
                title: title.clone(),
                description: description.clone(),
            })
            .await;

        let week = self
            .ctx
            .store
            .replace_week(self.syllabind.id, week_index, &title, &description, &input.steps)
            .await?;
        for step in &week.steps {
            if self.first_emission(step.id) {
                self.sink
                    .emit(GenerationEvent::StepCompleted {
                        week_index,
                        step: step.clone(),
                    })
                    .await;
            }
        }
        Ok(week)
    }
}
