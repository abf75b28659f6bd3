// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! URL-repair phase: find links for readings saved without one.

use std::collections::HashSet;
use std::ops::ControlFlow;

use syllabind_core::SyllabindStore;
use syllabind_core::types::{ContentBlock, ProviderMessage};
use tracing::{debug, info, warn};

use crate::events::GenerationEvent;
use crate::prompts;
use crate::session::{Flow, GenerationSession, ModelRole, SessionOutcome};
use crate::tools::{ToolInvocation, ToolSet};

impl GenerationSession {
    /// Never fails the session except on cancellation or an exhausted
    /// rate-limit budget.
    pub(crate) async fn repair_urls(&mut self) -> Flow {
        let weeks = match self.ctx.store.list_weeks(self.syllabind.id).await {
            Ok(weeks) => weeks,
            Err(e) => {
                warn!(syllabind_id = self.syllabind.id, error = %e, "skipping url repair, weeks unavailable");
                return ControlFlow::Continue(());
            }
        };
        let candidates: Vec<(u32, &_)> = weeks
            .iter()
            .flat_map(|w| w.steps.iter().map(move |s| (w.week_index, s)))
            .filter(|(_, s)| s.draft.needs_url())
            .collect();
        if candidates.is_empty() {
            debug!(syllabind_id = self.syllabind.id, "every reading has a url");
            return ControlFlow::Continue(());
        }

        let mut pending: HashSet<i64> = candidates.iter().map(|(_, s)| s.id).collect();
        info!(syllabind_id = self.syllabind.id, count = pending.len(), "repairing missing urls");
        self.sink
            .emit(GenerationEvent::UrlRepairStarted {
                count: pending.len(),
            })
            .await;

        let system = prompts::repair_system();
        let mut history = vec![ProviderMessage::user_text(prompts::repair_user(
            &self.syllabind,
            &candidates,
        ))];
        let mut retries = 0;

        for iteration in 1..=self.ctx.settings.max_repair_iterations {
            if self.cancel.is_cancelled() {
                return ControlFlow::Break(SessionOutcome::Cancelled);
            }
            let turn = match self
                .turn(
                    ModelRole::Generation,
                    &system,
                    &history,
                    ToolSet::Repair,
                    &mut retries,
                )
                .await
            {
                Ok(Some(turn)) => turn,
                Ok(None) => return ControlFlow::Break(SessionOutcome::Cancelled),
                Err(e) if e.is_rate_limit() => {
                    return ControlFlow::Break(self.abort(None, &e).await);
                }
                Err(e) => {
                    warn!(syllabind_id = self.syllabind.id, iteration, error = %e, "url repair turn failed");
                    break;
                }
            };
            history.push(turn.assistant_message());

            if turn.tool_calls.is_empty() {
                debug!(iteration, "repair ended without provide_urls");
                break;
            }

            let mut results = Vec::new();
            let mut provided = false;
            for call in &turn.tool_calls {
                match ToolInvocation::parse(&call.name, &call.input) {
                    Ok(ToolInvocation::WebSearch(input)) => {
                        self.sink
                            .emit(GenerationEvent::Searching { query: input.query })
                            .await;
                        if !call.server_side {
                            results.push(ContentBlock::ToolResult {
                                tool_use_id: call.id.clone(),
                                content: "Search noted.".into(),
                                is_error: None,
                            });
                        }
                    }
                    Ok(ToolInvocation::ProvideUrls(input)) => {
                        provided = true;
                        for assignment in input.urls {
                            let url = assignment.url.trim();
                            if url.is_empty() || !pending.contains(&assignment.step_id) {
                                warn!(step_id = assignment.step_id, "ignoring url for a step that is not awaiting one");
                                continue;
                            }
                            match self.ctx.store.update_step_url(assignment.step_id, url).await {
                                Ok(true) => {
                                    pending.remove(&assignment.step_id);
                                    self.sink
                                        .emit(GenerationEvent::StepUrlRepaired {
                                            step_id: assignment.step_id,
                                            url: url.to_string(),
                                        })
                                        .await;
                                }
                                Ok(false) => warn!(step_id = assignment.step_id, "step vanished before its url was saved"),
                                Err(e) => warn!(step_id = assignment.step_id, error = %e, "could not save repaired url"),
                            }
                        }
                    }
                    Ok(_) | Err(_) => {
                        results.push(ContentBlock::ToolResult {
                            tool_use_id: call.id.clone(),
                            content: format!("{} is not usable here; call provide_urls.", call.name),
                            is_error: Some(true),
                        });
                    }
                }
            }

            if provided || self.cancel.is_cancelled() {
                break;
            }
            if !results.is_empty() {
                history.push(ProviderMessage::tool_results(results));
            } else if !turn.is_paused() {
                history.push(ProviderMessage::user_text(
                    "Call provide_urls now with every url you found.",
                ));
            }
        }

        if self.cancel.is_cancelled() {
            return ControlFlow::Break(SessionOutcome::Cancelled);
        }
        info!(syllabind_id = self.syllabind.id, unresolved = pending.len(), "url repair finished");
        self.sink.emit(GenerationEvent::UrlRepairComplete {}).await;
        ControlFlow::Continue(())
    }
}
