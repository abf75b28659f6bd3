// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One generation run, from planning through URL repair.
//!
//! A session owns its conversation state and the rate-limit countdown. It is
//! driven to completion by [`GenerationSession::run`] on its own task and
//! reports progress only through its [`EventSink`].

use std::collections::HashSet;
use std::ops::ControlFlow;
use std::time::Duration;

use syllabind_core::{SyllabindError, SyllabindStore};
use syllabind_core::types::{ProviderMessage, Syllabind, WeekPlan};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::GenerationContext;
use crate::driver::{CompletedTurn, ConversationDriver};
use crate::events::{EventSink, GenerationEvent};
use crate::rate_limit::RateLimitController;
use crate::tools::ToolSet;

/// What a session generates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// Plan and fill every week, then repair missing urls.
    Full,
    /// Refill one week (1-based index), keeping every other week.
    RegenerateWeek(u32),
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// `generation_complete` was sent.
    Completed,
    /// Stopped by the client.
    Cancelled,
    /// A `generation_error` ended the run early.
    Aborted,
}

/// Which model a turn runs on.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ModelRole {
    Planning,
    Generation,
}

/// Phase result: keep going, or end the session with an outcome.
pub(crate) type Flow<T = ()> = ControlFlow<SessionOutcome, T>;

pub struct GenerationSession {
    pub(crate) ctx: GenerationContext,
    pub(crate) driver: ConversationDriver,
    pub(crate) syllabind: Syllabind,
    mode: GenerationMode,
    pub(crate) sink: EventSink,
    pub(crate) cancel: CancellationToken,
    rate_limit: RateLimitController,
    emitted_steps: HashSet<i64>,
}

impl GenerationSession {
    pub fn new(
        ctx: GenerationContext,
        syllabind: Syllabind,
        mode: GenerationMode,
        sink: EventSink,
        cancel: CancellationToken,
    ) -> Self {
        let driver = ConversationDriver::new(ctx.provider.clone(), ctx.settings.clone());
        let rate_limit = RateLimitController::new(sink.clone());
        Self {
            ctx,
            driver,
            syllabind,
            mode,
            sink,
            cancel,
            rate_limit,
            emitted_steps: HashSet::new(),
        }
    }

    pub fn mode(&self) -> GenerationMode {
        self.mode
    }

    /// Runs the session to the end.
    ///
    /// Per-week and provider failures are reported as events and end in
    /// `Ok`; only storage failures outside a week surface as `Err`.
    pub async fn run(mut self) -> Result<SessionOutcome, SyllabindError> {
        info!(
            syllabind_id = self.syllabind.id,
            mode = ?self.mode,
            duration_weeks = self.syllabind.duration_weeks,
            "generation session started"
        );
        let result = match self.mode {
            GenerationMode::Full => self.run_full().await,
            GenerationMode::RegenerateWeek(week_index) => self.run_regeneration(week_index).await,
        };
        self.rate_limit.cancel();
        match &result {
            Ok(outcome) => info!(syllabind_id = self.syllabind.id, ?outcome, "generation session ended"),
            Err(e) => warn!(syllabind_id = self.syllabind.id, error = %e, "generation session failed"),
        }
        result
    }

    async fn run_full(&mut self) -> Result<SessionOutcome, SyllabindError> {
        let duration = self.syllabind.duration_weeks;
        if self.cancel.is_cancelled() {
            return Ok(SessionOutcome::Cancelled);
        }

        let plan = match self.plan().await {
            ControlFlow::Continue(plan) => plan,
            ControlFlow::Break(outcome) => return Ok(outcome),
        };
        if self.cancel.is_cancelled() {
            return Ok(SessionOutcome::Cancelled);
        }

        // A full run rewrites the course from week 1; nothing from an earlier
        // run may outlive a cancellation part way through.
        let cleared = self.ctx.store.prune_weeks_after(self.syllabind.id, 0).await?;
        if cleared > 0 {
            debug!(syllabind_id = self.syllabind.id, cleared, "cleared weeks from previous run");
        }

        for week_index in 1..=duration {
            if self.cancel.is_cancelled() {
                return Ok(SessionOutcome::Cancelled);
            }
            if let ControlFlow::Break(outcome) = self.fill_week(&plan, week_index, None).await {
                return Ok(outcome);
            }
        }

        if self.cancel.is_cancelled() {
            return Ok(SessionOutcome::Cancelled);
        }
        if let ControlFlow::Break(outcome) = self.repair_urls().await {
            return Ok(outcome);
        }

        Ok(self.complete().await)
    }

    async fn run_regeneration(&mut self, week_index: u32) -> Result<SessionOutcome, SyllabindError> {
        if self.cancel.is_cancelled() {
            return Ok(SessionOutcome::Cancelled);
        }
        let weeks = self.ctx.store.list_weeks(self.syllabind.id).await?;
        let last = self.syllabind.duration_weeks.max(week_index);
        let plan: Vec<WeekPlan> = (1..=last)
            .map(|index| match weeks.iter().find(|w| w.week_index == index) {
                Some(week) => WeekPlan {
                    week_index: index,
                    title: week.title.clone(),
                    description: week.description.clone(),
                },
                None => WeekPlan {
                    week_index: index,
                    title: String::new(),
                    description: String::new(),
                },
            })
            .collect();
        let existing = weeks.into_iter().find(|w| w.week_index == week_index);

        if let ControlFlow::Break(outcome) = self.fill_week(&plan, week_index, existing.as_ref()).await
        {
            return Ok(outcome);
        }
        Ok(self.complete().await)
    }

    async fn complete(&self) -> SessionOutcome {
        if self.cancel.is_cancelled() {
            return SessionOutcome::Cancelled;
        }
        self.sink.emit(GenerationEvent::GenerationComplete {}).await;
        SessionOutcome::Completed
    }

    /// Runs one provider turn, waiting out rate limits.
    ///
    /// Returns `Ok(None)` when the session was cancelled before, during, or
    /// right after the turn. A rate limit beyond the retry bound is returned
    /// as the error.
    pub(crate) async fn turn(
        &self,
        role: ModelRole,
        system_prompt: &str,
        history: &[ProviderMessage],
        tools: ToolSet,
        retries: &mut u32,
    ) -> Result<Option<CompletedTurn>, SyllabindError> {
        let settings = &self.ctx.settings;
        let model = match role {
            ModelRole::Planning => settings.planning_model.as_str(),
            ModelRole::Generation => settings.generation_model.as_str(),
        };

        loop {
            if self.cancel.is_cancelled() {
                return Ok(None);
            }
            match self
                .driver
                .complete_turn(model, system_prompt, history, tools)
                .await
            {
                Ok(turn) => {
                    if self.cancel.is_cancelled() {
                        debug!("turn finished after cancellation, discarding");
                        return Ok(None);
                    }
                    return Ok(Some(turn));
                }
                Err(SyllabindError::RateLimited {
                    retry_after_secs,
                    message,
                }) => {
                    if *retries >= settings.max_rate_limit_retries {
                        return Err(SyllabindError::RateLimited {
                            retry_after_secs,
                            message,
                        });
                    }
                    *retries += 1;
                    let wait = retry_after_secs.unwrap_or(settings.default_rate_limit_reset_secs);
                    warn!(
                        syllabind_id = self.syllabind.id,
                        attempt = *retries,
                        wait_secs = wait,
                        %message,
                        "provider rate limit hit"
                    );
                    if !self
                        .rate_limit
                        .wait(Duration::from_secs(wait), &self.cancel)
                        .await?
                    {
                        return Ok(None);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// The `generation_error` event for `err`.
    pub(crate) fn error_event(&self, week_index: Option<u32>, err: &SyllabindError) -> GenerationEvent {
        match err {
            SyllabindError::RateLimited {
                retry_after_secs, ..
            } => GenerationEvent::GenerationError {
                week_index,
                message: err.to_string(),
                is_rate_limit: Some(true),
                reset_in: Some(
                    retry_after_secs.unwrap_or(self.ctx.settings.default_rate_limit_reset_secs),
                ),
            },
            other => GenerationEvent::error(week_index, other.to_string()),
        }
    }

    /// Reports an error that ends the session, then reconciles.
    pub(crate) async fn abort(&self, week_index: Option<u32>, err: &SyllabindError) -> SessionOutcome {
        warn!(syllabind_id = self.syllabind.id, ?week_index, error = %err, "generation aborted");
        self.sink.emit(self.error_event(week_index, err)).await;
        self.reconcile().await;
        SessionOutcome::Aborted
    }

    /// Re-reads persisted weeks and sends them to the client.
    pub(crate) async fn reconcile(&self) {
        match self.ctx.store.list_weeks(self.syllabind.id).await {
            Ok(weeks) => {
                self.sink
                    .emit(GenerationEvent::SyllabindRefreshed { weeks })
                    .await;
            }
            Err(e) => warn!(
                syllabind_id = self.syllabind.id,
                error = %e,
                "could not reload weeks after error"
            ),
        }
    }

    /// Records a step id; false if it was already reported.
    pub(crate) fn first_emission(&mut self, step_id: i64) -> bool {
        self.emitted_steps.insert(step_id)
    }
}
