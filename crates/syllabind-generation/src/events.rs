// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Progress events and the channel they travel on.
//!
//! Events serialize to the wire frame `{"type": ..., "data": {...}}` directly;
//! the gateway forwards them without reshaping.

use serde::{Deserialize, Serialize};
use syllabind_core::types::{Step, Week, WeekPlan};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A progress event emitted by a generation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum GenerationEvent {
    PlanningStarted {},
    CurriculumPlanned {
        weeks: Vec<WeekPlan>,
    },
    WeekStarted {
        week_index: u32,
    },
    Searching {
        query: String,
    },
    WeekInfo {
        week_index: u32,
        title: String,
        description: String,
    },
    StepCompleted {
        week_index: u32,
        step: Step,
    },
    WeekCompleted {
        week: Week,
    },
    WeekRegenerationComplete {
        week: Week,
    },
    UrlRepairStarted {
        count: usize,
    },
    StepUrlRepaired {
        step_id: i64,
        url: String,
    },
    UrlRepairComplete {},
    RateLimitWait {
        reset_in: u64,
    },
    GenerationComplete {},
    GenerationError {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        week_index: Option<u32>,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_rate_limit: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reset_in: Option<u64>,
    },
    /// Connection-level failure, sent by the gateway before closing.
    Error {
        message: String,
    },
    /// Authoritative persisted state, re-read after an error.
    SyllabindRefreshed {
        weeks: Vec<Week>,
    },
}

impl GenerationEvent {
    /// A `generation_error` that is not about throttling.
    pub fn error(week_index: Option<u32>, message: impl Into<String>) -> Self {
        GenerationEvent::GenerationError {
            week_index,
            message: message.into(),
            is_rate_limit: None,
            reset_in: None,
        }
    }
}

/// Sending half of a session's event channel.
///
/// A closed receiver means nobody is listening any more, which the session
/// treats exactly like a client cancel.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<GenerationEvent>,
    cancel: CancellationToken,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<GenerationEvent>, cancel: CancellationToken) -> Self {
        Self { tx, cancel }
    }

    /// Creates a bounded channel and its sink.
    pub fn channel(
        buffer: usize,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Receiver<GenerationEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(tx, cancel), rx)
    }

    /// Sends an event, waiting for buffer space.
    pub async fn emit(&self, event: GenerationEvent) {
        if self.cancel.is_cancelled() {
            return;
        }
        if self.tx.send(event).await.is_err() {
            debug!("event receiver dropped, cancelling generation");
            self.cancel.cancel();
        }
    }
}
