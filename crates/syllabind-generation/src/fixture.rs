// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic provider for `?mock=true` runs.
//!
//! Answers by looking at the request alone: a forced planning call gets a
//! plan of the configured length, a fresh week conversation gets one search,
//! and any later week turn gets a complete `finalize_week` with urls on every
//! reading. No network is touched.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream;
use serde_json::{Value, json};
use syllabind_core::types::{
    AdapterType, HealthStatus, ProviderRequest, ProviderStreamChunk, TokenUsage,
};
use syllabind_core::{PluginAdapter, ProviderAdapter, ProviderStream, SyllabindError};

use crate::tools::{FINALIZE_WEEK, PLAN_CURRICULUM, WEB_SEARCH};

pub struct FixtureProvider {
    title: String,
    duration_weeks: u32,
    calls: AtomicUsize,
    weeks_finalized: AtomicUsize,
}

impl FixtureProvider {
    pub fn new(title: impl Into<String>, duration_weeks: u32) -> Self {
        Self {
            title: title.into(),
            duration_weeks,
            calls: AtomicUsize::new(0),
            weeks_finalized: AtomicUsize::new(0),
        }
    }

    fn offers(request: &ProviderRequest, tool: &str) -> bool {
        request
            .tools
            .as_deref()
            .unwrap_or_default()
            .iter()
            .any(|t| t["name"] == tool)
    }

    fn plan(&self) -> Value {
        let weeks: Vec<Value> = (1..=self.duration_weeks)
            .map(|i| {
                json!({
                    "weekIndex": i,
                    "title": format!("Week {i}: {} in practice", self.title),
                    "description": format!("Part {i} of {} of {}.", self.duration_weeks, self.title),
                })
            })
            .collect();
        json!({ "weeks": weeks })
    }

    fn week(&self) -> Value {
        let n = self.weeks_finalized.fetch_add(1, Ordering::SeqCst) + 1;
        let reading = |k: u32| {
            json!({
                "type": "reading",
                "title": format!("{} reading {n}.{k}", self.title),
                "url": format!("https://example.com/syllabind/{n}/{k}"),
                "author": "Fixture Press",
                "mediaType": "Article",
                "note": "Sample material for a mock run.",
                "estimatedMinutes": 15
            })
        };
        json!({
            "steps": [
                reading(1),
                reading(2),
                reading(3),
                {
                    "type": "exercise",
                    "title": format!("{} exercise {n}", self.title),
                    "promptText": "Summarize the three readings in your own words.",
                    "estimatedMinutes": 20
                }
            ]
        })
    }

    fn tool_turn(&self, name: &str, input: &Value) -> Vec<ProviderStreamChunk> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        vec![
            ProviderStreamChunk::MessageStart {
                usage: TokenUsage::default(),
            },
            ProviderStreamChunk::ToolUseStart {
                index: 0,
                id: format!("toolu_fixture_{call}"),
                name: name.to_string(),
                server_side: false,
            },
            ProviderStreamChunk::ToolInputDelta {
                index: 0,
                partial_json: input.to_string(),
            },
            ProviderStreamChunk::BlockStop { index: 0 },
            ProviderStreamChunk::MessageDelta {
                stop_reason: Some("tool_use".into()),
                usage: None,
            },
            ProviderStreamChunk::MessageStop,
        ]
    }

    fn text_turn(text: &str) -> Vec<ProviderStreamChunk> {
        vec![
            ProviderStreamChunk::MessageStart {
                usage: TokenUsage::default(),
            },
            ProviderStreamChunk::TextDelta {
                text: text.to_string(),
            },
            ProviderStreamChunk::MessageDelta {
                stop_reason: Some("end_turn".into()),
                usage: None,
            },
            ProviderStreamChunk::MessageStop,
        ]
    }
}

#[async_trait]
impl PluginAdapter for FixtureProvider {
    fn name(&self) -> &str {
        "fixture"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, SyllabindError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SyllabindError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for FixtureProvider {
    async fn stream(&self, request: ProviderRequest) -> Result<ProviderStream, SyllabindError> {
        let forced = request
            .tool_choice
            .as_ref()
            .and_then(|c| c["name"].as_str())
            .map(str::to_string);

        let chunks = if forced.as_deref() == Some(PLAN_CURRICULUM) {
            self.tool_turn(PLAN_CURRICULUM, &self.plan())
        } else if Self::offers(&request, FINALIZE_WEEK) {
            if request.messages.len() <= 1 {
                let query = format!("{} reading list", self.title);
                self.tool_turn(WEB_SEARCH, &json!({ "query": query }))
            } else {
                self.tool_turn(FINALIZE_WEEK, &self.week())
            }
        } else {
            Self::text_turn("Every reading already has a link.")
        };

        Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
    }
}
