// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the provider, storage, and generation layers.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    Storage,
    Auth,
}

// --- Provider types ---

/// Speaker of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One unit of message content.
///
/// Server-executed tool blocks are kept verbatim so a turn that used them can
/// be replayed to the provider unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
    ServerToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    WebSearchResult {
        tool_use_id: String,
        content: serde_json::Value,
    },
}

/// A role-tagged message in a provider conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMessage {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl ProviderMessage {
    /// A user message holding a single text block.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    /// A user message carrying tool results.
    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: results,
        }
    }
}

/// A request to an LLM provider.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// Model identifier.
    pub model: String,
    /// System prompt for the exchange.
    pub system_prompt: Option<String>,
    /// Ordered conversation history.
    pub messages: Vec<ProviderMessage>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Whether the response should be streamed.
    pub stream: bool,
    /// Tool definitions in provider wire format.
    pub tools: Option<Vec<serde_json::Value>>,
    /// Optional forced tool choice in provider wire format.
    pub tool_choice: Option<serde_json::Value>,
}

/// Token usage for a single exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A single chunk from a streaming provider response.
///
/// Chunks are close to the wire: tool-call argument fragments arrive as
/// [`ProviderStreamChunk::ToolInputDelta`] and are reassembled by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderStreamChunk {
    /// Message metadata; carries the initial input-token count.
    MessageStart { usage: TokenUsage },
    /// Incremental assistant text.
    TextDelta { text: String },
    /// A tool-call block opened at `index`.
    ToolUseStart {
        index: usize,
        id: String,
        name: String,
        /// True when the provider executes the tool itself.
        server_side: bool,
    },
    /// A fragment of the JSON arguments for the block at `index`.
    ToolInputDelta { index: usize, partial_json: String },
    /// The block at `index` is complete.
    BlockStop { index: usize },
    /// A provider-produced result block (e.g. web search results).
    ServerToolResult { block: ContentBlock },
    /// Message-level delta with stop reason and usage.
    MessageDelta {
        stop_reason: Option<String>,
        usage: Option<TokenUsage>,
    },
    /// The message is complete.
    MessageStop,
    /// An error reported inside the stream.
    Error { error_type: String, message: String },
}

// --- Domain types ---

/// A course as seen by the orchestrator. Read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Syllabind {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub audience_level: String,
    pub duration_weeks: u32,
    pub creator_id: String,
}

/// The planned title and description for one week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekPlan {
    pub week_index: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Kind of a learning step.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StepType {
    #[serde(alias = "Reading")]
    Reading,
    #[serde(alias = "Exercise")]
    Exercise,
}

/// A step as declared by the model, before persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDraft {
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_minutes: Option<u32>,
}

impl StepDraft {
    /// True for a reading whose url is absent or blank.
    pub fn needs_url(&self) -> bool {
        self.step_type == StepType::Reading
            && self.url.as_deref().is_none_or(|u| u.trim().is_empty())
    }
}

/// A persisted step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: i64,
    pub position: u32,
    #[serde(flatten)]
    pub draft: StepDraft,
}

/// A persisted week with its ordered steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Week {
    pub id: i64,
    pub syllabind_id: i64,
    pub week_index: u32,
    pub title: String,
    pub description: String,
    pub steps: Vec<Step>,
}

/// A verified identity from an auth adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthIdentity {
    pub user_id: String,
    pub username: String,
}
