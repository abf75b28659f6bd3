// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Messages API request/response types and SSE event types.

use serde::{Deserialize, Serialize};

// --- Cache control types ---

/// Marker for Anthropic prompt caching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheControlMarker {
    #[serde(rename = "type")]
    pub control_type: String,
}

impl CacheControlMarker {
    /// Creates an ephemeral cache control marker.
    pub fn ephemeral() -> Self {
        Self {
            control_type: "ephemeral".to_string(),
        }
    }
}

/// System prompt content: a plain string or structured blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SystemContent {
    Text(String),
    Blocks(Vec<SystemBlock>),
}

/// A structured block within a system prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControlMarker>,
}

// --- Tool types ---

/// A tool the model may call.
///
/// Server tools (such as web search) are executed by Anthropic and are
/// declared by versioned `type`; custom tools carry a JSON schema and are
/// executed by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolDefinition {
    Server(ServerToolDefinition),
    Custom(CustomToolDefinition),
}

/// A provider-executed tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerToolDefinition {
    /// Versioned tool type, e.g. `web_search_20250305`.
    #[serde(rename = "type")]
    pub tool_type: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_uses: Option<u32>,
}

/// A caller-executed tool with a JSON schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

impl ToolDefinition {
    pub fn name(&self) -> &str {
        match self {
            ToolDefinition::Server(def) => &def.name,
            ToolDefinition::Custom(def) => &def.name,
        }
    }
}

// --- Request types ---

/// A request to the Anthropic Messages API.
#[derive(Debug, Clone, Serialize)]
pub struct MessageRequest {
    pub model: String,

    pub messages: Vec<ApiMessage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemContent>,

    pub max_tokens: u32,

    pub stream: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,

    /// Forced tool choice, e.g. `{"type": "tool", "name": "plan_curriculum"}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
}

/// A single message in the Anthropic conversation format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMessage {
    /// Role: "user" or "assistant".
    pub role: String,
    pub content: ApiContent,
}

/// Message content: a simple string or structured blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiContent {
    Text(String),
    Blocks(Vec<ApiContentBlock>),
}

/// A typed content block within a request message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ApiContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
    /// A server tool call, replayed verbatim from an earlier assistant turn.
    #[serde(rename = "server_tool_use")]
    ServerToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// Web search results, replayed verbatim from an earlier assistant turn.
    #[serde(rename = "web_search_tool_result")]
    WebSearchToolResult {
        tool_use_id: String,
        content: serde_json::Value,
    },
}

// --- Response types ---

/// The message object carried by `message_start`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    pub id: String,
    pub model: String,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: ApiUsage,
}

/// A content block as announced by `content_block_start`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "server_tool_use")]
    ServerToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "web_search_tool_result")]
    WebSearchToolResult {
        tool_use_id: String,
        content: serde_json::Value,
    },
    /// Block types introduced after this client was written.
    #[serde(other)]
    Unknown,
}

/// Token usage statistics. `message_delta` carries only output tokens.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApiUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

// --- SSE event types ---

/// SSE event: message_start
#[derive(Debug, Clone, Deserialize)]
pub struct SseMessageStart {
    pub message: MessageResponse,
}

/// SSE event: content_block_start
#[derive(Debug, Clone, Deserialize)]
pub struct SseContentBlockStart {
    pub index: usize,
    pub content_block: ResponseContentBlock,
}

/// SSE event: content_block_delta
#[derive(Debug, Clone, Deserialize)]
pub struct SseContentBlockDelta {
    pub index: usize,
    pub delta: SseDelta,
}

/// A delta update within a content block.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum SseDelta {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(rename = "input_json_delta")]
    InputJsonDelta { partial_json: String },
    /// Citation attached to a text block; not rendered.
    #[serde(rename = "citations_delta")]
    CitationsDelta { citation: serde_json::Value },
    #[serde(other)]
    Unknown,
}

/// SSE event: content_block_stop
#[derive(Debug, Clone, Deserialize)]
pub struct SseContentBlockStop {
    pub index: usize,
}

/// SSE event: message_delta
#[derive(Debug, Clone, Deserialize)]
pub struct SseMessageDelta {
    pub delta: SseMessageDeltaInfo,
    pub usage: Option<ApiUsage>,
}

/// Delta information for a message_delta event.
#[derive(Debug, Clone, Deserialize)]
pub struct SseMessageDeltaInfo {
    pub stop_reason: Option<String>,
}

/// SSE event: error
#[derive(Debug, Clone, Deserialize)]
pub struct SseError {
    pub error: ApiErrorDetail,
}

/// API error response body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

/// Error detail shared by streaming and non-streaming errors.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(rename = "type")]
    pub type_: String,
    pub message: String,
}
