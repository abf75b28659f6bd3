// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Claude provider adapter.
//!
//! Implements [`ProviderAdapter`] for the Anthropic Messages API over SSE.
//! Events are mapped one-to-one onto [`ProviderStreamChunk`]s; tool-call
//! argument fragments are passed through untouched for the caller to
//! reassemble.

pub mod client;
pub mod sse;
pub mod types;

use async_trait::async_trait;
use futures::stream::StreamExt;
use syllabind_config::model::AnthropicConfig;
use syllabind_core::error::SyllabindError;
use syllabind_core::traits::{PluginAdapter, ProviderAdapter, ProviderStream};
use syllabind_core::types::{
    AdapterType, ContentBlock, HealthStatus, ProviderRequest, ProviderStreamChunk, TokenUsage,
};
use tracing::{debug, info, warn};

use crate::client::AnthropicClient;
use crate::sse::StreamEvent;
use crate::types::{
    ApiContent, ApiContentBlock, ApiMessage, ApiUsage, CacheControlMarker, MessageRequest,
    ResponseContentBlock, SseDelta, SystemBlock, SystemContent, ToolDefinition,
};

/// Anthropic Claude provider implementing [`ProviderAdapter`].
///
/// API key resolution order: config -> `ANTHROPIC_API_KEY` env var -> error.
pub struct AnthropicProvider {
    client: AnthropicClient,
}

impl AnthropicProvider {
    /// Creates a new Anthropic provider from the `[anthropic]` config section.
    pub fn new(config: &AnthropicConfig) -> Result<Self, SyllabindError> {
        let api_key = resolve_api_key(&config.api_key)?;
        let client = AnthropicClient::new(api_key, config.api_version.clone())?;

        info!(
            planning_model = %config.planning_model,
            generation_model = %config.generation_model,
            "Anthropic provider initialized"
        );

        Ok(Self { client })
    }

    #[cfg(test)]
    fn with_client(client: AnthropicClient) -> Self {
        Self { client }
    }

    /// Converts a [`ProviderRequest`] to an Anthropic [`MessageRequest`].
    ///
    /// The system prompt is sent as a single cached block since every turn of
    /// a phase repeats it verbatim.
    fn to_message_request(&self, request: &ProviderRequest) -> MessageRequest {
        let messages = request
            .messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.to_string(),
                content: convert_content_blocks(&m.content),
            })
            .collect();

        let system = request.system_prompt.as_ref().map(|text| {
            SystemContent::Blocks(vec![SystemBlock {
                block_type: "text".into(),
                text: text.clone(),
                cache_control: Some(CacheControlMarker::ephemeral()),
            }])
        });

        let tools = request
            .tools
            .as_ref()
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| match serde_json::from_value::<ToolDefinition>(v.clone()) {
                        Ok(def) => Some(def),
                        Err(e) => {
                            warn!(error = %e, "dropping malformed tool definition");
                            None
                        }
                    })
                    .collect::<Vec<_>>()
            })
            .filter(|defs| !defs.is_empty());

        MessageRequest {
            model: request.model.clone(),
            messages,
            system,
            max_tokens: request.max_tokens,
            stream: request.stream,
            tools,
            tool_choice: request.tool_choice.clone(),
        }
    }
}

#[async_trait]
impl PluginAdapter for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, SyllabindError> {
        // No API call here: health checks must not spend tokens.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SyllabindError> {
        debug!("Anthropic provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicProvider {
    async fn stream(&self, request: ProviderRequest) -> Result<ProviderStream, SyllabindError> {
        let api_request = self.to_message_request(&request);
        let events = self.client.stream_message(&api_request).await?;

        let chunks = events.filter_map(|result| async move {
            match result {
                Ok(event) => map_stream_event(event).map(Ok),
                Err(e) => Some(Err(e)),
            }
        });

        Ok(Box::pin(chunks))
    }
}

fn usage(u: &ApiUsage) -> TokenUsage {
    TokenUsage {
        input_tokens: u.input_tokens,
        output_tokens: u.output_tokens,
    }
}

/// Maps an SSE [`StreamEvent`] to a [`ProviderStreamChunk`].
///
/// Pings, citations, and unknown block kinds produce nothing.
fn map_stream_event(event: StreamEvent) -> Option<ProviderStreamChunk> {
    match event {
        StreamEvent::MessageStart(ms) => Some(ProviderStreamChunk::MessageStart {
            usage: usage(&ms.message.usage),
        }),
        StreamEvent::ContentBlockStart(start) => match start.content_block {
            ResponseContentBlock::Text { text } if !text.is_empty() => {
                Some(ProviderStreamChunk::TextDelta { text })
            }
            ResponseContentBlock::Text { .. } => None,
            ResponseContentBlock::ToolUse { id, name, .. } => {
                Some(ProviderStreamChunk::ToolUseStart {
                    index: start.index,
                    id,
                    name,
                    server_side: false,
                })
            }
            ResponseContentBlock::ServerToolUse { id, name, .. } => {
                Some(ProviderStreamChunk::ToolUseStart {
                    index: start.index,
                    id,
                    name,
                    server_side: true,
                })
            }
            ResponseContentBlock::WebSearchToolResult {
                tool_use_id,
                content,
            } => Some(ProviderStreamChunk::ServerToolResult {
                block: ContentBlock::WebSearchResult {
                    tool_use_id,
                    content,
                },
            }),
            ResponseContentBlock::Unknown => None,
        },
        StreamEvent::ContentBlockDelta(delta) => match delta.delta {
            SseDelta::TextDelta { text } => Some(ProviderStreamChunk::TextDelta { text }),
            SseDelta::InputJsonDelta { partial_json } => {
                Some(ProviderStreamChunk::ToolInputDelta {
                    index: delta.index,
                    partial_json,
                })
            }
            SseDelta::CitationsDelta { .. } | SseDelta::Unknown => None,
        },
        StreamEvent::ContentBlockStop(stop) => {
            Some(ProviderStreamChunk::BlockStop { index: stop.index })
        }
        StreamEvent::MessageDelta(md) => Some(ProviderStreamChunk::MessageDelta {
            stop_reason: md.delta.stop_reason,
            usage: md.usage.as_ref().map(usage),
        }),
        StreamEvent::MessageStop => Some(ProviderStreamChunk::MessageStop),
        StreamEvent::Error(err) => Some(ProviderStreamChunk::Error {
            error_type: err.error.type_,
            message: err.error.message,
        }),
        StreamEvent::Ping => None,
    }
}

/// Resolves the API key from config or environment.
fn resolve_api_key(config_key: &Option<String>) -> Result<String, SyllabindError> {
    if let Some(key) = config_key.as_deref().filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }

    std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
        SyllabindError::Config(
            "Anthropic API key not found. Set anthropic.api_key in config or ANTHROPIC_API_KEY environment variable.".into(),
        )
    })
}

/// Converts core [`ContentBlock`]s to Anthropic API [`ApiContent`].
fn convert_content_blocks(blocks: &[ContentBlock]) -> ApiContent {
    if let [ContentBlock::Text { text }] = blocks {
        return ApiContent::Text(text.clone());
    }

    let api_blocks = blocks
        .iter()
        .map(|block| match block {
            ContentBlock::Text { text } => ApiContentBlock::Text { text: text.clone() },
            ContentBlock::ToolUse { id, name, input } => ApiContentBlock::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            },
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => ApiContentBlock::ToolResult {
                tool_use_id: tool_use_id.clone(),
                content: content.clone(),
                is_error: *is_error,
            },
            ContentBlock::ServerToolUse { id, name, input } => ApiContentBlock::ServerToolUse {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            },
            ContentBlock::WebSearchResult {
                tool_use_id,
                content,
            } => ApiContentBlock::WebSearchToolResult {
                tool_use_id: tool_use_id.clone(),
                content: content.clone(),
            },
        })
        .collect();

    ApiContent::Blocks(api_blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        ApiErrorDetail, SseContentBlockDelta, SseContentBlockStart, SseContentBlockStop,
        SseError, SseMessageDelta, SseMessageDeltaInfo,
    };
    use syllabind_core::{ProviderMessage, Role};

    fn provider() -> AnthropicProvider {
        AnthropicProvider::with_client(
            AnthropicClient::new("test-key".into(), "2023-06-01".into()).unwrap(),
        )
    }

    fn request(messages: Vec<ProviderMessage>) -> ProviderRequest {
        ProviderRequest {
            model: "claude-sonnet-4-20250514".into(),
            system_prompt: Some("You design curricula.".into()),
            messages,
            max_tokens: 2048,
            stream: true,
            tools: None,
            tool_choice: None,
        }
    }

    #[test]
    fn resolve_api_key_from_config() {
        assert_eq!(
            resolve_api_key(&Some("sk-test-123".into())).unwrap(),
            "sk-test-123"
        );
    }

    #[test]
    fn resolve_api_key_never_returns_empty() {
        if let Ok(key) = resolve_api_key(&Some(String::new())) {
            assert!(!key.is_empty());
        }
    }

    #[test]
    fn single_text_block_becomes_plain_string() {
        match convert_content_blocks(&[ContentBlock::Text { text: "Hi".into() }]) {
            ApiContent::Text(t) => assert_eq!(t, "Hi"),
            other => panic!("expected Text, got {other:?}"),
        }
    }

    #[test]
    fn tool_results_become_blocks() {
        let blocks = vec![ContentBlock::ToolResult {
            tool_use_id: "toolu_1".into(),
            content: "Week saved".into(),
            is_error: Some(false),
        }];
        match convert_content_blocks(&blocks) {
            ApiContent::Blocks(b) => {
                assert!(matches!(&b[0], ApiContentBlock::ToolResult { is_error: Some(false), .. }))
            }
            other => panic!("expected Blocks, got {other:?}"),
        }
    }

    #[test]
    fn request_conversion_caches_system_prompt_and_keeps_tools() {
        let mut req = request(vec![ProviderMessage::user_text("Plan 4 weeks")]);
        req.tools = Some(vec![
            serde_json::json!({"type": "web_search_20250305", "name": "web_search", "max_uses": 5}),
            serde_json::json!({"name": "finalize_week", "description": "d", "input_schema": {"type": "object"}}),
            serde_json::json!("not a tool"),
        ]);
        req.tool_choice = Some(serde_json::json!({"type": "tool", "name": "finalize_week"}));

        let api_req = provider().to_message_request(&req);
        match &api_req.system {
            Some(SystemContent::Blocks(blocks)) => {
                assert_eq!(blocks[0].text, "You design curricula.");
                assert!(blocks[0].cache_control.is_some());
            }
            other => panic!("expected system blocks, got {other:?}"),
        }
        let tools = api_req.tools.expect("tools kept");
        assert_eq!(tools.len(), 2, "malformed definition dropped");
        assert_eq!(api_req.messages[0].role, "user");
        assert_eq!(
            api_req.tool_choice.as_ref().unwrap()["name"],
            "finalize_week"
        );
    }

    #[test]
    fn assistant_role_is_lowercase_on_the_wire() {
        let msg = ProviderMessage {
            role: Role::Assistant,
            content: vec![ContentBlock::Text { text: "ok".into() }],
        };
        let api_req = provider().to_message_request(&request(vec![msg]));
        assert_eq!(api_req.messages[0].role, "assistant");
    }

    #[test]
    fn maps_tool_use_lifecycle() {
        let start = map_stream_event(StreamEvent::ContentBlockStart(SseContentBlockStart {
            index: 1,
            content_block: ResponseContentBlock::ToolUse {
                id: "toolu_abc".into(),
                name: "finalize_week".into(),
                input: serde_json::json!({}),
            },
        }));
        assert_eq!(
            start,
            Some(ProviderStreamChunk::ToolUseStart {
                index: 1,
                id: "toolu_abc".into(),
                name: "finalize_week".into(),
                server_side: false,
            })
        );

        let delta = map_stream_event(StreamEvent::ContentBlockDelta(SseContentBlockDelta {
            index: 1,
            delta: SseDelta::InputJsonDelta {
                partial_json: "{\"title\":".into(),
            },
        }));
        assert_eq!(
            delta,
            Some(ProviderStreamChunk::ToolInputDelta {
                index: 1,
                partial_json: "{\"title\":".into(),
            })
        );

        let stop = map_stream_event(StreamEvent::ContentBlockStop(SseContentBlockStop {
            index: 1,
        }));
        assert_eq!(stop, Some(ProviderStreamChunk::BlockStop { index: 1 }));
    }

    #[test]
    fn maps_server_search_blocks() {
        let start = map_stream_event(StreamEvent::ContentBlockStart(SseContentBlockStart {
            index: 0,
            content_block: ResponseContentBlock::ServerToolUse {
                id: "srvtoolu_1".into(),
                name: "web_search".into(),
                input: serde_json::json!({}),
            },
        }));
        assert!(matches!(
            start,
            Some(ProviderStreamChunk::ToolUseStart { server_side: true, .. })
        ));

        let result = map_stream_event(StreamEvent::ContentBlockStart(SseContentBlockStart {
            index: 1,
            content_block: ResponseContentBlock::WebSearchToolResult {
                tool_use_id: "srvtoolu_1".into(),
                content: serde_json::json!([]),
            },
        }));
        assert!(matches!(
            result,
            Some(ProviderStreamChunk::ServerToolResult {
                block: ContentBlock::WebSearchResult { .. }
            })
        ));
    }

    #[test]
    fn empty_text_start_and_ping_produce_nothing() {
        let start = map_stream_event(StreamEvent::ContentBlockStart(SseContentBlockStart {
            index: 0,
            content_block: ResponseContentBlock::Text { text: String::new() },
        }));
        assert!(start.is_none());
        assert!(map_stream_event(StreamEvent::Ping).is_none());
    }

    #[test]
    fn maps_stop_reason_and_error() {
        let delta = map_stream_event(StreamEvent::MessageDelta(SseMessageDelta {
            delta: SseMessageDeltaInfo {
                stop_reason: Some("tool_use".into()),
            },
            usage: Some(ApiUsage {
                input_tokens: 0,
                output_tokens: 30,
            }),
        }));
        assert_eq!(
            delta,
            Some(ProviderStreamChunk::MessageDelta {
                stop_reason: Some("tool_use".into()),
                usage: Some(TokenUsage {
                    input_tokens: 0,
                    output_tokens: 30
                }),
            })
        );

        let err = map_stream_event(StreamEvent::Error(SseError {
            error: ApiErrorDetail {
                type_: "rate_limit_error".into(),
                message: "slow down".into(),
            },
        }));
        assert!(matches!(
            err,
            Some(ProviderStreamChunk::Error { ref error_type, .. }) if error_type == "rate_limit_error"
        ));
    }

    #[test]
    fn plugin_adapter_metadata() {
        let p = provider();
        assert_eq!(p.name(), "anthropic");
        assert_eq!(p.adapter_type(), AdapterType::Provider);
    }
}
