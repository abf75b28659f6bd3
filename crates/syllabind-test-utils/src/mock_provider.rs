// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock LLM provider adapter for deterministic testing.
//!
//! `MockProvider` implements `ProviderAdapter` by replaying scripted turns.
//! Each call to `stream` pops the next [`MockTurn`] and records the request,
//! so tests can assert both on what the pipeline emitted and on what it sent.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::{Value, json};
use tokio::sync::{Mutex, Notify};

use syllabind_core::traits::{PluginAdapter, ProviderAdapter, ProviderStream};
use syllabind_core::types::{
    AdapterType, ContentBlock, HealthStatus, ProviderRequest, ProviderStreamChunk, TokenUsage,
};
use syllabind_core::SyllabindError;

/// One scripted provider turn.
pub enum MockTurn {
    /// A stream that yields these chunks and ends.
    Chunks(Vec<ProviderStreamChunk>),
    /// `stream` itself fails with this error.
    Fail(SyllabindError),
    /// Chunks held back until the gate is notified. Used to pause a session
    /// mid-turn at a known point.
    Gated(Arc<Notify>, Vec<ProviderStreamChunk>),
}

impl MockTurn {
    /// Starts building a streamed turn.
    pub fn builder() -> TurnBuilder {
        TurnBuilder::default()
    }

    /// An HTTP 429 with an optional advertised wait.
    pub fn rate_limited(retry_after_secs: Option<u64>) -> Self {
        MockTurn::Fail(SyllabindError::RateLimited {
            retry_after_secs,
            message: "rate_limit_error: too many requests".into(),
        })
    }

    /// A `rate_limit_error` reported inside an otherwise successful stream.
    pub fn stream_rate_limit() -> Self {
        MockTurn::Chunks(vec![
            ProviderStreamChunk::MessageStart {
                usage: TokenUsage::default(),
            },
            ProviderStreamChunk::Error {
                error_type: "rate_limit_error".into(),
                message: "Number of request tokens has exceeded your per-minute rate limit"
                    .into(),
            },
        ])
    }

    /// A non-throttling provider failure.
    pub fn provider_error(message: &str) -> Self {
        MockTurn::Fail(SyllabindError::Provider {
            message: message.to_string(),
            source: None,
        })
    }

    /// Holds `turn` until `gate` is notified.
    pub fn gated(gate: Arc<Notify>, turn: MockTurn) -> Self {
        match turn {
            MockTurn::Chunks(chunks) => MockTurn::Gated(gate, chunks),
            other => other,
        }
    }

    /// A turn with only text and `end_turn`, i.e. no tool call.
    pub fn text_only(text: &str) -> Self {
        Self::builder().text(text).build()
    }
}

/// Builds the chunk sequence of a realistic streamed turn.
#[derive(Default)]
pub struct TurnBuilder {
    chunks: Vec<ProviderStreamChunk>,
    next_index: usize,
    client_tool_calls: usize,
    stop_reason: Option<String>,
}

impl TurnBuilder {
    /// Appends a text block.
    pub fn text(mut self, text: &str) -> Self {
        self.chunks.push(ProviderStreamChunk::TextDelta {
            text: text.to_string(),
        });
        self.next_index += 1;
        self
    }

    /// Appends a client tool call whose arguments arrive in two fragments.
    pub fn tool_call(self, id: &str, name: &str, input: Value) -> Self {
        let json = input.to_string();
        self.raw_tool_call(id, name, &json)
    }

    /// Appends a client tool call with arbitrary (possibly malformed) arguments.
    pub fn raw_tool_call(mut self, id: &str, name: &str, partial_json: &str) -> Self {
        let index = self.next_index;
        self.next_index += 1;
        self.client_tool_calls += 1;

        self.chunks.push(ProviderStreamChunk::ToolUseStart {
            index,
            id: id.to_string(),
            name: name.to_string(),
            server_side: false,
        });
        let split = partial_json
            .char_indices()
            .map(|(i, _)| i)
            .nth(partial_json.chars().count() / 2)
            .unwrap_or(partial_json.len());
        let (head, tail) = partial_json.split_at(split);
        for fragment in [head, tail] {
            if !fragment.is_empty() {
                self.chunks.push(ProviderStreamChunk::ToolInputDelta {
                    index,
                    partial_json: fragment.to_string(),
                });
            }
        }
        self.chunks.push(ProviderStreamChunk::BlockStop { index });
        self
    }

    /// Appends a provider-executed web search and its result block.
    pub fn server_search(mut self, id: &str, query: &str) -> Self {
        let index = self.next_index;
        self.next_index += 2;

        self.chunks.push(ProviderStreamChunk::ToolUseStart {
            index,
            id: id.to_string(),
            name: "web_search".into(),
            server_side: true,
        });
        self.chunks.push(ProviderStreamChunk::ToolInputDelta {
            index,
            partial_json: json!({ "query": query }).to_string(),
        });
        self.chunks.push(ProviderStreamChunk::BlockStop { index });
        self.chunks.push(ProviderStreamChunk::ServerToolResult {
            block: ContentBlock::WebSearchResult {
                tool_use_id: id.to_string(),
                content: json!([{
                    "type": "web_search_result",
                    "url": "https://plato.stanford.edu/entries/stoicism/",
                    "title": "Stoicism (Stanford Encyclopedia of Philosophy)"
                }]),
            },
        });
        self.chunks.push(ProviderStreamChunk::BlockStop { index: index + 1 });
        self
    }

    /// Overrides the stop reason. Defaults to `tool_use` when a client tool
    /// was called and `end_turn` otherwise.
    pub fn stop_reason(mut self, reason: &str) -> Self {
        self.stop_reason = Some(reason.to_string());
        self
    }

    /// Finishes the turn.
    pub fn build(self) -> MockTurn {
        let stop_reason = self.stop_reason.unwrap_or_else(|| {
            if self.client_tool_calls > 0 {
                "tool_use".into()
            } else {
                "end_turn".into()
            }
        });

        let mut chunks = Vec::with_capacity(self.chunks.len() + 3);
        chunks.push(ProviderStreamChunk::MessageStart {
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 0,
            },
        });
        chunks.extend(self.chunks);
        chunks.push(ProviderStreamChunk::MessageDelta {
            stop_reason: Some(stop_reason),
            usage: Some(TokenUsage {
                input_tokens: 0,
                output_tokens: 20,
            }),
        });
        chunks.push(ProviderStreamChunk::MessageStop);
        MockTurn::Chunks(chunks)
    }
}

impl From<TurnBuilder> for MockTurn {
    fn from(builder: TurnBuilder) -> Self {
        builder.build()
    }
}

/// A mock LLM provider that replays scripted turns.
///
/// Turns are popped from a FIFO queue. When the queue is empty, a text-only
/// "mock response" turn is returned.
#[derive(Clone, Default)]
pub struct MockProvider {
    turns: Arc<Mutex<VecDeque<MockTurn>>>,
    requests: Arc<Mutex<Vec<ProviderRequest>>>,
}

impl MockProvider {
    /// Create a new mock provider with an empty turn queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock provider pre-loaded with the given turns.
    pub fn with_turns(turns: Vec<MockTurn>) -> Self {
        Self {
            turns: Arc::new(Mutex::new(VecDeque::from(turns))),
            requests: Arc::default(),
        }
    }

    /// Add a turn to the end of the queue.
    pub async fn push(&self, turn: MockTurn) {
        self.turns.lock().await.push_back(turn);
    }

    /// Every request received so far, in order.
    pub async fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().await.clone()
    }

    /// Number of scripted turns not yet consumed.
    pub async fn remaining(&self) -> usize {
        self.turns.lock().await.len()
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
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
impl ProviderAdapter for MockProvider {
    async fn stream(&self, request: ProviderRequest) -> Result<ProviderStream, SyllabindError> {
        self.requests.lock().await.push(request);

        let turn = self
            .turns
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| MockTurn::text_only("mock response"));

        match turn {
            MockTurn::Chunks(chunks) => Ok(Box::pin(stream::iter(
                chunks.into_iter().map(Ok::<_, SyllabindError>),
            ))),
            MockTurn::Fail(err) => Err(err),
            MockTurn::Gated(gate, chunks) => {
                let held = stream::once(async move {
                    gate.notified().await;
                    stream::iter(chunks.into_iter().map(Ok::<_, SyllabindError>))
                })
                .flatten();
                Ok(Box::pin(held))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ProviderRequest {
        ProviderRequest {
            model: "test-model".to_string(),
            system_prompt: None,
            messages: vec![],
            max_tokens: 100,
            stream: true,
            tools: None,
            tool_choice: None,
        }
    }

    async fn collect(provider: &MockProvider) -> Vec<ProviderStreamChunk> {
        let stream = provider.stream(request()).await.unwrap();
        stream.map(|c| c.unwrap()).collect().await
    }

    #[tokio::test]
    async fn default_turn_when_queue_empty() {
        let provider = MockProvider::new();
        let chunks = collect(&provider).await;
        assert!(chunks.contains(&ProviderStreamChunk::TextDelta {
            text: "mock response".into()
        }));
        assert!(chunks.contains(&ProviderStreamChunk::MessageDelta {
            stop_reason: Some("end_turn".into()),
            usage: Some(TokenUsage {
                input_tokens: 0,
                output_tokens: 20
            }),
        }));
    }

    #[tokio::test]
    async fn tool_call_fragments_reassemble() {
        let input = json!({"query": "stoic ethics primer"});
        let provider = MockProvider::with_turns(vec![
            MockTurn::builder()
                .tool_call("toolu_1", "web_search", input.clone())
                .build(),
        ]);

        let chunks = collect(&provider).await;
        let joined: String = chunks
            .iter()
            .filter_map(|c| match c {
                ProviderStreamChunk::ToolInputDelta { partial_json, .. } => {
                    Some(partial_json.as_str())
                }
                _ => None,
            })
            .collect();
        assert_eq!(serde_json::from_str::<Value>(&joined).unwrap(), input);
        assert!(chunks.iter().any(|c| matches!(
            c,
            ProviderStreamChunk::MessageDelta { stop_reason: Some(r), .. } if r == "tool_use"
        )));
    }

    #[tokio::test]
    async fn records_requests_and_fails_on_demand() {
        let provider = MockProvider::with_turns(vec![MockTurn::rate_limited(Some(3))]);
        let err = provider.stream(request()).await.err().unwrap();
        assert!(err.is_rate_limit());
        assert_eq!(provider.requests().await.len(), 1);
        assert_eq!(provider.remaining().await, 0);
    }

    #[tokio::test]
    async fn gated_turn_waits_for_release() {
        let gate = Arc::new(Notify::new());
        let provider = MockProvider::with_turns(vec![MockTurn::gated(
            gate.clone(),
            MockTurn::text_only("held"),
        )]);
        let mut stream = provider.stream(request()).await.unwrap();

        let early = tokio::time::timeout(std::time::Duration::from_millis(20), stream.next()).await;
        assert!(early.is_err(), "nothing before the gate opens");

        gate.notify_one();
        assert!(stream.next().await.is_some());
    }

    #[tokio::test]
    async fn server_search_indices_do_not_collide() {
        let provider = MockProvider::with_turns(vec![
            MockTurn::builder()
                .server_search("srvtoolu_1", "epictetus")
                .tool_call("toolu_2", "finalize_week", json!({}))
                .build(),
        ]);
        let chunks = collect(&provider).await;
        let starts: Vec<usize> = chunks
            .iter()
            .filter_map(|c| match c {
                ProviderStreamChunk::ToolUseStart { index, .. } => Some(*index),
                _ => None,
            })
            .collect();
        assert_eq!(starts, vec![0, 2]);
    }
}
