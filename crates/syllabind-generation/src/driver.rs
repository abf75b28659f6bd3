// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation driver: one provider turn as a stream of [`TurnEvent`]s.
//!
//! Tool-call arguments arrive as JSON fragments. The [`TurnAssembler`]
//! concatenates them per tool call and parses once the block is closed; an
//! empty or unparseable buffer becomes `{}`. Server-executed blocks are kept
//! so the assistant message can be replayed verbatim.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use futures::StreamExt;
use serde_json::{Value, json};
use syllabind_core::types::{
    ContentBlock, ProviderMessage, ProviderRequest, ProviderStreamChunk, Role, TokenUsage,
};
use syllabind_core::{ProviderAdapter, ProviderStream, SyllabindError};
use tracing::{debug, warn};

use crate::GenerationSettings;
use crate::tools::ToolSet;

/// Provider error type that marks throttling inside a stream.
const RATE_LIMIT_ERROR: &str = "rate_limit_error";

/// A completed tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
    /// True when the provider executed the tool itself.
    pub server_side: bool,
}

/// One step of a turn, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    TextDelta(String),
    ToolCallStart {
        id: String,
        name: String,
        server_side: bool,
    },
    ToolCallArgDelta {
        id: String,
        partial_json: String,
    },
    ToolCallComplete(ToolCall),
    /// A provider-produced block, e.g. web search results.
    ServerResult(ContentBlock),
    Finished {
        stop_reason: Option<String>,
        usage: TokenUsage,
    },
}

/// Everything a turn produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletedTurn {
    /// Content blocks in arrival order, ready to replay.
    pub blocks: Vec<ContentBlock>,
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: Option<String>,
    pub usage: TokenUsage,
}

impl CompletedTurn {
    /// The assistant message to append to history.
    pub fn assistant_message(&self) -> ProviderMessage {
        ProviderMessage {
            role: Role::Assistant,
            content: self.blocks.clone(),
        }
    }

    /// Tool calls the client must answer.
    pub fn client_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.tool_calls.iter().filter(|c| !c.server_side)
    }

    pub fn is_paused(&self) -> bool {
        self.stop_reason.as_deref() == Some("pause_turn")
    }
}

#[derive(Debug)]
struct PendingCall {
    id: String,
    name: String,
    server_side: bool,
    buffer: String,
}

#[derive(Debug)]
enum Slot {
    Text(String),
    Call(usize),
    Server(ContentBlock),
}

/// Folds provider chunks into turn events and the final [`CompletedTurn`].
#[derive(Debug, Default)]
pub struct TurnAssembler {
    slots: Vec<Slot>,
    pending: HashMap<usize, PendingCall>,
    completed: HashMap<usize, ToolCall>,
    order: Vec<usize>,
    stop_reason: Option<String>,
    usage: TokenUsage,
    finished: bool,
}

impl TurnAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one chunk. Stream-level errors are returned, with throttling
    /// tagged as [`SyllabindError::RateLimited`].
    pub fn push(&mut self, chunk: ProviderStreamChunk) -> Result<Vec<TurnEvent>, SyllabindError> {
        let mut events = Vec::new();
        match chunk {
            ProviderStreamChunk::MessageStart { usage } => {
                self.usage.input_tokens += usage.input_tokens;
                self.usage.output_tokens += usage.output_tokens;
            }
            ProviderStreamChunk::TextDelta { text } => {
                match self.slots.last_mut() {
                    Some(Slot::Text(buf)) => buf.push_str(&text),
                    _ => self.slots.push(Slot::Text(text.clone())),
                }
                events.push(TurnEvent::TextDelta(text));
            }
            ProviderStreamChunk::ToolUseStart {
                index,
                id,
                name,
                server_side,
            } => {
                self.slots.push(Slot::Call(index));
                self.order.push(index);
                events.push(TurnEvent::ToolCallStart {
                    id: id.clone(),
                    name: name.clone(),
                    server_side,
                });
                self.pending.insert(
                    index,
                    PendingCall {
                        id,
                        name,
                        server_side,
                        buffer: String::new(),
                    },
                );
            }
            ProviderStreamChunk::ToolInputDelta {
                index,
                partial_json,
            } => match self.pending.get_mut(&index) {
                Some(call) => {
                    call.buffer.push_str(&partial_json);
                    events.push(TurnEvent::ToolCallArgDelta {
                        id: call.id.clone(),
                        partial_json,
                    });
                }
                None => debug!(index, "input delta for unknown block ignored"),
            },
            ProviderStreamChunk::BlockStop { index } => {
                if let Some(call) = self.pending.remove(&index) {
                    let complete = close_call(call);
                    events.push(TurnEvent::ToolCallComplete(complete.clone()));
                    self.completed.insert(index, complete);
                }
            }
            ProviderStreamChunk::ServerToolResult { block } => {
                self.slots.push(Slot::Server(block.clone()));
                events.push(TurnEvent::ServerResult(block));
            }
            ProviderStreamChunk::MessageDelta { stop_reason, usage } => {
                if stop_reason.is_some() {
                    self.stop_reason = stop_reason;
                }
                if let Some(usage) = usage {
                    self.usage.input_tokens += usage.input_tokens;
                    self.usage.output_tokens += usage.output_tokens;
                }
            }
            ProviderStreamChunk::MessageStop => {
                events.extend(self.finish_events());
            }
            ProviderStreamChunk::Error {
                error_type,
                message,
            } => {
                if error_type == RATE_LIMIT_ERROR {
                    return Err(SyllabindError::RateLimited {
                        retry_after_secs: None,
                        message,
                    });
                }
                return Err(SyllabindError::Provider {
                    message: format!("{error_type}: {message}"),
                    source: None,
                });
            }
        }
        Ok(events)
    }

    /// Closes any tool call left open and emits `Finished` once.
    fn finish_events(&mut self) -> Vec<TurnEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let mut events = Vec::new();
        let mut open: Vec<usize> = self.pending.keys().copied().collect();
        open.sort_unstable();
        for index in open {
            if let Some(call) = self.pending.remove(&index) {
                warn!(tool = %call.name, "stream ended inside a tool call");
                let complete = close_call(call);
                events.push(TurnEvent::ToolCallComplete(complete.clone()));
                self.completed.insert(index, complete);
            }
        }
        events.push(TurnEvent::Finished {
            stop_reason: self.stop_reason.clone(),
            usage: self.usage,
        });
        events
    }

    /// Builds the completed turn.
    pub fn finish(mut self) -> CompletedTurn {
        let _ = self.finish_events();

        let tool_calls: Vec<ToolCall> = self
            .order
            .iter()
            .filter_map(|index| self.completed.get(index).cloned())
            .collect();

        let blocks = self
            .slots
            .into_iter()
            .filter_map(|slot| match slot {
                Slot::Text(text) if text.is_empty() => None,
                Slot::Text(text) => Some(ContentBlock::Text { text }),
                Slot::Server(block) => Some(block),
                Slot::Call(index) => self.completed.remove(&index).map(|call| {
                    if call.server_side {
                        ContentBlock::ServerToolUse {
                            id: call.id,
                            name: call.name,
                            input: call.input,
                        }
                    } else {
                        ContentBlock::ToolUse {
                            id: call.id,
                            name: call.name,
                            input: call.input,
                        }
                    }
                }),
            })
            .collect();

        CompletedTurn {
            blocks,
            tool_calls,
            stop_reason: self.stop_reason,
            usage: self.usage,
        }
    }
}

fn close_call(call: PendingCall) -> ToolCall {
    let input = if call.buffer.trim().is_empty() {
        json!({})
    } else {
        match serde_json::from_str::<Value>(&call.buffer) {
            Ok(value) => value,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "unparseable tool arguments, using {{}}");
                json!({})
            }
        }
    };
    ToolCall {
        id: call.id,
        name: call.name,
        input,
        server_side: call.server_side,
    }
}

/// A live provider turn.
pub struct TurnStream {
    inner: ProviderStream,
    assembler: TurnAssembler,
    queued: VecDeque<TurnEvent>,
    exhausted: bool,
}

impl TurnStream {
    pub fn new(inner: ProviderStream) -> Self {
        Self {
            inner,
            assembler: TurnAssembler::new(),
            queued: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Next event, or `None` once the turn has finished.
    pub async fn next(&mut self) -> Option<Result<TurnEvent, SyllabindError>> {
        loop {
            if let Some(event) = self.queued.pop_front() {
                return Some(Ok(event));
            }
            if self.exhausted {
                return None;
            }
            match self.inner.next().await {
                Some(Ok(chunk)) => match self.assembler.push(chunk) {
                    Ok(events) => self.queued.extend(events),
                    Err(e) => {
                        self.exhausted = true;
                        return Some(Err(e));
                    }
                },
                Some(Err(e)) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
                None => {
                    self.exhausted = true;
                    self.queued.extend(self.assembler.finish_events());
                }
            }
        }
    }

    /// Drains the stream and returns the completed turn.
    pub async fn collect(mut self) -> Result<CompletedTurn, SyllabindError> {
        while let Some(event) = self.next().await {
            event?;
        }
        Ok(self.assembler.finish())
    }
}

/// Runs provider turns for a session.
#[derive(Clone)]
pub struct ConversationDriver {
    provider: Arc<dyn ProviderAdapter>,
    settings: GenerationSettings,
}

impl ConversationDriver {
    pub fn new(provider: Arc<dyn ProviderAdapter>, settings: GenerationSettings) -> Self {
        Self { provider, settings }
    }

    /// Starts a streamed turn over `history` with the given tool set.
    pub async fn run_turn(
        &self,
        model: &str,
        system_prompt: &str,
        history: &[ProviderMessage],
        tools: ToolSet,
    ) -> Result<TurnStream, SyllabindError> {
        let request = ProviderRequest {
            model: model.to_string(),
            system_prompt: Some(system_prompt.to_string()),
            messages: history.to_vec(),
            max_tokens: self.settings.max_tokens,
            stream: true,
            tools: Some(tools.definitions(&self.settings)),
            tool_choice: tools.tool_choice(),
        };
        debug!(model, messages = history.len(), ?tools, "starting provider turn");
        let stream = self.provider.stream(request).await?;
        Ok(TurnStream::new(stream))
    }

    /// Runs a turn to completion.
    pub async fn complete_turn(
        &self,
        model: &str,
        system_prompt: &str,
        history: &[ProviderMessage],
        tools: ToolSet,
    ) -> Result<CompletedTurn, SyllabindError> {
        self.run_turn(model, system_prompt, history, tools)
            .await?
            .collect()
            .await
    }
}
