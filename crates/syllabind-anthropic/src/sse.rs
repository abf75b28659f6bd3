// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSE stream parser for Anthropic Messages API streaming responses.
//!
//! Converts a reqwest response byte stream into typed [`StreamEvent`] variants
//! using `eventsource-stream` for SSE framing.

use std::pin::Pin;

use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use syllabind_core::SyllabindError;

use crate::types::{
    SseContentBlockDelta, SseContentBlockStart, SseContentBlockStop, SseError, SseMessageDelta,
    SseMessageStart,
};

/// Typed SSE events from the Anthropic streaming protocol.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    MessageStart(SseMessageStart),
    ContentBlockStart(SseContentBlockStart),
    ContentBlockDelta(SseContentBlockDelta),
    ContentBlockStop(SseContentBlockStop),
    MessageDelta(SseMessageDelta),
    MessageStop,
    Ping,
    Error(SseError),
}

/// A boxed stream of parsed SSE events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, SyllabindError>> + Send>>;

/// Parses a streaming response into typed [`StreamEvent`]s.
///
/// Unknown event names are skipped per Anthropic's API versioning policy.
pub fn parse_sse_stream(response: reqwest::Response) -> EventStream {
    let events = response.bytes_stream().eventsource();

    let mapped = events.filter_map(|result| async move {
        let event = match result {
            Ok(event) => event,
            Err(e) => {
                return Some(Err(SyllabindError::Provider {
                    message: format!("SSE stream error: {e}"),
                    source: None,
                }));
            }
        };

        let data = event.data.as_str();
        let parsed = match event.event.as_str() {
            "message_start" => decode(&event.event, data).map(StreamEvent::MessageStart),
            "content_block_start" => decode(&event.event, data).map(StreamEvent::ContentBlockStart),
            "content_block_delta" => decode(&event.event, data).map(StreamEvent::ContentBlockDelta),
            "content_block_stop" => decode(&event.event, data).map(StreamEvent::ContentBlockStop),
            "message_delta" => decode(&event.event, data).map(StreamEvent::MessageDelta),
            "message_stop" => Ok(StreamEvent::MessageStop),
            "ping" => Ok(StreamEvent::Ping),
            "error" => decode(&event.event, data).map(StreamEvent::Error),
            _ => return None,
        };
        Some(parsed)
    });

    Box::pin(mapped)
}

fn decode<T: DeserializeOwned>(name: &str, data: &str) -> Result<T, SyllabindError> {
    serde_json::from_str(data).map_err(|e| SyllabindError::Provider {
        message: format!("failed to parse {name}: {e}"),
        source: Some(Box::new(e)),
    })
}
