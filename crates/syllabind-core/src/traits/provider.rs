// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for language-model transports.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::SyllabindError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ProviderRequest, ProviderStreamChunk};

/// A boxed stream of provider chunks.
pub type ProviderStream =
    Pin<Box<dyn Stream<Item = Result<ProviderStreamChunk, SyllabindError>> + Send>>;

/// Adapter for LLM provider integrations.
///
/// Implementations submit a conversation plus tool definitions and return the
/// response as a stream of chunks. Throttling must surface as
/// [`SyllabindError::RateLimited`], either from `stream` itself or as an
/// in-stream error chunk.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Sends a request and returns a stream of response chunks.
    async fn stream(&self, request: ProviderRequest) -> Result<ProviderStream, SyllabindError>;
}
