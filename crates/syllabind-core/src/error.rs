// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for Syllabind generation.

use thiserror::Error;

/// The primary error type used across adapter traits and the generation pipeline.
#[derive(Debug, Error)]
pub enum SyllabindError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// WebSocket or event channel errors (closed socket, full buffer).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// LLM provider errors (API failure, malformed stream, model not found).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The provider throttled the request. Carries the advertised wait, if any.
    #[error("rate limited: {message}")]
    RateLimited {
        retry_after_secs: Option<u64>,
        message: String,
    },

    /// A tool call carried input that failed validation.
    #[error("invalid {tool} input: {message}")]
    ToolInput { tool: String, message: String },

    /// Requested adapter was not found.
    #[error("adapter not found: {adapter_type}/{name}")]
    AdapterNotFound { adapter_type: String, name: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SyllabindError {
    /// Returns true when the error came from provider throttling.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, SyllabindError::RateLimited { .. })
    }

    /// Wraps any storage-layer error.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        SyllabindError::Storage {
            source: Box::new(err),
        }
    }
}
