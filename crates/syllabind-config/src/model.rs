// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key fails
//! at startup with a suggestion instead of being silently ignored.

use serde::{Deserialize, Serialize};

/// Top-level Syllabind configuration.
///
/// Every section is optional and falls back to compiled defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyllabindConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// HTTP/WebSocket listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Anthropic API settings.
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// Generation pipeline bounds.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Service identity and logging.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Name used in logs and the health endpoint.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "syllabind".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP/WebSocket listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Accept `?mock=true` connections that run the deterministic fixture provider.
    #[serde(default)]
    pub allow_mock: bool,

    /// Prefix prepended to the `websocketUrl` returned by the prepare endpoints.
    #[serde(default)]
    pub public_base_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allow_mock: false,
            public_base_path: String::new(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

/// Anthropic API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    /// Anthropic API key. `None` requires the `ANTHROPIC_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Anthropic API version string.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Model used for the single curriculum-planning turn.
    #[serde(default = "default_planning_model")]
    pub planning_model: String,

    /// Model used for week generation and URL repair.
    #[serde(default = "default_generation_model")]
    pub generation_model: String,

    /// Maximum tokens to generate per turn.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_version: default_api_version(),
            planning_model: default_planning_model(),
            generation_model: default_generation_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_planning_model() -> String {
    "claude-3-5-haiku-20241022".to_string()
}

fn default_generation_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    8192
}

/// Bounds for the generation pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    /// Turns allowed per week before the week is reported as failed.
    #[serde(default = "default_max_week_iterations")]
    pub max_week_iterations: u32,

    /// Turns allowed for the URL-repair loop.
    #[serde(default = "default_max_repair_iterations")]
    pub max_repair_iterations: u32,

    /// `max_uses` of the web search tool while filling a week.
    #[serde(default = "default_web_search_max_uses")]
    pub web_search_max_uses: u32,

    /// `max_uses` of the web search tool during URL repair.
    #[serde(default = "default_repair_search_max_uses")]
    pub repair_search_max_uses: u32,

    /// Automatic resumes per phase unit before a rate limit is surfaced as an error.
    #[serde(default = "default_max_rate_limit_retries")]
    pub max_rate_limit_retries: u32,

    /// Countdown used when the provider gives no retry-after hint.
    #[serde(default = "default_rate_limit_reset_secs")]
    pub default_rate_limit_reset_secs: u64,

    /// Capacity of the per-connection event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_week_iterations: default_max_week_iterations(),
            max_repair_iterations: default_max_repair_iterations(),
            web_search_max_uses: default_web_search_max_uses(),
            repair_search_max_uses: default_repair_search_max_uses(),
            max_rate_limit_retries: default_max_rate_limit_retries(),
            default_rate_limit_reset_secs: default_rate_limit_reset_secs(),
            event_buffer: default_event_buffer(),
        }
    }
}

fn default_max_week_iterations() -> u32 {
    5
}

fn default_max_repair_iterations() -> u32 {
    3
}

fn default_web_search_max_uses() -> u32 {
    5
}

fn default_repair_search_max_uses() -> u32 {
    10
}

fn default_max_rate_limit_retries() -> u32 {
    3
}

fn default_rate_limit_reset_secs() -> u64 {
    60
}

fn default_event_buffer() -> usize {
    64
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("syllabind").join("syllabind.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("syllabind.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}
