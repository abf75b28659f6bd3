// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-phase syllabind generation for Syllabind.
//!
//! A [`GenerationSession`] turns a syllabind's title and description into a
//! persisted multi-week curriculum:
//! - **Planning**: one forced `plan_curriculum` call yields a title and
//!   description for every week
//! - **Week fill**: a bounded tool loop per week searches the web and ends
//!   with a validated `finalize_week` call that is persisted step by step
//! - **URL repair**: readings saved without a url get a second, bounded pass
//!
//! Progress is reported as [`GenerationEvent`]s through an [`EventSink`].
//! Provider throttling is absorbed by the [`RateLimitController`] countdown,
//! and a [`CancellationToken`](tokio_util::sync::CancellationToken) stops the
//! session cooperatively between steps.

pub mod driver;
pub mod events;
pub mod fixture;
mod planning;
pub mod prompts;
pub mod rate_limit;
mod repair;
pub mod session;
pub mod tools;
mod week_fill;

use std::sync::Arc;

use syllabind_config::SyllabindConfig;
use syllabind_core::{ProviderAdapter, SyllabindStore};

pub use driver::{CompletedTurn, ConversationDriver, ToolCall, TurnEvent, TurnStream};
pub use events::{EventSink, GenerationEvent};
pub use fixture::FixtureProvider;
pub use planning::normalize_plan;
pub use rate_limit::RateLimitController;
pub use session::{GenerationMode, GenerationSession, SessionOutcome};
pub use tools::{ToolInvocation, ToolSet};

/// Generation bounds and model choices, taken from `[anthropic]` and
/// `[generation]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSettings {
    pub planning_model: String,
    pub generation_model: String,
    pub max_tokens: u32,
    pub max_week_iterations: u32,
    pub max_repair_iterations: u32,
    pub web_search_max_uses: u32,
    pub repair_search_max_uses: u32,
    pub max_rate_limit_retries: u32,
    pub default_rate_limit_reset_secs: u64,
}

impl GenerationSettings {
    pub fn from_config(config: &SyllabindConfig) -> Self {
        let anthropic = &config.anthropic;
        let generation = &config.generation;
        Self {
            planning_model: anthropic.planning_model.clone(),
            generation_model: anthropic.generation_model.clone(),
            max_tokens: anthropic.max_tokens,
            max_week_iterations: generation.max_week_iterations,
            max_repair_iterations: generation.max_repair_iterations,
            web_search_max_uses: generation.web_search_max_uses,
            repair_search_max_uses: generation.repair_search_max_uses,
            max_rate_limit_retries: generation.max_rate_limit_retries,
            default_rate_limit_reset_secs: generation.default_rate_limit_reset_secs,
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::from_config(&SyllabindConfig::default())
    }
}

/// Everything a session needs besides its target and its event sink.
///
/// Cheap to clone; one is shared by every connection of the gateway.
#[derive(Clone)]
pub struct GenerationContext {
    pub provider: Arc<dyn ProviderAdapter>,
    pub store: Arc<dyn SyllabindStore>,
    pub settings: GenerationSettings,
}

impl GenerationContext {
    pub fn new(
        provider: Arc<dyn ProviderAdapter>,
        store: Arc<dyn SyllabindStore>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            provider,
            store,
            settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_config_defaults() {
        let settings = GenerationSettings::default();
        assert_eq!(settings.max_week_iterations, 5);
        assert_eq!(settings.max_repair_iterations, 3);
        assert_eq!(settings.max_rate_limit_retries, 3);
        assert_eq!(settings.web_search_max_uses, 5);
        assert_eq!(settings.repair_search_max_uses, 10);
        assert_ne!(settings.planning_model, settings.generation_model);
    }

    #[test]
    fn settings_pick_up_overrides() {
        let mut config = SyllabindConfig::default();
        config.generation.max_week_iterations = 2;
        config.anthropic.generation_model = "claude-opus-4-1".into();
        let settings = GenerationSettings::from_config(&config);
        assert_eq!(settings.max_week_iterations, 2);
        assert_eq!(settings.generation_model, "claude-opus-4-1");
    }
}
