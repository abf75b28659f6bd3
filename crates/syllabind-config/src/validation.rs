// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks the constraints serde cannot express: non-empty paths, usable bind
//! addresses, and generation bounds that must be at least one.

use crate::diagnostic::ConfigError;
use crate::model::SyllabindConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &SyllabindConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::invalid("server.host", "must not be empty"));
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::invalid(
                "server.host",
                format!("`{host}` is not an IP address or hostname"),
            ));
        }
    }

    let base = &config.server.public_base_path;
    if !base.is_empty() && !base.starts_with('/') {
        errors.push(ConfigError::invalid(
            "server.public_base_path",
            format!("must start with `/`, got `{base}`"),
        ));
    }

    if !LOG_LEVELS.contains(&config.service.log_level.as_str()) {
        errors.push(ConfigError::invalid(
            "service.log_level",
            format!(
                "must be one of {}, got `{}`",
                LOG_LEVELS.join(", "),
                config.service.log_level
            ),
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::invalid("storage.database_path", "must not be empty"));
    }

    for (key, model) in [
        ("anthropic.planning_model", &config.anthropic.planning_model),
        ("anthropic.generation_model", &config.anthropic.generation_model),
    ] {
        if model.trim().is_empty() {
            errors.push(ConfigError::invalid(key, "must not be empty"));
        }
    }

    if config.anthropic.max_tokens == 0 {
        errors.push(ConfigError::invalid("anthropic.max_tokens", "must be greater than 0"));
    }

    let generation = &config.generation;
    for (key, value) in [
        ("generation.max_week_iterations", generation.max_week_iterations),
        ("generation.max_repair_iterations", generation.max_repair_iterations),
        ("generation.web_search_max_uses", generation.web_search_max_uses),
        ("generation.repair_search_max_uses", generation.repair_search_max_uses),
    ] {
        if value < 1 {
            errors.push(ConfigError::invalid(key, format!("must be at least 1, got {value}")));
        }
    }

    if generation.default_rate_limit_reset_secs == 0 {
        errors.push(ConfigError::invalid(
            "generation.default_rate_limit_reset_secs",
            "must be greater than 0",
        ));
    }

    if generation.event_buffer == 0 {
        errors.push(ConfigError::invalid("generation.event_buffer", "must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
