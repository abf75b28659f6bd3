// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Lookup order: `./syllabind.toml` > `~/.config/syllabind/syllabind.toml` >
//! `/etc/syllabind/syllabind.toml`, with `SYLLABIND_` environment overrides on top.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::SyllabindConfig;

/// Section names that environment keys may be prefixed with.
const SECTIONS: &[&str] = &["service", "server", "anthropic", "generation", "storage"];

/// Path of the system-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/syllabind/syllabind.toml";

/// File name of the local and user config files.
pub const CONFIG_FILE_NAME: &str = "syllabind.toml";

/// Path of the per-user config file, if a config directory exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("syllabind").join(CONFIG_FILE_NAME))
}

/// Load configuration from the standard hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/syllabind/syllabind.toml`
/// 3. `~/.config/syllabind/syllabind.toml`
/// 4. `./syllabind.toml`
/// 5. `SYLLABIND_*` environment variables
pub fn load_config() -> Result<SyllabindConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<SyllabindConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SyllabindConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from one explicit file with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SyllabindConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SyllabindConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The Figment used by [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(SyllabindConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(CONFIG_FILE_NAME))
        .merge(env_provider())
}

/// Environment provider with explicit section mapping.
///
/// Keys keep their underscores: `SYLLABIND_GENERATION_MAX_WEEK_ITERATIONS`
/// maps to `generation.max_week_iterations`, never to nested tables.
fn env_provider() -> Env {
    Env::prefixed("SYLLABIND_").map(|key| map_env_key(key.as_str()).into())
}

/// Maps a lowercased, prefix-stripped env key to a dotted config path.
fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("server_port"), "server.port");
        assert_eq!(
            map_env_key("generation_max_week_iterations"),
            "generation.max_week_iterations"
        );
        assert_eq!(map_env_key("anthropic_api_key"), "anthropic.api_key");
    }

    #[test]
    fn unknown_prefix_passes_through() {
        assert_eq!(map_env_key("serverless"), "serverless");
        assert_eq!(map_env_key("other_key"), "other_key");
    }

    #[test]
    fn env_override_wins_over_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(CONFIG_FILE_NAME, "[server]\nport = 7000\n")?;
            jail.set_env("SYLLABIND_SERVER_PORT", "7100");
            let config: SyllabindConfig = Figment::new()
                .merge(Serialized::defaults(SyllabindConfig::default()))
                .merge(Toml::file(CONFIG_FILE_NAME))
                .merge(env_provider())
                .extract()?;
            assert_eq!(config.server.port, 7100);
            Ok(())
        });
    }
}
