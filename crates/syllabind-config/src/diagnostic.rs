// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-to-miette error bridge with "did you mean" suggestions.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity for a key to be suggested.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration error with enough context for miette to render it.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key or section that `syllabind.toml` does not define.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(syllabind::config::unknown_key),
        help("{}", unknown_key_help(section.as_deref(), suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Enclosing table, `None` for a top-level section name.
        section: Option<String>,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value of the wrong TOML or env type.
    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(
        code(syllabind::config::invalid_type),
        help("expected {expected}; the same key can be set with {}", env_var_for(key))
    )]
    InvalidType {
        /// Dotted path, e.g. `server.port`.
        key: String,
        detail: String,
        expected: String,
        #[label("wrong type here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(code(syllabind::config::missing_key), help("{}", missing_key_help(key)))]
    MissingKey { key: String },

    /// A value that parsed but cannot drive the service.
    #[error("invalid `{key}`: {message}")]
    #[diagnostic(code(syllabind::config::validation), help("{}", validation_hint(key)))]
    Validation { key: String, message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(syllabind::config::other))]
    Other(String),
}

impl ConfigError {
    /// Shorthand for a [`ConfigError::Validation`] on a dotted key.
    pub fn invalid(key: &str, message: impl Into<String>) -> Self {
        ConfigError::Validation {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Environment variable that overrides a dotted config key.
///
/// `generation.event_buffer` becomes `SYLLABIND_GENERATION_EVENT_BUFFER`.
pub fn env_var_for(key: &str) -> String {
    format!("SYLLABIND_{}", key.replace('.', "_").to_uppercase())
}

fn unknown_key_help(section: Option<&str>, suggestion: Option<&str>, valid_keys: &str) -> String {
    let scope = match section {
        Some(section) => format!("[{section}] accepts"),
        None => "syllabind.toml has the sections".to_string(),
    };
    match suggestion {
        Some(s) => format!("did you mean `{s}`? {scope}: {valid_keys}"),
        None => format!("{scope}: {valid_keys}"),
    }
}

fn missing_key_help(key: &str) -> String {
    match key.rsplit_once('.') {
        Some((section, field)) => format!(
            "add `{field} = <value>` under [{section}] in syllabind.toml, or set {}",
            env_var_for(key)
        ),
        None => format!("add `{key} = <value>` to syllabind.toml"),
    }
}

/// What a key controls, shown under validation failures.
fn validation_hint(key: &str) -> &'static str {
    match key {
        "server.host" => "the address the gateway binds, e.g. 127.0.0.1 or 0.0.0.0",
        "server.public_base_path" => {
            "prefix the web client puts in front of /ws/... URLs, e.g. /generation; leave empty for none"
        }
        "service.log_level" => "RUST_LOG overrides this at runtime",
        "storage.database_path" => "path of the SQLite file, e.g. ./data/syllabind.db",
        "anthropic.planning_model" => "model that plans the weekly outline, e.g. a Haiku model",
        "anthropic.generation_model" => "model that fills and repairs weeks, e.g. a Sonnet model",
        "anthropic.max_tokens" => "output token cap for every model turn",
        "generation.max_week_iterations" | "generation.max_repair_iterations" => {
            "number of model turns a week or the url repair may take; 1 allows no correction"
        }
        "generation.web_search_max_uses" | "generation.repair_search_max_uses" => {
            "web searches the model may run per turn"
        }
        "generation.default_rate_limit_reset_secs" => {
            "countdown used when a rate limit arrives without a reset time"
        }
        "generation.event_buffer" => "events queued per connection before the session waits",
        _ => "see the defaults printed by `syllabind check`",
    }
}

/// Convert a `figment::Error` (which may hold several errors) into diagnostics.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let path: Vec<String> = error.path.iter().map(|s| s.to_string()).collect();
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let valid_keys: Vec<&str> = expected.to_vec();
                    let (span, src) = locate_key(&error, &path, field, toml_sources);
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        section: path.first().cloned(),
                        suggestion: suggest_key(field, &valid_keys),
                        valid_keys: valid_keys.join(", "),
                        span,
                        src,
                    }
                }
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: path
                        .iter()
                        .map(String::as_str)
                        .chain(std::iter::once(&**field))
                        .collect::<Vec<_>>()
                        .join("."),
                },
                Kind::InvalidType(actual, expected) => {
                    let (span, src) = match path.split_last() {
                        Some((field, section)) => locate_key(&error, section, field, toml_sources),
                        None => (None, None),
                    };
                    ConfigError::InvalidType {
                        key: path.join("."),
                        detail: format!("found {actual}, expected {expected}"),
                        expected: expected.to_string(),
                        span,
                        src,
                    }
                }
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// Finds the file and byte span of an offending key, when the error came from a file.
fn locate_key(
    error: &figment::error::Error,
    section: &[String],
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let source_path = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });

    let Some((path, content)) = source_path.and_then(|path| {
        toml_sources
            .iter()
            .find(|(p, _)| *p == path)
            .map(|(p, c)| (p.clone(), c.clone()))
    }) else {
        return (None, None);
    };

    match find_key_offset(&content, section, field) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(path, content)),
        ),
        None => (None, None),
    }
}

/// Byte offset of `field` inside the `[section]` table named by `path[0]`.
///
/// Top-level fields are searched from the start of the file.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let search_start = match path.first() {
        None => 0,
        Some(section) => {
            let header = format!("[{section}]");
            content.find(&header)? + header.len()
        }
    };

    let mut offset = search_start;
    for line in content[search_start..].split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') && offset != search_start {
            // Next table reached without a match.
            return None;
        }
        if let Some(after) = trimmed.strip_prefix(field) {
            if after.starts_with([' ', '=', '\t']) {
                return Some(offset + (line.len() - trimmed.len()));
            }
        }
        offset += line.len();
    }

    None
}

/// Best valid key above the similarity threshold, if any.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Render errors to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        let diagnostic: &dyn Diagnostic = error;
        if handler.render_report(&mut buf, diagnostic).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}
