// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Syllabind - AI syllabind generation service.
//!
//! This is the binary entry point for the generation gateway.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use syllabind_config::{ConfigError, SyllabindConfig};

/// Syllabind - AI syllabind generation service.
#[derive(Parser, Debug)]
#[command(name = "syllabind", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the generation gateway (default).
    Serve,
    /// Validate configuration and print the effective values.
    Check,
}

fn load(path: Option<&PathBuf>) -> Result<SyllabindConfig, Vec<ConfigError>> {
    match path {
        Some(path) => syllabind_config::load_and_validate_path(path),
        None => syllabind_config::load_and_validate(),
    }
}

/// Effective configuration as TOML, with the API key masked.
fn render_effective(config: &SyllabindConfig) -> Result<String, toml::ser::Error> {
    let mut shown = config.clone();
    if shown.anthropic.api_key.is_some() {
        shown.anthropic.api_key = Some("[redacted]".to_string());
    }
    toml::to_string_pretty(&shown)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            syllabind_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Commands::Check => match render_effective(&config) {
            Ok(text) => {
                eprintln!("syllabind: config is valid");
                print!("{text}");
            }
            Err(e) => {
                eprintln!("error: could not render config: {e}");
                std::process::exit(1);
            }
        },
    }
}
