// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `syllabind serve` command implementation.
//!
//! Opens SQLite storage, connects the Anthropic provider, and runs the
//! gateway until SIGINT/SIGTERM.

use std::sync::Arc;

use syllabind_anthropic::AnthropicProvider;
use syllabind_config::SyllabindConfig;
use syllabind_core::{SyllabindError, SyllabindStore};
use syllabind_gateway::{GatewayState, start_server};
use syllabind_generation::{GenerationContext, GenerationSettings};
use syllabind_storage::SqliteStorage;
use tracing::{info, warn};

use crate::shutdown;

/// Runs the `syllabind serve` command.
pub async fn run_serve(config: SyllabindConfig) -> Result<(), SyllabindError> {
    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        "starting syllabind serve"
    );

    let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;
    info!(path = %config.storage.database_path, "storage ready");

    let provider = Arc::new(AnthropicProvider::new(&config.anthropic)?);
    let settings = GenerationSettings::from_config(&config);
    let generation = GenerationContext::new(provider, storage.clone(), settings);

    let shutdown = shutdown::install_signal_handler();
    let state = GatewayState::new(generation, storage.clone(), &config, shutdown.clone());
    if state.server.allow_mock {
        warn!("mock generation is enabled; ?mock=true connections skip the provider");
    }

    let result = start_server(state).await;
    // The server may also stop on a bind or accept failure.
    shutdown.cancel();

    if let Err(e) = storage.close().await {
        warn!(error = %e, "storage did not close cleanly");
    }
    info!("syllabind stopped");
    result
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("syllabind={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
