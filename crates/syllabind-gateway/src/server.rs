// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use dashmap::DashMap;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use syllabind_config::SyllabindConfig;
use syllabind_config::model::ServerConfig;
use syllabind_core::{AuthAdapter, SyllabindError};
use syllabind_generation::{GenerationContext, GenerationMode};

use crate::auth::auth_middleware;
use crate::handlers;
use crate::ws;

/// Health state for the unauthenticated health endpoint.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: Instant,
}

/// A generation currently attached to a WebSocket.
#[derive(Debug, Clone)]
pub struct ActiveGeneration {
    pub syllabind_id: i64,
    pub mode: GenerationMode,
    pub mock: bool,
    pub started_at: Instant,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Provider, store, and bounds handed to every session.
    pub generation: GenerationContext,
    /// Resolves session tokens.
    pub auth: Arc<dyn AuthAdapter>,
    pub server: ServerConfig,
    /// Capacity of each session's event channel.
    pub event_buffer: usize,
    /// Connection id -> running generation.
    pub active: Arc<DashMap<String, ActiveGeneration>>,
    pub health: HealthState,
    /// Cancelled on process shutdown; every session token is a child of it.
    pub shutdown: CancellationToken,
}

impl GatewayState {
    pub fn new(
        generation: GenerationContext,
        auth: Arc<dyn AuthAdapter>,
        config: &SyllabindConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            generation,
            auth,
            server: config.server.clone(),
            event_buffer: config.generation.event_buffer,
            active: Arc::new(DashMap::new()),
            health: HealthState {
                start_time: Instant::now(),
            },
            shutdown,
        }
    }

    /// Number of generations currently running.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

/// Builds the gateway router:
/// - GET /health (public)
/// - POST /api/generate-syllabind (with auth)
/// - POST /api/regenerate-week (with auth)
/// - GET /ws/generate-syllabind/{id} (auth during the handshake)
/// - GET /ws/regenerate-week/{id}/{week_index} (auth during the handshake)
pub fn router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/api/generate-syllabind", post(handlers::post_generate))
        .route("/api/regenerate-week", post(handlers::post_regenerate_week))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state.clone());

    // WebSocket routes (auth happens before the upgrade completes, not via middleware).
    let ws_routes = Router::new()
        .route("/ws/generate-syllabind/{id}", get(ws::generate_ws))
        .route(
            "/ws/regenerate-week/{id}/{week_index}",
            get(ws::regenerate_ws),
        )
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(ws_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// Binds to the configured host:port and serves until shutdown.
pub async fn start_server(state: GatewayState) -> Result<(), SyllabindError> {
    let addr = format!("{}:{}", state.server.host, state.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| SyllabindError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway listening on {addr}");
    serve(listener, state).await
}

/// Serves on an already bound listener until `state.shutdown` fires.
pub async fn serve(listener: TcpListener, state: GatewayState) -> Result<(), SyllabindError> {
    let shutdown = state.shutdown.clone();
    let app = router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| SyllabindError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway stopped");
    Ok(())
}
