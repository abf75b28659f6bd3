// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.
//!
//! Handles GET /health, POST /api/generate-syllabind, and
//! POST /api/regenerate-week. The two POST endpoints only validate the
//! request and hand back the WebSocket path that runs the generation.

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use syllabind_core::types::{AuthIdentity, HealthStatus};
use syllabind_core::{PluginAdapter, SyllabindError};

use crate::auth::{Rejection, check_week_index, load_owned, parse_syllabind_id};
use crate::server::GatewayState;

/// Request body for POST /api/generate-syllabind.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Accepted as a number or a numeric string.
    pub syllabind_id: Value,
}

/// Request body for POST /api/regenerate-week.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateWeekRequest {
    pub syllabind_id: Value,
    pub week_index: i64,
}

/// Response body for both prepare endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareResponse {
    pub websocket_url: String,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" or "degraded".
    pub status: String,
    /// Binary version.
    pub version: String,
    pub uptime_secs: u64,
    pub active_generations: usize,
    pub storage: String,
    pub provider: String,
}

fn describe(health: Result<HealthStatus, SyllabindError>) -> (bool, String) {
    match health {
        Ok(HealthStatus::Healthy) => (true, "healthy".to_string()),
        Ok(HealthStatus::Degraded(reason)) => (false, format!("degraded: {reason}")),
        Ok(HealthStatus::Unhealthy(reason)) => (false, format!("unhealthy: {reason}")),
        Err(e) => (false, format!("unhealthy: {e}")),
    }
}

fn syllabind_id_from(value: &Value) -> Result<i64, Rejection> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .filter(|id| *id > 0)
            .ok_or_else(|| Rejection::BadRequest(format!("invalid syllabind id: {n}"))),
        Value::String(s) => parse_syllabind_id(s),
        other => Err(Rejection::BadRequest(format!(
            "invalid syllabind id: {other}"
        ))),
    }
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Rejection> {
    body.map(|Json(inner)| inner)
        .map_err(|e| Rejection::BadRequest(e.body_text()))
}

/// GET /health
///
/// Unauthenticated. Reports storage and provider health.
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    let (storage_ok, storage) = describe(state.generation.store.health_check().await);
    let (provider_ok, provider) = describe(state.generation.provider.health_check().await);
    let status = if storage_ok && provider_ok {
        "ok"
    } else {
        "degraded"
    };
    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        active_generations: state.active_count(),
        storage,
        provider,
    })
}

/// POST /api/generate-syllabind
///
/// Checks that the caller owns the syllabind and returns the WebSocket path
/// for a full generation.
pub async fn post_generate(
    State(state): State<GatewayState>,
    Extension(identity): Extension<AuthIdentity>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<PrepareResponse>, Rejection> {
    let body = json_body(body)?;
    let syllabind_id = syllabind_id_from(&body.syllabind_id)?;
    load_owned(&state, &identity, syllabind_id).await?;
    Ok(Json(PrepareResponse {
        websocket_url: format!(
            "{}/ws/generate-syllabind/{syllabind_id}",
            state.server.public_base_path
        ),
    }))
}

/// POST /api/regenerate-week
///
/// Same checks as [`post_generate`] plus a week index within the course.
pub async fn post_regenerate_week(
    State(state): State<GatewayState>,
    Extension(identity): Extension<AuthIdentity>,
    body: Result<Json<RegenerateWeekRequest>, JsonRejection>,
) -> Result<Json<PrepareResponse>, Rejection> {
    let body = json_body(body)?;
    let syllabind_id = syllabind_id_from(&body.syllabind_id)?;
    let syllabind = load_owned(&state, &identity, syllabind_id).await?;
    let week_index = check_week_index(&syllabind, body.week_index)?;
    Ok(Json(PrepareResponse {
        websocket_url: format!(
            "{}/ws/regenerate-week/{syllabind_id}/{week_index}",
            state.server.public_base_path
        ),
    }))
}
