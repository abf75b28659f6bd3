// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication and ownership checks for the gateway.
//!
//! A session token is accepted from, in order:
//! 1. `Authorization: Bearer <token>`
//! 2. the `syllabind_session` cookie
//! 3. a `token` query parameter (browsers cannot set headers on WebSockets)
//!
//! Every check fails with a [`Rejection`], which knows both its HTTP status
//! and its WebSocket close code.

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{debug, warn};

use syllabind_core::types::{AuthIdentity, Syllabind};
use syllabind_core::{AuthAdapter, SyllabindStore};

use crate::server::GatewayState;

/// Cookie carrying the platform session token.
pub const SESSION_COOKIE: &str = "syllabind_session";

/// WebSocket close codes sent by the gateway.
pub mod close_codes {
    pub const NORMAL: u16 = 1000;
    pub const GOING_AWAY: u16 = 1001;
    pub const INTERNAL: u16 = 1011;
    pub const INVALID_REQUEST: u16 = 4400;
    pub const UNAUTHENTICATED: u16 = 4401;
    pub const FORBIDDEN: u16 = 4403;
    pub const NOT_FOUND: u16 = 4404;
}

/// Why a request or connection was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Unauthenticated,
    Forbidden,
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::Unauthenticated => StatusCode::UNAUTHORIZED,
            Rejection::Forbidden => StatusCode::FORBIDDEN,
            Rejection::NotFound(_) => StatusCode::NOT_FOUND,
            Rejection::BadRequest(_) => StatusCode::BAD_REQUEST,
            Rejection::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn close_code(&self) -> u16 {
        match self {
            Rejection::Unauthenticated => close_codes::UNAUTHENTICATED,
            Rejection::Forbidden => close_codes::FORBIDDEN,
            Rejection::NotFound(_) => close_codes::NOT_FOUND,
            Rejection::BadRequest(_) => close_codes::INVALID_REQUEST,
            Rejection::Internal(_) => close_codes::INTERNAL,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Rejection::Unauthenticated => "authentication required".to_string(),
            Rejection::Forbidden => "only the creator can generate this syllabind".to_string(),
            Rejection::NotFound(what) => format!("{what} not found"),
            Rejection::BadRequest(message) => message.clone(),
            Rejection::Internal(message) => message.clone(),
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}

/// Finds the session token in headers or the query string.
pub fn extract_token(headers: &HeaderMap, query_token: Option<&str>) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    let cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string());
    if cookie.is_some() {
        return cookie;
    }

    query_token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Resolves a token to an identity.
pub async fn authenticate(
    state: &GatewayState,
    token: Option<&str>,
) -> Result<AuthIdentity, Rejection> {
    let token = token.ok_or(Rejection::Unauthenticated)?;
    match state.auth.authenticate(token).await {
        Ok(Some(identity)) => Ok(identity),
        Ok(None) => {
            debug!("unknown or expired session token");
            Err(Rejection::Unauthenticated)
        }
        Err(e) => {
            warn!(error = %e, "auth adapter failed");
            Err(Rejection::Unauthenticated)
        }
    }
}

/// Parses a syllabind id from a path or body value.
pub fn parse_syllabind_id(raw: &str) -> Result<i64, Rejection> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(Rejection::BadRequest(format!("invalid syllabind id: {raw}"))),
    }
}

/// Checks a week index against the course length.
pub fn check_week_index(syllabind: &Syllabind, week_index: i64) -> Result<u32, Rejection> {
    match u32::try_from(week_index) {
        Ok(index) if (1..=syllabind.duration_weeks).contains(&index) => Ok(index),
        _ => Err(Rejection::BadRequest(format!(
            "week index {week_index} is outside 1..={}",
            syllabind.duration_weeks
        ))),
    }
}

/// Loads a syllabind and checks that `identity` created it.
pub async fn load_owned(
    state: &GatewayState,
    identity: &AuthIdentity,
    syllabind_id: i64,
) -> Result<Syllabind, Rejection> {
    let syllabind = match state.generation.store.get_syllabind(syllabind_id).await {
        Ok(Some(syllabind)) => syllabind,
        Ok(None) => return Err(Rejection::NotFound(format!("syllabind {syllabind_id}"))),
        Err(e) => {
            warn!(syllabind_id, error = %e, "could not load syllabind");
            return Err(Rejection::Internal("storage unavailable".to_string()));
        }
    };
    if syllabind.creator_id != identity.user_id {
        debug!(syllabind_id, user_id = %identity.user_id, "not the creator");
        return Err(Rejection::Forbidden);
    }
    Ok(syllabind)
}

/// Middleware for the `/api` routes: authenticates the caller and stores the
/// [`AuthIdentity`] in the request extensions.
pub async fn auth_middleware(
    State(state): State<GatewayState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Rejection> {
    let query_token = request
        .uri()
        .query()
        .and_then(|q| q.split('&').find_map(|kv| kv.strip_prefix("token=")))
        .map(str::to_string);
    let token = extract_token(request.headers(), query_token.as_deref());
    let identity = authenticate(&state, token.as_deref()).await?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
