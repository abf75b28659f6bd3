// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket endpoints that run a generation session.
//!
//! Each connection walks a small state machine before any generation starts:
//!
//! ```text
//! Unauthenticated -> Authorizing -> Routing -> Active
//!        \              \              \
//!         +--------------+--------------+--> Closed(code)
//! ```
//!
//! Server -> Client (JSON), one frame per [`GenerationEvent`]:
//! ```json
//! {"type": "week_started", "data": {"weekIndex": 1}}
//! {"type": "generation_complete", "data": {}}
//! ```
//!
//! Client -> Server (JSON):
//! ```json
//! {"type": "cancel"}
//! ```

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        Path, Query, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    http::HeaderMap,
    response::Response,
};
use futures::{Sink, SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use syllabind_core::types::{AuthIdentity, Syllabind};
use syllabind_generation::{
    EventSink, FixtureProvider, GenerationEvent, GenerationMode, GenerationSession,
    SessionOutcome,
};

use crate::auth::{
    Rejection, authenticate, check_week_index, close_codes, extract_token, load_owned,
    parse_syllabind_id,
};
use crate::server::{ActiveGeneration, GatewayState};

/// Close reasons are limited to 123 bytes on the wire.
const MAX_CLOSE_REASON: usize = 120;

/// Query parameters accepted on both WebSocket routes.
#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    pub mock: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

impl WsQuery {
    fn mock_requested(&self) -> bool {
        matches!(self.mock.as_deref(), Some("true" | "1"))
    }
}

/// Frames a client may send while a generation runs.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    Cancel,
}

/// Which endpoint a connection came in on, with its raw path segments.
#[derive(Debug, Clone)]
pub enum WsRoute {
    Generate {
        syllabind_id: String,
    },
    RegenerateWeek {
        syllabind_id: String,
        week_index: String,
    },
}

impl WsRoute {
    fn syllabind_id(&self) -> &str {
        match self {
            WsRoute::Generate { syllabind_id } | WsRoute::RegenerateWeek { syllabind_id, .. } => {
                syllabind_id
            }
        }
    }
}

#[derive(Debug)]
enum ConnectionState {
    Unauthenticated,
    Authorizing {
        identity: AuthIdentity,
    },
    Routing {
        syllabind: Syllabind,
    },
    Active {
        syllabind: Syllabind,
        mode: GenerationMode,
    },
    Closed {
        rejection: Rejection,
    },
}

/// A connection on its way to an active generation.
struct Connection {
    id: String,
    route: WsRoute,
    token: Option<String>,
    mock: bool,
    state: ConnectionState,
}

impl Connection {
    fn new(route: WsRoute, token: Option<String>, mock: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            route,
            token,
            mock,
            state: ConnectionState::Unauthenticated,
        }
    }

    /// Moves one step through the state machine.
    async fn advance(&mut self, gateway: &GatewayState) {
        let current = std::mem::replace(&mut self.state, ConnectionState::Unauthenticated);
        self.state = match self.transition(current, gateway).await {
            Ok(next) => next,
            Err(rejection) => ConnectionState::Closed { rejection },
        };
    }

    async fn transition(
        &self,
        current: ConnectionState,
        gateway: &GatewayState,
    ) -> Result<ConnectionState, Rejection> {
        match current {
            ConnectionState::Unauthenticated => {
                let identity = authenticate(gateway, self.token.as_deref()).await?;
                Ok(ConnectionState::Authorizing { identity })
            }
            ConnectionState::Authorizing { identity } => {
                let syllabind_id = parse_syllabind_id(self.route.syllabind_id())?;
                let syllabind = load_owned(gateway, &identity, syllabind_id).await?;
                Ok(ConnectionState::Routing { syllabind })
            }
            ConnectionState::Routing { syllabind } => {
                let mode = match &self.route {
                    WsRoute::Generate { .. } => GenerationMode::Full,
                    WsRoute::RegenerateWeek { week_index, .. } => {
                        let raw = week_index.trim().parse::<i64>().map_err(|_| {
                            Rejection::BadRequest(format!("invalid week index: {week_index}"))
                        })?;
                        GenerationMode::RegenerateWeek(check_week_index(&syllabind, raw)?)
                    }
                };
                if self.mock && !gateway.server.allow_mock {
                    return Err(Rejection::BadRequest(
                        "mock generation is disabled".to_string(),
                    ));
                }
                Ok(ConnectionState::Active { syllabind, mode })
            }
            terminal @ (ConnectionState::Active { .. } | ConnectionState::Closed { .. }) => {
                Ok(terminal)
            }
        }
    }

    /// Runs the handshake checks to a terminal state.
    async fn authorize(
        &mut self,
        gateway: &GatewayState,
    ) -> Result<(Syllabind, GenerationMode), Rejection> {
        loop {
            match &self.state {
                ConnectionState::Active { .. } | ConnectionState::Closed { .. } => break,
                _ => self.advance(gateway).await,
            }
        }
        match std::mem::replace(&mut self.state, ConnectionState::Unauthenticated) {
            ConnectionState::Active { syllabind, mode } => Ok((syllabind, mode)),
            ConnectionState::Closed { rejection } => Err(rejection),
            _ => Err(Rejection::Internal("connection left the handshake early".into())),
        }
    }
}

/// GET /ws/generate-syllabind/{id}
pub async fn generate_ws(
    ws: WebSocketUpgrade,
    Path(syllabind_id): Path<String>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    State(state): State<GatewayState>,
) -> Response {
    let token = extract_token(&headers, query.token.as_deref());
    let connection = Connection::new(
        WsRoute::Generate { syllabind_id },
        token,
        query.mock_requested(),
    );
    ws.on_upgrade(move |socket| handle_socket(socket, state, connection))
}

/// GET /ws/regenerate-week/{id}/{week_index}
pub async fn regenerate_ws(
    ws: WebSocketUpgrade,
    Path((syllabind_id, week_index)): Path<(String, String)>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    State(state): State<GatewayState>,
) -> Response {
    let token = extract_token(&headers, query.token.as_deref());
    let connection = Connection::new(
        WsRoute::RegenerateWeek {
            syllabind_id,
            week_index,
        },
        token,
        query.mock_requested(),
    );
    ws.on_upgrade(move |socket| handle_socket(socket, state, connection))
}

async fn handle_socket(mut socket: WebSocket, state: GatewayState, mut connection: Connection) {
    match connection.authorize(&state).await {
        Ok((syllabind, mode)) => {
            run_generation(socket, state, connection.id, syllabind, mode, connection.mock).await;
        }
        Err(rejection) => {
            info!(
                connection_id = %connection.id,
                route = ?connection.route,
                code = rejection.close_code(),
                reason = %rejection.message(),
                "rejecting websocket"
            );
            let frame = GenerationEvent::Error {
                message: rejection.message(),
            };
            if send_event(&mut socket, &frame).await {
                close(&mut socket, rejection.close_code(), &rejection.message()).await;
            }
        }
    }
}

/// Runs a session and relays its events until the session ends.
///
/// The socket is read concurrently: a `cancel` frame or a client disconnect
/// cancels the session, which then stops at its next checkpoint.
async fn run_generation(
    socket: WebSocket,
    state: GatewayState,
    connection_id: String,
    syllabind: Syllabind,
    mode: GenerationMode,
    mock: bool,
) {
    let mut ctx = state.generation.clone();
    if mock {
        ctx.provider = Arc::new(FixtureProvider::new(
            syllabind.title.clone(),
            syllabind.duration_weeks,
        ));
    }

    let cancel = state.shutdown.child_token();
    let (sink, mut events) = EventSink::channel(state.event_buffer, cancel.clone());
    state.active.insert(
        connection_id.clone(),
        ActiveGeneration {
            syllabind_id: syllabind.id,
            mode,
            mock,
            started_at: Instant::now(),
        },
    );
    info!(
        connection_id = %connection_id,
        syllabind_id = syllabind.id,
        ?mode,
        mock,
        "generation attached"
    );

    let session = GenerationSession::new(ctx, syllabind, mode, sink, cancel.clone());
    let task = tokio::spawn(session.run());
    let (mut sender, mut receiver) = socket.split();
    let mut client_gone = false;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if client_gone {
                    continue;
                }
                if !send_event(&mut sender, &event).await {
                    debug!(connection_id = %connection_id, "client stopped receiving");
                    client_gone = true;
                    cancel.cancel();
                }
            }
            incoming = receiver.next(), if !client_gone => match incoming {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ClientFrame>(text.as_str()) {
                        Ok(ClientFrame::Cancel) => {
                            info!(connection_id = %connection_id, "client cancelled generation");
                            cancel.cancel();
                        }
                        Err(e) => debug!(connection_id = %connection_id, error = %e, "ignoring client frame"),
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    debug!(connection_id = %connection_id, "client disconnected");
                    client_gone = true;
                    cancel.cancel();
                }
                Some(Ok(_)) => {}
            },
        }
    }

    let result = task.await;
    if let Some((_, active)) = state.active.remove(&connection_id) {
        debug!(
            connection_id = %connection_id,
            elapsed_ms = active.started_at.elapsed().as_millis() as u64,
            "generation detached"
        );
    }
    if client_gone {
        return;
    }

    match result {
        Ok(Ok(outcome)) => {
            let code = if outcome == SessionOutcome::Cancelled && state.shutdown.is_cancelled() {
                close_codes::GOING_AWAY
            } else {
                close_codes::NORMAL
            };
            close(&mut sender, code, "generation finished").await;
        }
        Ok(Err(e)) => {
            warn!(connection_id = %connection_id, error = %e, "generation failed");
            let frame = GenerationEvent::Error {
                message: e.to_string(),
            };
            if send_event(&mut sender, &frame).await {
                close(&mut sender, close_codes::INTERNAL, "generation failed").await;
            }
        }
        Err(e) => {
            warn!(connection_id = %connection_id, error = %e, "generation task panicked");
            let frame = GenerationEvent::Error {
                message: "internal error".to_string(),
            };
            if send_event(&mut sender, &frame).await {
                close(&mut sender, close_codes::INTERNAL, "internal error").await;
            }
        }
    }
}

/// Sends one event as a text frame. Returns `false` once the client is gone.
async fn send_event<S>(sink: &mut S, event: &GenerationEvent) -> bool
where
    S: Sink<Message> + Unpin,
{
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "could not serialize event");
            return true;
        }
    };
    sink.send(Message::Text(text.into())).await.is_ok()
}

async fn close<S>(sink: &mut S, code: u16, reason: &str)
where
    S: Sink<Message> + Unpin,
{
    let frame = CloseFrame {
        code,
        reason: truncate_reason(reason).into(),
    };
    let _ = sink.send(Message::Close(Some(frame))).await;
}

fn truncate_reason(reason: &str) -> String {
    if reason.len() <= MAX_CLOSE_REASON {
        return reason.to_string();
    }
    let mut end = MAX_CLOSE_REASON;
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    reason[..end].to_string()
}
