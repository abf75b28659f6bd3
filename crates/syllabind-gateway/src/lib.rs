// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket gateway for syllabind generation.
//!
//! Two small REST endpoints check ownership and return a WebSocket path; the
//! WebSocket endpoints authenticate, authorize, and then run one
//! [`GenerationSession`](syllabind_generation::GenerationSession) per
//! connection, relaying its events as JSON frames.

pub mod auth;
pub mod handlers;
pub mod server;
pub mod ws;

pub use auth::{Rejection, close_codes};
pub use server::{ActiveGeneration, GatewayState, HealthState, router, serve, start_server};
