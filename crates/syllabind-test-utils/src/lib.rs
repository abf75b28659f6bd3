// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Syllabind integration tests.
//!
//! Provides mock adapters for fast, deterministic, CI-runnable tests without
//! external services.
//!
//! # Components
//!
//! - [`MockProvider`] - Scripted LLM provider that records every request
//! - [`InMemoryStore`] - Storage and auth adapter backed by plain collections
//! - [`fixtures`] - Builders for tool inputs and step drafts

pub mod fixtures;
pub mod memory_store;
pub mod mock_provider;

pub use memory_store::InMemoryStore;
pub use mock_provider::{MockProvider, MockTurn, TurnBuilder};
