// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Syllabind generation.
//!
//! This crate provides the error type, the shared provider and domain types,
//! and the adapter traits behind which storage, authentication, and the
//! language-model transport live.

pub mod error;
pub mod traits;
pub mod types;

pub use error::SyllabindError;
pub use types::{
    AdapterType, AuthIdentity, ContentBlock, HealthStatus, ProviderMessage, ProviderRequest,
    ProviderStreamChunk, Role, Step, StepDraft, StepType, Syllabind, TokenUsage, Week, WeekPlan,
};

pub use traits::{
    AuthAdapter, PluginAdapter, ProviderAdapter, ProviderStream, SyllabindStore,
};
