// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait shared by provider, storage, and auth adapters.

use async_trait::async_trait;

use crate::error::SyllabindError;
use crate::types::{AdapterType, HealthStatus};

/// The base trait for every external collaborator behind a trait object.
///
/// Provides identity, lifecycle, and health check capabilities so the
/// gateway can report on whatever adapters it was built with.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this adapter instance.
    fn name(&self) -> &str;

    /// Returns the semantic version of this adapter.
    fn version(&self) -> semver::Version;

    /// Returns the kind of adapter.
    fn adapter_type(&self) -> AdapterType;

    /// Performs a health check and returns the adapter's current status.
    async fn health_check(&self) -> Result<HealthStatus, SyllabindError>;

    /// Gracefully shuts down the adapter, releasing any held resources.
    async fn shutdown(&self) -> Result<(), SyllabindError>;
}
