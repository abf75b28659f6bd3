// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication adapter trait for session validation.

use async_trait::async_trait;

use crate::error::SyllabindError;
use crate::traits::adapter::PluginAdapter;
use crate::types::AuthIdentity;

/// Resolves an opaque session token to a verified identity.
#[async_trait]
pub trait AuthAdapter: PluginAdapter {
    /// Returns the identity for `token`, or `None` if it is unknown or expired.
    async fn authenticate(&self, token: &str) -> Result<Option<AuthIdentity>, SyllabindError>;
}
