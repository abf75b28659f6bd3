// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory storage and auth adapter.
//!
//! Mirrors the SQLite adapter's semantics without touching disk: weeks are
//! replaced by index in one step, and a failed replacement leaves the stored
//! week untouched.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use syllabind_core::SyllabindError;
use syllabind_core::traits::{AuthAdapter, PluginAdapter, SyllabindStore};
use syllabind_core::types::{
    AdapterType, AuthIdentity, HealthStatus, Step, StepDraft, Syllabind, Week,
};

#[derive(Default)]
struct Inner {
    syllabinds: BTreeMap<i64, Syllabind>,
    /// Keyed by `(syllabind_id, week_index)`.
    weeks: BTreeMap<(i64, u32), Week>,
    sessions: HashMap<String, AuthIdentity>,
    next_syllabind_id: i64,
    next_week_id: i64,
    next_step_id: i64,
}

/// Storage and auth adapter backed by plain collections.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
    unavailable: Arc<AtomicBool>,
    step_writes: Arc<AtomicU64>,
    /// Step write number that fails; 0 means none.
    failing_step_write: Arc<AtomicU64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with a storage error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes the `nth` step written from now on fail with a storage error.
    ///
    /// The week being replaced at that point is rolled back. Later writes
    /// succeed again.
    pub fn fail_step_write(&self, nth: u64) {
        let done = self.step_writes.load(Ordering::SeqCst);
        self.failing_step_write.store(done + nth, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), SyllabindError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SyllabindError::storage(std::io::Error::other(
                "in-memory store unavailable",
            )));
        }
        Ok(())
    }

    /// Inserts a syllabind and returns it with its assigned id.
    pub async fn seed_syllabind(
        &self,
        title: &str,
        description: &str,
        audience_level: &str,
        duration_weeks: u32,
        creator_id: &str,
    ) -> Syllabind {
        let mut inner = self.inner.lock().await;
        inner.next_syllabind_id += 1;
        let syllabind = Syllabind {
            id: inner.next_syllabind_id,
            title: title.to_string(),
            description: description.to_string(),
            audience_level: audience_level.to_string(),
            duration_weeks,
            creator_id: creator_id.to_string(),
        };
        inner.syllabinds.insert(syllabind.id, syllabind.clone());
        syllabind
    }

    /// Registers a session token for a user.
    pub async fn add_session(&self, token: &str, user_id: &str, username: &str) {
        self.inner.lock().await.sessions.insert(
            token.to_string(),
            AuthIdentity {
                user_id: user_id.to_string(),
                username: username.to_string(),
            },
        );
    }
}

#[async_trait]
impl PluginAdapter for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, SyllabindError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Ok(HealthStatus::Unhealthy("unavailable".into()));
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SyllabindError> {
        Ok(())
    }
}

#[async_trait]
impl SyllabindStore for InMemoryStore {
    async fn initialize(&self) -> Result<(), SyllabindError> {
        self.check()
    }

    async fn close(&self) -> Result<(), SyllabindError> {
        Ok(())
    }

    async fn get_syllabind(&self, id: i64) -> Result<Option<Syllabind>, SyllabindError> {
        self.check()?;
        Ok(self.inner.lock().await.syllabinds.get(&id).cloned())
    }

    async fn list_weeks(&self, syllabind_id: i64) -> Result<Vec<Week>, SyllabindError> {
        self.check()?;
        let inner = self.inner.lock().await;
        Ok(inner
            .weeks
            .range((syllabind_id, 0)..=(syllabind_id, u32::MAX))
            .map(|(_, week)| week.clone())
            .collect())
    }

    async fn get_week(
        &self,
        syllabind_id: i64,
        week_index: u32,
    ) -> Result<Option<Week>, SyllabindError> {
        self.check()?;
        Ok(self
            .inner
            .lock()
            .await
            .weeks
            .get(&(syllabind_id, week_index))
            .cloned())
    }

    async fn replace_week(
        &self,
        syllabind_id: i64,
        week_index: u32,
        title: &str,
        description: &str,
        steps: &[StepDraft],
    ) -> Result<Week, SyllabindError> {
        self.check()?;
        let failing = self.failing_step_write.load(Ordering::SeqCst);
        for _ in steps {
            let write = self.step_writes.fetch_add(1, Ordering::SeqCst) + 1;
            if write == failing {
                return Err(SyllabindError::storage(std::io::Error::other("disk full")));
            }
        }

        let mut inner = self.inner.lock().await;
        let id = match inner.weeks.get(&(syllabind_id, week_index)) {
            Some(existing) => existing.id,
            None => {
                inner.next_week_id += 1;
                inner.next_week_id
            }
        };
        let mut stored = Vec::with_capacity(steps.len());
        for (position, draft) in (1u32..).zip(steps.iter()) {
            inner.next_step_id += 1;
            stored.push(Step {
                id: inner.next_step_id,
                position,
                draft: draft.clone(),
            });
        }
        let week = Week {
            id,
            syllabind_id,
            week_index,
            title: title.to_string(),
            description: description.to_string(),
            steps: stored,
        };
        inner.weeks.insert((syllabind_id, week_index), week.clone());
        Ok(week)
    }

    async fn update_step_url(&self, step_id: i64, url: &str) -> Result<bool, SyllabindError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        let step = inner
            .weeks
            .values_mut()
            .flat_map(|w| w.steps.iter_mut())
            .find(|s| s.id == step_id);
        match step {
            Some(step) => {
                step.draft.url = Some(url.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn prune_weeks_after(
        &self,
        syllabind_id: i64,
        max_index: u32,
    ) -> Result<u64, SyllabindError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        let before = inner.weeks.len();
        inner
            .weeks
            .retain(|(sid, index), _| *sid != syllabind_id || *index <= max_index);
        Ok((before - inner.weeks.len()) as u64)
    }
}

#[async_trait]
impl AuthAdapter for InMemoryStore {
    async fn authenticate(&self, token: &str) -> Result<Option<AuthIdentity>, SyllabindError> {
        self.check()?;
        Ok(self.inner.lock().await.sessions.get(token).cloned())
    }
}
