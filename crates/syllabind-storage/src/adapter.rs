// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the storage and auth adapter traits.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use syllabind_config::model::StorageConfig;
use syllabind_core::types::{AuthIdentity, StepDraft, Syllabind, Week};
use syllabind_core::{
    AdapterType, AuthAdapter, HealthStatus, PluginAdapter, SyllabindError, SyllabindStore,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily opened on the first call to
/// [`SyllabindStore::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until `initialize` is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, SyllabindError> {
        self.db.get().ok_or_else(|| SyllabindError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    /// Inserts a user. Users are normally provisioned by the platform.
    pub async fn create_user(&self, id: &str, username: &str) -> Result<(), SyllabindError> {
        queries::auth::insert_user(self.db()?, id, username).await
    }

    /// Inserts a session token for a user.
    pub async fn create_session(
        &self,
        token: &str,
        user_id: &str,
        expires_at: Option<&str>,
    ) -> Result<(), SyllabindError> {
        queries::auth::insert_session(self.db()?, token, user_id, expires_at).await
    }

    /// Inserts a syllabind shell ready for generation.
    pub async fn create_syllabind(
        &self,
        title: &str,
        description: &str,
        audience_level: &str,
        duration_weeks: u32,
        creator_id: &str,
    ) -> Result<Syllabind, SyllabindError> {
        queries::syllabinds::insert_syllabind(
            self.db()?,
            title,
            description,
            audience_level,
            duration_weeks,
            creator_id,
        )
        .await
    }

    async fn checkpoint(&self, db: &Database) -> Result<(), SyllabindError> {
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, SyllabindError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SyllabindError> {
        if let Some(db) = self.db.get() {
            self.checkpoint(db).await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl SyllabindStore for SqliteStorage {
    async fn initialize(&self) -> Result<(), SyllabindError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| SyllabindError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), SyllabindError> {
        let db = self.db()?;
        self.checkpoint(db).await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    async fn get_syllabind(&self, id: i64) -> Result<Option<Syllabind>, SyllabindError> {
        queries::syllabinds::get_syllabind(self.db()?, id).await
    }

    async fn list_weeks(&self, syllabind_id: i64) -> Result<Vec<Week>, SyllabindError> {
        queries::weeks::list_weeks(self.db()?, syllabind_id).await
    }

    async fn get_week(
        &self,
        syllabind_id: i64,
        week_index: u32,
    ) -> Result<Option<Week>, SyllabindError> {
        queries::weeks::get_week(self.db()?, syllabind_id, week_index).await
    }

    async fn replace_week(
        &self,
        syllabind_id: i64,
        week_index: u32,
        title: &str,
        description: &str,
        steps: &[StepDraft],
    ) -> Result<Week, SyllabindError> {
        queries::weeks::replace_week(self.db()?, syllabind_id, week_index, title, description, steps)
            .await
    }

    async fn update_step_url(&self, step_id: i64, url: &str) -> Result<bool, SyllabindError> {
        queries::steps::update_step_url(self.db()?, step_id, url).await
    }

    async fn prune_weeks_after(
        &self,
        syllabind_id: i64,
        max_index: u32,
    ) -> Result<u64, SyllabindError> {
        queries::weeks::prune_weeks_after(self.db()?, syllabind_id, max_index).await
    }
}

#[async_trait]
impl AuthAdapter for SqliteStorage {
    async fn authenticate(&self, token: &str) -> Result<Option<AuthIdentity>, SyllabindError> {
        queries::auth::authenticate(self.db()?, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syllabind_core::types::StepType;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    fn reading(title: &str, url: Option<&str>) -> StepDraft {
        StepDraft {
            step_type: StepType::Reading,
            title: title.to_string(),
            url: url.map(str::to_string),
            note: None,
            author: Some("Seneca".into()),
            creation_date: None,
            media_type: Some("Book".into()),
            prompt_text: None,
            estimated_minutes: Some(20),
        }
    }

    async fn ready_storage(dir: &tempfile::TempDir) -> (SqliteStorage, Syllabind) {
        let db_path = dir.path().join("syllabind.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();
        storage.create_user("u1", "ada").await.unwrap();
        let syllabind = storage
            .create_syllabind("Intro to Stoicism", "Ancient ethics", "Beginner", 3, "u1")
            .await
            .unwrap();
        (storage, syllabind)
    }

    #[tokio::test]
    async fn sqlite_storage_implements_plugin_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.version(), semver::Version::new(0, 1, 0));
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(storage.initialize().await.is_err());
    }

    #[tokio::test]
    async fn health_check_fails_when_not_initialized() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("no_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert!(storage.health_check().await.is_err());
        assert!(storage.get_syllabind(1).await.is_err());
    }

    fn exercise(title: &str) -> StepDraft {
        StepDraft {
            step_type: StepType::Exercise,
            title: title.into(),
            prompt_text: Some("List what is up to you.".into()),
            ..reading("unused", None)
        }
    }

    fn full_week(prefix: &str) -> Vec<StepDraft> {
        vec![
            reading(&format!("{prefix} one"), Some("https://a.org/1")),
            reading(&format!("{prefix} two"), None),
            reading(&format!("{prefix} three"), Some("https://a.org/3")),
            exercise(&format!("{prefix} journal")),
        ]
    }

    #[tokio::test]
    async fn replacing_a_week_twice_keeps_its_id() {
        let dir = tempdir().unwrap();
        let (storage, s) = ready_storage(&dir).await;

        let first = storage
            .replace_week(s.id, 1, "Virtue", "d1", &full_week("Old"))
            .await
            .unwrap();
        let second = storage
            .replace_week(s.id, 1, "Virtue, again", "d2", &full_week("New"))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);

        let weeks = storage.list_weeks(s.id).await.unwrap();
        assert_eq!(weeks.len(), 1);
        assert_eq!(weeks[0].title, "Virtue, again");
        let titles: Vec<&str> = weeks[0].steps.iter().map(|st| st.draft.title.as_str()).collect();
        assert_eq!(titles, vec!["New one", "New two", "New three", "New journal"]);
        assert_eq!(weeks[0], second);
    }

    #[tokio::test]
    async fn steps_come_back_ordered_with_all_fields() {
        let dir = tempdir().unwrap();
        let (storage, s) = ready_storage(&dir).await;
        let week = storage
            .replace_week(
                s.id,
                2,
                "Control",
                "",
                &[reading("Enchiridion", None), exercise("Dichotomy journal")],
            )
            .await
            .unwrap();
        let positions: Vec<u32> = week.steps.iter().map(|st| st.position).collect();
        assert_eq!(positions, vec![1, 2]);

        let stored = storage.get_week(s.id, 2).await.unwrap().unwrap();
        let titles: Vec<&str> = stored.steps.iter().map(|st| st.draft.title.as_str()).collect();
        assert_eq!(titles, vec!["Enchiridion", "Dichotomy journal"]);
        assert_eq!(stored.steps[1].draft.step_type, StepType::Exercise);
        assert_eq!(
            stored.steps[1].draft.prompt_text.as_deref(),
            Some("List what is up to you.")
        );
        assert_eq!(stored.steps[0].draft.estimated_minutes, Some(20));
        assert!(stored.steps[0].draft.needs_url());
        assert!(storage.get_week(s.id, 3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_step_insert_rolls_back_the_whole_week() {
        let dir = tempdir().unwrap();
        let (storage, s) = ready_storage(&dir).await;
        let before = storage
            .replace_week(s.id, 1, "Virtue", "d1", &full_week("Old"))
            .await
            .unwrap();

        storage
            .db()
            .unwrap()
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch(
                    "CREATE TRIGGER third_step_fails BEFORE INSERT ON steps
                     WHEN NEW.position = 3
                     BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let err = storage
            .replace_week(s.id, 1, "Virtue, again", "d2", &full_week("New"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("disk full"), "{err}");
        assert_eq!(storage.get_week(s.id, 1).await.unwrap().unwrap(), before);

        let err = storage
            .replace_week(s.id, 2, "Control", "", &full_week("New"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyllabindError::Storage { .. }));
        assert!(storage.get_week(s.id, 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_step_url_and_prune() {
        let dir = tempdir().unwrap();
        let (storage, s) = ready_storage(&dir).await;
        for i in 1..=3 {
            storage
                .replace_week(s.id, i, "w", "", &[reading("r", None)])
                .await
                .unwrap();
        }

        let week1 = storage.get_week(s.id, 1).await.unwrap().unwrap();
        let step_id = week1.steps[0].id;
        assert!(storage.update_step_url(step_id, "https://b.org").await.unwrap());
        assert!(!storage.update_step_url(step_id + 1000, "https://b.org").await.unwrap());

        assert_eq!(storage.prune_weeks_after(s.id, 1).await.unwrap(), 2);
        let weeks = storage.list_weeks(s.id).await.unwrap();
        assert_eq!(weeks.len(), 1);
        assert_eq!(weeks[0].steps[0].draft.url.as_deref(), Some("https://b.org"));

        assert_eq!(storage.prune_weeks_after(s.id, 0).await.unwrap(), 1);
        assert!(storage.list_weeks(s.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn authenticate_through_adapter() {
        let dir = tempdir().unwrap();
        let (storage, _) = ready_storage(&dir).await;
        storage.create_session("tok", "u1", None).await.unwrap();

        let identity = storage.authenticate("tok").await.unwrap().unwrap();
        assert_eq!(identity.user_id, "u1");
        assert!(storage.authenticate("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn close_checkpoints_wal() {
        let dir = tempdir().unwrap();
        let (storage, _) = ready_storage(&dir).await;
        storage.close().await.unwrap();
        storage.shutdown().await.unwrap();
    }
}
