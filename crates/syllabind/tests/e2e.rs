// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the assembled service: SQLite storage on a temp
//! file, the gateway on a real socket, and a scripted provider.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;
use syllabind_config::SyllabindConfig;
use syllabind_config::model::StorageConfig;
use syllabind_core::SyllabindStore;
use syllabind_core::types::StepType;
use syllabind_gateway::{GatewayState, serve};
use syllabind_generation::{GenerationContext, GenerationSettings};
use syllabind_storage::SqliteStorage;
use syllabind_test_utils::fixtures::{
    exercise, finalize_input, finalize_steps_only, plan_input, provide_urls_input, reading,
    week_steps,
};
use syllabind_test_utils::{MockProvider, MockTurn};
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

const TOKEN: &str = "session-token";

struct Harness {
    storage: Arc<SqliteStorage>,
    addr: std::net::SocketAddr,
    shutdown: CancellationToken,
    _dir: tempfile::TempDir,
}

impl Harness {
    async fn start(provider: MockProvider) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("e2e.db").display().to_string(),
            wal_mode: true,
        }));
        storage.initialize().await.unwrap();
        storage.create_user("creator-1", "ada").await.unwrap();
        storage.create_session(TOKEN, "creator-1", None).await.unwrap();

        let generation = GenerationContext::new(
            Arc::new(provider),
            storage.clone(),
            GenerationSettings::default(),
        );
        let shutdown = CancellationToken::new();
        let state = GatewayState::new(
            generation,
            storage.clone(),
            &SyllabindConfig::default(),
            shutdown.clone(),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, state));

        Self {
            storage,
            addr,
            shutdown,
            _dir: dir,
        }
    }

    async fn run(&self, path: &str) -> (Vec<Value>, Option<u16>) {
        let url = format!("ws://{}{path}?token={TOKEN}", self.addr);
        let (mut socket, _) = connect_async(url.as_str()).await.unwrap();
        let mut frames = Vec::new();
        let mut code = None;
        let read = async {
            while let Some(Ok(message)) = socket.next().await {
                match message {
                    Message::Text(text) => frames.push(serde_json::from_str(text.as_str()).unwrap()),
                    Message::Close(frame) => {
                        code = frame.map(|f| u16::from(f.code));
                        break;
                    }
                    _ => {}
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(10), read)
            .await
            .expect("session did not finish");
        (frames, code)
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn kinds(frames: &[Value]) -> Vec<&str> {
    frames.iter().filter_map(|f| f["type"].as_str()).collect()
}

#[tokio::test]
async fn full_generation_persists_to_sqlite() {
    let provider = MockProvider::with_turns(vec![
        MockTurn::builder()
            .tool_call(
                "toolu_plan",
                "plan_curriculum",
                plan_input(&[
                    (1, "What is up to us", "The dichotomy of control"),
                    (2, "Living by nature", "Virtue and the cosmos"),
                ]),
            )
            .build(),
        MockTurn::builder()
            .server_search("srvtoolu_1", "Epictetus Enchiridion translation")
            .tool_call("toolu_w1", "finalize_week", finalize_steps_only(week_steps(1)))
            .build(),
        MockTurn::builder()
            .tool_call("toolu_w2", "finalize_week", finalize_steps_only(week_steps(2)))
            .build(),
    ]);
    let harness = Harness::start(provider).await;
    let syllabind = harness
        .storage
        .create_syllabind("Intro to Stoicism", "Ancient ethics", "Beginner", 2, "creator-1")
        .await
        .unwrap();

    let (frames, code) = harness
        .run(&format!("/ws/generate-syllabind/{}", syllabind.id))
        .await;
    assert_eq!(code, Some(1000));
    let kinds = kinds(&frames);
    assert_eq!(kinds.first(), Some(&"planning_started"));
    assert_eq!(kinds.last(), Some(&"generation_complete"));
    assert!(kinds.contains(&"searching"));
    assert!(!kinds.contains(&"url_repair_started"));

    let weeks = harness.storage.list_weeks(syllabind.id).await.unwrap();
    assert_eq!(weeks.len(), 2);
    assert_eq!(weeks[0].title, "What is up to us");
    for week in &weeks {
        let types: Vec<StepType> = week.steps.iter().map(|s| s.draft.step_type).collect();
        assert_eq!(
            types,
            vec![StepType::Reading, StepType::Reading, StepType::Reading, StepType::Exercise]
        );
        let positions: Vec<u32> = week.steps.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![1, 2, 3, 4]);
    }
}

#[tokio::test]
async fn missing_urls_are_repaired_in_sqlite() {
    let steps = vec![
        reading("Enchiridion", Some("https://example.org/enchiridion")),
        reading("Discourses", None),
        reading("Meditations", Some("https://example.org/meditations")),
        exercise("Journal", "Write down what is up to you today."),
    ];
    let provider = MockProvider::with_turns(vec![
        MockTurn::builder()
            .tool_call("toolu_plan", "plan_curriculum", plan_input(&[(1, "Control", "c")]))
            .build(),
        MockTurn::builder()
            .tool_call("toolu_w1", "finalize_week", finalize_input("Control", "c", steps))
            .build(),
    ]);
    let harness = Harness::start(provider.clone()).await;
    let syllabind = harness
        .storage
        .create_syllabind("Intro to Stoicism", "", "Beginner", 1, "creator-1")
        .await
        .unwrap();

    // A fresh database numbers steps from 1, so the reading without a url is 2.
    let missing = 2;
    provider
        .push(
            MockTurn::builder()
                .tool_call(
                    "toolu_urls",
                    "provide_urls",
                    provide_urls_input(&[(missing, "https://example.org/discourses")]),
                )
                .build(),
        )
        .await;

    let (frames, code) = harness
        .run(&format!("/ws/generate-syllabind/{}", syllabind.id))
        .await;
    assert_eq!(code, Some(1000));
    let repaired = frames
        .iter()
        .find(|f| f["type"] == "step_url_repaired")
        .unwrap();
    assert_eq!(repaired["data"]["stepId"], missing);

    let weeks = harness.storage.list_weeks(syllabind.id).await.unwrap();
    let discourses = &weeks[0].steps[1];
    assert_eq!(discourses.id, missing);
    assert_eq!(
        discourses.draft.url.as_deref(),
        Some("https://example.org/discourses")
    );
}
