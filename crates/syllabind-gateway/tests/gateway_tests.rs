// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway tests over real sockets: REST endpoints via reqwest, WebSocket
//! sessions via tokio-tungstenite.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use syllabind_config::SyllabindConfig;
use syllabind_core::SyllabindStore;
use syllabind_core::types::Syllabind;
use syllabind_gateway::{GatewayState, serve};
use syllabind_generation::{GenerationContext, GenerationSettings};
use syllabind_test_utils::fixtures::{finalize_steps_only, plan_input, week_steps};
use syllabind_test_utils::{InMemoryStore, MockProvider, MockTurn};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

const OWNER_TOKEN: &str = "owner-token";
const OTHER_TOKEN: &str = "other-token";

struct TestGateway {
    addr: SocketAddr,
    store: InMemoryStore,
    shutdown: CancellationToken,
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl TestGateway {
    async fn spawn(provider: MockProvider, allow_mock: bool) -> Self {
        let store = InMemoryStore::new();
        store.add_session(OWNER_TOKEN, "creator-1", "ada").await;
        store.add_session(OTHER_TOKEN, "someone-else", "bob").await;

        let mut config = SyllabindConfig::default();
        config.server.allow_mock = allow_mock;
        let generation = GenerationContext::new(
            Arc::new(provider),
            Arc::new(store.clone()),
            GenerationSettings::default(),
        );
        let shutdown = CancellationToken::new();
        let state = GatewayState::new(
            generation,
            Arc::new(store.clone()),
            &config,
            shutdown.clone(),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, state));
        Self {
            addr,
            store,
            shutdown,
        }
    }

    async fn stoicism(&self, duration: u32) -> Syllabind {
        self.store
            .seed_syllabind(
                "Intro to Stoicism",
                "Ancient ethics for modern life",
                "Beginner",
                duration,
                "creator-1",
            )
            .await
    }

    fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{path}", self.addr)
    }

    fn http_url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

/// Reads frames until the server closes. Returns the JSON frames and the
/// close code.
async fn collect(url: &str) -> (Vec<Value>, Option<u16>) {
    let (mut socket, _) = connect_async(url).await.unwrap();
    read_to_close(&mut socket).await
}

async fn read_to_close<S>(socket: &mut S) -> (Vec<Value>, Option<u16>)
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let mut frames = Vec::new();
    let mut code = None;
    let read = async {
        while let Some(message) = socket.next().await {
            match message {
                Ok(Message::Text(text)) => frames.push(serde_json::from_str(text.as_str()).unwrap()),
                Ok(Message::Close(frame)) => {
                    code = frame.map(|f| u16::from(f.code));
                    break;
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(10), read)
        .await
        .expect("server did not close the socket");
    (frames, code)
}

fn types(frames: &[Value]) -> Vec<&str> {
    frames
        .iter()
        .filter_map(|f| f["type"].as_str())
        .collect()
}

fn plan_turn(weeks: &[(u32, &str, &str)]) -> MockTurn {
    MockTurn::builder()
        .tool_call("toolu_plan", "plan_curriculum", plan_input(weeks))
        .build()
}

fn finalize_turn(id: &str, week_index: u32) -> MockTurn {
    MockTurn::builder()
        .tool_call(id, "finalize_week", finalize_steps_only(week_steps(week_index)))
        .build()
}

#[tokio::test]
async fn mock_generation_runs_to_completion() {
    let gateway = TestGateway::spawn(MockProvider::new(), true).await;
    let syllabind = gateway.stoicism(2).await;

    let url = gateway.ws_url(&format!(
        "/ws/generate-syllabind/{}?mock=true&token={OWNER_TOKEN}",
        syllabind.id
    ));
    let (frames, code) = collect(&url).await;

    assert_eq!(code, Some(1000));
    let kinds = types(&frames);
    assert_eq!(kinds.first(), Some(&"planning_started"));
    assert_eq!(kinds.last(), Some(&"generation_complete"));
    assert_eq!(kinds.iter().filter(|k| **k == "week_completed").count(), 2);

    let stored = gateway.store.list_weeks(syllabind.id).await.unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn scripted_generation_streams_camel_case_frames() {
    let provider = MockProvider::with_turns(vec![
        plan_turn(&[(1, "What is up to us", "The dichotomy of control")]),
        finalize_turn("toolu_1", 1),
    ]);
    let gateway = TestGateway::spawn(provider, false).await;
    let syllabind = gateway.stoicism(1).await;

    let url = gateway.ws_url(&format!(
        "/ws/generate-syllabind/{}?token={OWNER_TOKEN}",
        syllabind.id
    ));
    let (frames, code) = collect(&url).await;

    assert_eq!(code, Some(1000));
    let started = frames
        .iter()
        .find(|f| f["type"] == "week_started")
        .unwrap();
    assert_eq!(started["data"]["weekIndex"], 1);
    let info = frames.iter().find(|f| f["type"] == "week_info").unwrap();
    assert_eq!(info["data"]["title"], "What is up to us");
    assert_eq!(
        frames.iter().filter(|f| f["type"] == "step_completed").count(),
        4
    );
}

#[tokio::test]
async fn missing_or_unknown_token_closes_4401() {
    let gateway = TestGateway::spawn(MockProvider::new(), true).await;
    let syllabind = gateway.stoicism(1).await;

    let (frames, code) = collect(&gateway.ws_url(&format!("/ws/generate-syllabind/{}", syllabind.id))).await;
    assert_eq!(code, Some(4401));
    assert_eq!(types(&frames), vec!["error"]);

    let (_, code) = collect(&gateway.ws_url(&format!(
        "/ws/generate-syllabind/{}?token=nope",
        syllabind.id
    )))
    .await;
    assert_eq!(code, Some(4401));
}

#[tokio::test]
async fn non_owner_closes_4403() {
    let gateway = TestGateway::spawn(MockProvider::new(), true).await;
    let syllabind = gateway.stoicism(1).await;

    let (_, code) = collect(&gateway.ws_url(&format!(
        "/ws/generate-syllabind/{}?token={OTHER_TOKEN}",
        syllabind.id
    )))
    .await;
    assert_eq!(code, Some(4403));
    assert!(gateway.store.list_weeks(syllabind.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_syllabind_closes_4404() {
    let gateway = TestGateway::spawn(MockProvider::new(), true).await;
    let (_, code) = collect(&gateway.ws_url(&format!(
        "/ws/generate-syllabind/999?token={OWNER_TOKEN}"
    )))
    .await;
    assert_eq!(code, Some(4404));
}

#[tokio::test]
async fn invalid_requests_close_4400() {
    let gateway = TestGateway::spawn(MockProvider::new(), false).await;
    let syllabind = gateway.stoicism(2).await;

    let (_, code) = collect(&gateway.ws_url(&format!(
        "/ws/generate-syllabind/abc?token={OWNER_TOKEN}"
    )))
    .await;
    assert_eq!(code, Some(4400));

    let (_, code) = collect(&gateway.ws_url(&format!(
        "/ws/regenerate-week/{}/3?token={OWNER_TOKEN}",
        syllabind.id
    )))
    .await;
    assert_eq!(code, Some(4400));

    let (frames, code) = collect(&gateway.ws_url(&format!(
        "/ws/generate-syllabind/{}?mock=true&token={OWNER_TOKEN}",
        syllabind.id
    )))
    .await;
    assert_eq!(code, Some(4400));
    assert_eq!(frames[0]["data"]["message"], "mock generation is disabled");
}

#[tokio::test]
async fn regeneration_over_websocket_reports_the_week() {
    let gateway = TestGateway::spawn(MockProvider::new(), true).await;
    let syllabind = gateway.stoicism(3).await;

    let (frames, code) = collect(&gateway.ws_url(&format!(
        "/ws/regenerate-week/{}/2?mock=1&token={OWNER_TOKEN}",
        syllabind.id
    )))
    .await;

    assert_eq!(code, Some(1000));
    let done = frames
        .iter()
        .find(|f| f["type"] == "week_regeneration_complete")
        .unwrap();
    assert_eq!(done["data"]["week"]["weekIndex"], 2);
    let stored = gateway.store.list_weeks(syllabind.id).await.unwrap();
    assert_eq!(stored.iter().map(|w| w.week_index).collect::<Vec<_>>(), vec![2]);
}

#[tokio::test]
async fn cancel_frame_stops_after_current_week() {
    let gate = Arc::new(Notify::new());
    let provider = MockProvider::with_turns(vec![
        plan_turn(&[(1, "A", "a"), (2, "B", "b"), (3, "C", "c")]),
        finalize_turn("toolu_1", 1),
        MockTurn::gated(gate.clone(), finalize_turn("toolu_2", 2)),
    ]);
    let gateway = TestGateway::spawn(provider, false).await;
    let syllabind = gateway.stoicism(3).await;

    let url = gateway.ws_url(&format!(
        "/ws/generate-syllabind/{}?token={OWNER_TOKEN}",
        syllabind.id
    ));
    let (mut socket, _) = connect_async(url.as_str()).await.unwrap();

    let mut frames: Vec<Value> = Vec::new();
    while let Some(Ok(message)) = socket.next().await {
        if let Message::Text(text) = message {
            let frame: Value = serde_json::from_str(text.as_str()).unwrap();
            let week_one_done = frame["type"] == "week_completed";
            frames.push(frame);
            if week_one_done {
                break;
            }
        }
    }
    socket
        .send(Message::Text(json!({ "type": "cancel" }).to_string().into()))
        .await
        .unwrap();
    // Let the server read the cancel before the held turn resolves.
    tokio::time::sleep(Duration::from_millis(300)).await;
    gate.notify_one();

    let (rest, code) = read_to_close(&mut socket).await;
    assert_eq!(code, Some(1000));
    assert!(!types(&rest).contains(&"generation_complete"));

    let stored = gateway.store.list_weeks(syllabind.id).await.unwrap();
    assert_eq!(stored.iter().map(|w| w.week_index).collect::<Vec<_>>(), vec![1]);
}

#[tokio::test]
async fn health_is_public() {
    let gateway = TestGateway::spawn(MockProvider::new(), false).await;
    let resp = reqwest::get(gateway.http_url("/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["active_generations"], 0);
}

#[tokio::test]
async fn prepare_endpoints_check_auth_and_ownership() {
    let gateway = TestGateway::spawn(MockProvider::new(), false).await;
    let syllabind = gateway.stoicism(4).await;
    let client = reqwest::Client::new();
    let generate = gateway.http_url("/api/generate-syllabind");
    let regenerate = gateway.http_url("/api/regenerate-week");

    let resp = client
        .post(&generate)
        .json(&json!({ "syllabindId": syllabind.id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .post(&generate)
        .bearer_auth(OWNER_TOKEN)
        .json(&json!({ "syllabindId": syllabind.id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body["websocketUrl"],
        format!("/ws/generate-syllabind/{}", syllabind.id)
    );

    let resp = client
        .post(&generate)
        .header("cookie", format!("syllabind_session={OTHER_TOKEN}"))
        .json(&json!({ "syllabindId": syllabind.id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = client
        .post(&regenerate)
        .bearer_auth(OWNER_TOKEN)
        .json(&json!({ "syllabindId": syllabind.id, "weekIndex": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body["websocketUrl"],
        format!("/ws/regenerate-week/{}/3", syllabind.id)
    );

    let resp = client
        .post(&regenerate)
        .bearer_auth(OWNER_TOKEN)
        .json(&json!({ "syllabindId": syllabind.id, "weekIndex": 9 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("week index 9"));

    let resp = client
        .post(&generate)
        .bearer_auth(OWNER_TOKEN)
        .json(&json!({ "syllabindId": 4242 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
