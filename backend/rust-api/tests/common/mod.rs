#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use adaptive_quiz_api::{
    config::{Config, StorageBackend},
    create_router,
    models::{Difficulty, Question},
    services::AppState,
    stores::{MemoryCatalog, MemoryLeaderboard, MemorySessionStore, SessionStore},
};

pub const METRICS_CREDENTIALS: &str = "tester:secret";

pub fn test_config() -> Config {
    Config {
        storage_backend: StorageBackend::Memory,
        leaderboard_async_updates: false,
        metrics_auth: Some(METRICS_CREDENTIALS.to_string()),
        ..Config::default()
    }
}

pub fn question(id: &str, level: u8, correct: &str) -> Question {
    Question {
        id: id.to_string(),
        difficulty: Difficulty::new(level).unwrap(),
        prompt: format!("Prompt for {}", id),
        choices: vec![correct.to_string(), "wrong".to_string()],
        correct_answer: correct.to_string(),
    }
}

/// Two questions per level 1..=3, all answered by "yes".
pub fn default_catalog() -> Vec<Question> {
    (1..=3u8)
        .flat_map(|level| {
            ["a", "b"]
                .into_iter()
                .map(move |suffix| question(&format!("d{}-{}", level, suffix), level, "yes"))
        })
        .collect()
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemorySessionStore>,
}

/// Wires the router over in-memory backends. `session_store` replaces the
/// store the services see; `TestApp::store` is always the memory one beneath.
pub fn build_test_app(
    config: Config,
    questions: Vec<Question>,
    session_store: impl FnOnce(Arc<MemorySessionStore>) -> Arc<dyn SessionStore>,
) -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let store = Arc::new(MemorySessionStore::new());
    let state = Arc::new(AppState::from_parts(
        config,
        Arc::new(MemoryCatalog::with_questions(questions)),
        session_store(store.clone()),
        Arc::new(MemoryLeaderboard::new()),
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
    }
}

pub fn create_test_app_with(questions: Vec<Question>) -> TestApp {
    build_test_app(test_config(), questions, |store| store as Arc<dyn SessionStore>)
}

pub fn create_test_app() -> TestApp {
    create_test_app_with(default_catalog())
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::String(
            String::from_utf8_lossy(&body).into_owned(),
        ))
    };
    (status, json)
}

pub async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(
        router,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

pub async fn post_json(router: &Router, uri: &str, payload: Value) -> (StatusCode, Value) {
    send(
        router,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&payload).unwrap()))
            .unwrap(),
    )
    .await
}

pub async fn post_empty(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(
        router,
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

pub async fn answer(router: &Router, user_id: &str, question_id: &str, answer: &str) -> (StatusCode, Value) {
    post_json(
        router,
        "/api/v1/quiz/answer",
        serde_json::json!({
            "user_id": user_id,
            "question_id": question_id,
            "answer": answer
        }),
    )
    .await
}

pub fn basic_auth(credentials: &str) -> String {
    format!("Basic {}", general_purpose::STANDARD.encode(credentials))
}
