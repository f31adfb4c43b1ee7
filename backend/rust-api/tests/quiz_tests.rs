mod common;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use adaptive_quiz_api::{
    models::{AnswerRecord, UserSessionState},
    stores::{MemorySessionStore, SessionStore},
    StoreError,
};
use common::{
    answer, build_test_app, create_test_app, create_test_app_with, default_catalog, get,
    post_json, question, test_config,
};

fn user() -> String {
    format!("player-{}", &Uuid::new_v4().simple().to_string()[..12])
}

#[tokio::test]
async fn test_next_question_creates_user_and_hides_answer() {
    let app = create_test_app();
    let user_id = user();

    let (status, json) = get(&app.router, &format!("/api/v1/quiz/next?user_id={}", user_id)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["user_id"], user_id);
    assert_eq!(json["user"]["score"], 0);
    assert_eq!(json["user"]["difficulty"], 1);
    assert_eq!(json["question"]["difficulty"], 1);
    assert!(json["question"].get("correct_answer").is_none());
    assert!(app.store.get_user_state(&user_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_two_correct_answers_promote_once() {
    let app = create_test_app();
    let user_id = user();
    get(&app.router, &format!("/api/v1/quiz/next?user_id={}", user_id)).await;

    let (status, first) = answer(&app.router, &user_id, "d1-a", "yes").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["correct"], true);
    assert_eq!(first["duplicate"], false);
    assert_eq!(first["score_delta"], 11);
    assert_eq!(first["new_score"], 11);
    assert_eq!(first["new_streak"], 1);
    assert_eq!(first["new_difficulty"], 1);

    let (_, second) = answer(&app.router, &user_id, "d1-b", " YES ").await;
    assert_eq!(second["score_delta"], 12);
    assert_eq!(second["new_score"], 23);
    assert_eq!(second["new_streak"], 2);
    assert_eq!(second["new_difficulty"], 2);
    assert_eq!(second["user"]["state_version"], 2);
}

#[tokio::test]
async fn test_wrong_answer_demotes_and_keeps_score() {
    let app = create_test_app();
    let user_id = user();
    get(&app.router, &format!("/api/v1/quiz/next?user_id={}", user_id)).await;
    answer(&app.router, &user_id, "d1-a", "yes").await;
    answer(&app.router, &user_id, "d1-b", "yes").await;

    let (status, json) = answer(&app.router, &user_id, "d2-a", "no").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["correct"], false);
    assert_eq!(json["correct_answer"], "yes");
    assert_eq!(json["score_delta"], 0);
    assert_eq!(json["new_score"], 23);
    assert_eq!(json["new_streak"], 0);
    assert_eq!(json["new_difficulty"], 1);
    assert_eq!(json["user"]["max_streak"], 2);
}

#[tokio::test]
async fn test_duplicate_submission_is_replayed() {
    let app = create_test_app();
    let user_id = user();
    get(&app.router, &format!("/api/v1/quiz/next?user_id={}", user_id)).await;

    let (_, first) = answer(&app.router, &user_id, "d1-a", "yes").await;
    let (status, second) = answer(&app.router, &user_id, "d1-a", "no").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["duplicate"], true);
    assert_eq!(second["correct"], first["correct"]);
    assert_eq!(second["correct_answer"], first["correct_answer"]);
    assert_eq!(second["score_delta"], 0);
    assert_eq!(second["new_score"], first["new_score"]);
    assert_eq!(second["user"]["state_version"], first["user"]["state_version"]);
    assert_eq!(app.store.record_count(&user_id).await, 1);
}

#[tokio::test]
async fn test_answer_for_unknown_user_or_question() {
    let app = create_test_app();
    let user_id = user();

    let (status, json) = answer(&app.router, &user_id, "d1-a", "yes").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["status"], 404);

    get(&app.router, &format!("/api/v1/quiz/next?user_id={}", user_id)).await;
    let (status, json) = answer(&app.router, &user_id, "missing", "yes").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Question missing not found");
}

#[tokio::test]
async fn test_invalid_payloads_are_rejected_as_json() {
    let app = create_test_app();

    let (status, json) = post_json(
        &app.router,
        "/api/v1/quiz/answer",
        json!({ "user_id": "", "question_id": "d1-a", "answer": "yes" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], 400);

    let (status, json) = post_json(&app.router, "/api/v1/quiz/answer", json!({ "user_id": "x" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"]
        .as_str()
        .unwrap()
        .starts_with("Failed to parse JSON request body"));

    let (status, _) = get(&app.router, "/api/v1/quiz/next").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_empty_catalog_is_service_unavailable() {
    let app = create_test_app_with(Vec::new());

    let (status, json) = get(&app.router, &format!("/api/v1/quiz/next?user_id={}", user())).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["message"], "No questions available in the catalog");
}

#[tokio::test]
async fn test_questions_do_not_repeat_until_cycle_resets() {
    let app = create_test_app_with(vec![
        question("only-a", 1, "yes"),
        question("only-b", 1, "yes"),
    ]);
    let user_id = user();
    let next_uri = format!("/api/v1/quiz/next?user_id={}", user_id);

    let (_, first) = get(&app.router, &next_uri).await;
    let first_id = first["question"]["id"].as_str().unwrap().to_string();
    answer(&app.router, &user_id, &first_id, "nope").await;

    let (_, second) = get(&app.router, &next_uri).await;
    let second_id = second["question"]["id"].as_str().unwrap().to_string();
    assert_ne!(first_id, second_id);
    answer(&app.router, &user_id, &second_id, "nope").await;

    let (status, third) = get(&app.router, &next_uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(third["user"]["state_version"], 3);

    let stored = app.store.get_user_state(&user_id).await.unwrap().unwrap();
    assert!(stored.used_question_ids.is_empty());
}

/// Another writer always wins the grading commit.
struct OutracedStore {
    inner: Arc<MemorySessionStore>,
}

#[async_trait]
impl SessionStore for OutracedStore {
    fn kind(&self) -> &'static str {
        "outraced"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get_user_state(&self, user_id: &str) -> Result<Option<UserSessionState>, StoreError> {
        self.inner.get_user_state(user_id).await
    }

    async fn create_user_state(
        &self,
        state: UserSessionState,
    ) -> Result<UserSessionState, StoreError> {
        self.inner.create_user_state(state).await
    }

    async fn commit_user_state(
        &self,
        state: &UserSessionState,
        expected_version: Option<u64>,
    ) -> Result<(), StoreError> {
        self.inner.commit_user_state(state, expected_version).await
    }

    async fn find_answer_record(
        &self,
        user_id: &str,
        question_id: &str,
    ) -> Result<Option<AnswerRecord>, StoreError> {
        self.inner.find_answer_record(user_id, question_id).await
    }

    async fn commit_grading(
        &self,
        _state: &UserSessionState,
        _expected_version: u64,
        _record: &AnswerRecord,
    ) -> Result<(), StoreError> {
        Err(StoreError::Conflict)
    }
}

#[tokio::test]
async fn test_concurrent_state_change_is_conflict() {
    let app = build_test_app(test_config(), default_catalog(), |store| {
        Arc::new(OutracedStore { inner: store }) as Arc<dyn SessionStore>
    });
    let user_id = user();
    get(&app.router, &format!("/api/v1/quiz/next?user_id={}", user_id)).await;

    let (status, json) = answer(&app.router, &user_id, "d1-a", "yes").await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["status"], 409);
    let stored = app.store.get_user_state(&user_id).await.unwrap().unwrap();
    assert_eq!(stored.score, 0);
    assert_eq!(stored.state_version, 0);
}
