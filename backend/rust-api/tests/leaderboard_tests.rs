mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};

use adaptive_quiz_api::{config::Config, stores::SessionStore};
use common::{
    answer, basic_auth, build_test_app, create_test_app, default_catalog, get, post_empty, send,
    test_config, METRICS_CREDENTIALS,
};
use std::{sync::Arc, time::Duration};

#[tokio::test]
async fn test_leaderboard_orders_by_score() {
    let app = create_test_app();
    for user in ["ann", "ben"] {
        get(&app.router, &format!("/api/v1/quiz/next?user_id={}", user)).await;
    }
    answer(&app.router, "ann", "d1-a", "yes").await;
    answer(&app.router, "ben", "d1-a", "yes").await;
    answer(&app.router, "ben", "d1-b", "yes").await;

    let (status, json) = get(&app.router, "/api/v1/leaderboard?limit=5").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["scores"][0]["username"], "ben");
    assert_eq!(json["scores"][0]["score"], 23);
    assert_eq!(json["scores"][0]["streak"], 2);
    assert_eq!(json["scores"][1]["username"], "ann");
    assert_eq!(json["streaks"][0]["username"], "ben");
    assert_eq!(json["streaks"][0]["value"], 2.0);
}

#[tokio::test]
async fn test_leaderboard_limit_is_validated() {
    let app = create_test_app();

    let (status, json) = get(&app.router, "/api/v1/leaderboard?limit=500").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], 400);
}

#[tokio::test]
async fn test_health_reports_memory_backends() {
    let app = create_test_app();

    let (status, json) = get(&app.router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["dependencies"]["session_store"]["backend"], "memory");
    assert_eq!(json["dependencies"]["leaderboard"]["status"], "healthy");
}

#[tokio::test]
async fn test_metrics_require_basic_auth() {
    let app = create_test_app();

    let (status, _) = get(&app.router, "/metrics").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app.router,
        Request::builder()
            .uri("/metrics")
            .header(header::AUTHORIZATION, basic_auth("tester:wrong"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    get(&app.router, "/health").await;
    let (status, body) = send(
        &app.router,
        Request::builder()
            .uri("/metrics")
            .header(header::AUTHORIZATION, basic_auth(METRICS_CREDENTIALS))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_str().unwrap().contains("http_requests_total"));
}

#[tokio::test]
async fn test_trace_id_is_echoed() {
    let app = create_test_app();
    let response = tower::ServiceExt::oneshot(
        app.router.clone(),
        Request::builder()
            .uri("/health")
            .header("x-trace-id", "trace-123")
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();

    assert_eq!(response.headers()["x-trace-id"], "trace-123");
}

#[tokio::test]
async fn test_async_leaderboard_updates_arrive_in_order() {
    let config = Config {
        leaderboard_async_updates: true,
        ..test_config()
    };
    let app = build_test_app(config, default_catalog(), |store| store as Arc<dyn SessionStore>);

    get(&app.router, "/api/v1/quiz/next?user_id=queued").await;
    answer(&app.router, "queued", "d1-a", "yes").await;
    answer(&app.router, "queued", "d1-b", "yes").await;

    let json = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let (_, json) = get(&app.router, "/api/v1/leaderboard").await;
            if json["scores"][0]["score"] == 23 {
                return json;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    })
    .await
    .expect("leaderboard never caught up");

    assert_eq!(json["scores"][0]["username"], "queued");
    assert_eq!(json["scores"][0]["streak"], 2);

    let (status, _) = post_empty(&app.router, "/api/v1/users/queued/reset").await;
    assert_eq!(status, StatusCode::OK);

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let (_, json) = get(&app.router, "/api/v1/leaderboard").await;
            if json["scores"][0]["score"] == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    })
    .await
    .expect("reset never reached the leaderboard");
}
