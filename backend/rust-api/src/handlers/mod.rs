use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{QuizError, StoreError};
use crate::metrics;
use crate::services::AppState;

const DEFAULT_METRICS_AUTH: &str = "admin:changeme";

impl IntoResponse for QuizError {
    fn into_response(self) -> Response {
        let status = match &self {
            QuizError::CatalogEmpty => StatusCode::SERVICE_UNAVAILABLE,
            QuizError::UserNotFound(_) | QuizError::QuestionNotFound(_) => StatusCode::NOT_FOUND,
            QuizError::ConcurrentStateConflict(_) => StatusCode::CONFLICT,
            QuizError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            QuizError::Storage(e) => {
                tracing::error!("Storage failure: {:#}", e);
                "Internal storage error".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(json!({
                "message": message,
                "status": status.as_u16()
            })),
        )
            .into_response()
    }
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut dependencies = serde_json::Map::new();
    let checks = [
        ("session_store", state.store.kind(), check_dependency(state.store.ping()).await),
        ("catalog", state.catalog.kind(), check_dependency(state.catalog.ping()).await),
        (
            "leaderboard",
            state.leaderboard.kind(),
            check_dependency(state.leaderboard.ping()).await,
        ),
    ];

    let mut all_healthy = true;
    for (name, backend, outcome) in checks {
        let mut result = serde_json::Map::new();
        result.insert("backend".to_string(), json!(backend));
        match outcome {
            Ok(()) => {
                result.insert("status".to_string(), json!("healthy"));
            }
            Err(error) => {
                all_healthy = false;
                result.insert("status".to_string(), json!("unhealthy"));
                result.insert("error".to_string(), json!(error));
            }
        }
        dependencies.insert(name.to_string(), serde_json::Value::Object(result));
    }

    let (status_code, status) = if all_healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status_code,
        Json(json!({
            "status": status,
            "service": "adaptive-quiz-api",
            "version": env!("CARGO_PKG_VERSION"),
            "dependencies": dependencies
        })),
    )
}

async fn check_dependency<F>(ping: F) -> Result<(), String>
where
    F: Future<Output = Result<(), StoreError>>,
{
    match tokio::time::timeout(Duration::from_secs(1), ping).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("timeout after 1s".to_string()),
    }
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// Protects /metrics with HTTP Basic auth against `metrics.auth` ("user:password").
pub async fn metrics_auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let encoded = auth_header
        .strip_prefix("Basic ")
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let decoded = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

    let expected = state
        .config
        .metrics_auth
        .as_deref()
        .unwrap_or(DEFAULT_METRICS_AUTH);
    if credentials != expected {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}

pub mod leaderboard;
pub mod quiz;
pub mod users;
