use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

use crate::error::QuizError;
use crate::extractors::AppPath;
use crate::models::{ResetStatsResponse, UserPath};
use crate::services::AppState;

pub async fn get_state(
    State(state): State<Arc<AppState>>,
    AppPath(UserPath { user_id }): AppPath<UserPath>,
) -> Result<impl IntoResponse, QuizError> {
    let snapshot = state.session_service().get_state(&user_id).await?;
    Ok((StatusCode::OK, Json(snapshot)))
}

pub async fn reset_stats(
    State(state): State<Arc<AppState>>,
    AppPath(UserPath { user_id }): AppPath<UserPath>,
) -> Result<impl IntoResponse, QuizError> {
    tracing::info!("Resetting stats for user_id={}", user_id);

    let user = state.session_service().reset(&user_id).await?;
    Ok((
        StatusCode::OK,
        Json(ResetStatsResponse {
            success: true,
            message: "Stats reset successfully".to_string(),
            user,
        }),
    ))
}
