use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

use crate::error::QuizError;
use crate::extractors::AppQuery;
use crate::models::LeaderboardQuery;
use crate::services::AppState;

pub async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<LeaderboardQuery>,
) -> Result<impl IntoResponse, QuizError> {
    let standings = state.leaderboard_service().standings(query.limit).await?;
    Ok((StatusCode::OK, Json(standings)))
}
