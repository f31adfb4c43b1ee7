use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

use crate::error::QuizError;
use crate::extractors::{AppJson, AppQuery};
use crate::models::{NextQuestionQuery, SubmitAnswerRequest, SubmitAnswerResponse};
use crate::services::AppState;

pub async fn next_question(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<NextQuestionQuery>,
) -> Result<impl IntoResponse, QuizError> {
    tracing::info!("Selecting next question for user_id={}", query.user_id);

    let service = state.session_service();
    let response = service.next_question(&query.user_id).await?;
    Ok((StatusCode::OK, Json(response)))
}

pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, QuizError> {
    let service = state.answer_service();
    let outcome = service.submit(&req).await?;
    Ok((StatusCode::OK, Json(SubmitAnswerResponse::from(outcome))))
}
