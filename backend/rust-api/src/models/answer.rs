use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::question::Difficulty;
use super::user_state::{bson_datetime_as_chrono, UserSessionState, UserSnapshot};

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    #[validate(length(min = 1, max = 64, message = "user_id must be 1-64 characters"))]
    pub user_id: String,
    #[validate(length(min = 1, max = 128, message = "question_id is required"))]
    pub question_id: String,
    #[validate(length(min = 1, max = 1024, message = "answer is required"))]
    pub answer: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitAnswerResponse {
    pub correct: bool,
    pub correct_answer: String,
    pub score_delta: u64,
    pub new_difficulty: Difficulty,
    pub new_streak: u32,
    pub new_score: u64,
    pub duplicate: bool,
    pub user: UserSnapshot,
}

/// Durable witness that (user, question) was graded. Stored in "answer_records".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub question_id: String,
    pub is_correct: bool,
    pub score_delta: u64,
    #[serde(rename = "answeredAt", with = "bson_datetime_as_chrono")]
    pub answered_at: DateTime<Utc>,
}

impl AnswerRecord {
    pub fn new(user_id: &str, question_id: &str, is_correct: bool, score_delta: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            question_id: question_id.to_string(),
            is_correct,
            score_delta,
            answered_at: Utc::now(),
        }
    }
}

/// Result of one submission, fresh or replayed.
#[derive(Debug, Clone)]
pub struct GradeOutcome {
    pub is_correct: bool,
    pub correct_answer: String,
    pub score_delta: u64,
    pub duplicate: bool,
    pub state: UserSessionState,
}

impl From<GradeOutcome> for SubmitAnswerResponse {
    fn from(outcome: GradeOutcome) -> Self {
        Self {
            correct: outcome.is_correct,
            correct_answer: outcome.correct_answer,
            score_delta: outcome.score_delta,
            new_difficulty: outcome.state.difficulty,
            new_streak: outcome.state.streak,
            new_score: outcome.state.score,
            duplicate: outcome.duplicate,
            user: outcome.state.snapshot(),
        }
    }
}
