use serde::{Deserialize, Serialize};
use validator::Validate;

use super::question::QuestionView;
use super::user_state::UserSnapshot;

#[derive(Debug, Deserialize, Validate)]
pub struct NextQuestionQuery {
    #[validate(length(min = 1, max = 64, message = "user_id must be 1-64 characters"))]
    pub user_id: String,
}

/// `/users/{user_id}/...` path parameters.
#[derive(Debug, Deserialize, Validate)]
pub struct UserPath {
    #[validate(length(min = 1, max = 64, message = "user_id must be 1-64 characters"))]
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NextQuestionResponse {
    pub user: UserSnapshot,
    pub question: QuestionView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetStatsResponse {
    pub success: bool,
    pub message: String,
    pub user: UserSnapshot,
}
