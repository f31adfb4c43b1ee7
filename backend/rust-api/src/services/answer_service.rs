use std::sync::Arc;

use crate::error::{QuizError, StoreError};
use crate::metrics::{record_answer_graded, DUPLICATE_SUBMISSIONS_TOTAL, STATE_CONFLICTS_TOTAL};
use crate::models::{AnswerRecord, GradeOutcome, Question, SubmitAnswerRequest, UserSessionState};
use crate::services::leaderboard_service::LeaderboardService;
use crate::services::scoring;
use crate::stores::{QuestionCatalog, SessionStore};
use crate::utils::retry::{retry_transient, RetryPolicy};

/// Grades submissions at most once per (user, question).
pub struct AnswerService {
    catalog: Arc<dyn QuestionCatalog>,
    store: Arc<dyn SessionStore>,
    leaderboard: LeaderboardService,
    read_policy: RetryPolicy,
}

impl AnswerService {
    pub fn new(
        catalog: Arc<dyn QuestionCatalog>,
        store: Arc<dyn SessionStore>,
        leaderboard: LeaderboardService,
    ) -> Self {
        Self {
            catalog,
            store,
            leaderboard,
            read_policy: RetryPolicy::reads(),
        }
    }

    pub fn with_read_policy(mut self, policy: RetryPolicy) -> Self {
        self.read_policy = policy;
        self
    }

    pub async fn submit(&self, req: &SubmitAnswerRequest) -> Result<GradeOutcome, QuizError> {
        tracing::info!(
            "Processing answer submission: user={}, question={}",
            req.user_id,
            req.question_id
        );

        let state = self.load_state(&req.user_id).await?;

        let question = retry_transient(&self.read_policy, "catalog.find", || {
            self.catalog.find(&req.question_id)
        })
        .await?
        .ok_or_else(|| QuizError::QuestionNotFound(req.question_id.clone()))?;

        let existing = retry_transient(&self.read_policy, "answer_records.find", || {
            self.store.find_answer_record(&req.user_id, &req.question_id)
        })
        .await?;
        if let Some(record) = existing {
            return Ok(replay(&record, &question, state));
        }

        let expected_version = state.state_version;
        let transition = scoring::apply(&state, &question, &req.answer);
        let record = AnswerRecord::new(
            &req.user_id,
            &req.question_id,
            transition.is_correct,
            transition.score_delta,
        );

        match self
            .store
            .commit_grading(&transition.state, expected_version, &record)
            .await
        {
            Ok(()) => {}
            // A concurrent submission for the same pair committed first.
            Err(StoreError::AlreadyExists) => return self.replay_committed(req, &question).await,
            Err(StoreError::Conflict) => {
                STATE_CONFLICTS_TOTAL.with_label_values(&["grading"]).inc();
                tracing::warn!(
                    "State of user {} moved past version {} while grading {}",
                    req.user_id,
                    expected_version,
                    req.question_id
                );
                return Err(QuizError::ConcurrentStateConflict(req.user_id.clone()));
            }
            Err(e) => return Err(QuizError::from_store(&req.user_id, e)),
        }

        record_answer_graded(transition.is_correct);
        tracing::info!(
            "Graded answer: user={}, question={}, correct={}, delta={}, score={}, difficulty={}, streak={}",
            req.user_id,
            req.question_id,
            transition.is_correct,
            transition.score_delta,
            transition.state.score,
            transition.state.difficulty,
            transition.state.streak
        );

        self.leaderboard.record(&transition.state).await;

        Ok(GradeOutcome {
            is_correct: transition.is_correct,
            correct_answer: question.correct_answer,
            score_delta: transition.score_delta,
            duplicate: false,
            state: transition.state,
        })
    }

    async fn load_state(&self, user_id: &str) -> Result<UserSessionState, QuizError> {
        retry_transient(&self.read_policy, "user_states.find", || {
            self.store.get_user_state(user_id)
        })
        .await?
        .ok_or_else(|| QuizError::UserNotFound(user_id.to_string()))
    }

    async fn replay_committed(
        &self,
        req: &SubmitAnswerRequest,
        question: &Question,
    ) -> Result<GradeOutcome, QuizError> {
        let state = self.load_state(&req.user_id).await?;
        let record = self
            .store
            .find_answer_record(&req.user_id, &req.question_id)
            .await?
            .ok_or_else(|| {
                QuizError::Storage(anyhow::anyhow!(
                    "answer record for {}/{} reported but not found",
                    req.user_id,
                    req.question_id
                ))
            })?;
        Ok(replay(&record, question, state))
    }
}

fn replay(record: &AnswerRecord, question: &Question, state: UserSessionState) -> GradeOutcome {
    DUPLICATE_SUBMISSIONS_TOTAL.inc();
    tracing::info!(
        "Duplicate submission: user={}, question={}, answered at {}",
        record.user_id,
        record.question_id,
        record.answered_at
    );
    GradeOutcome {
        is_correct: record.is_correct,
        correct_answer: question.correct_answer.clone(),
        score_delta: 0,
        duplicate: true,
        state,
    }
}
