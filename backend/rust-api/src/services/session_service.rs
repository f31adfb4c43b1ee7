use std::sync::Arc;

use crate::error::QuizError;
use crate::models::{NextQuestionResponse, UserSessionState, UserSnapshot};
use crate::services::leaderboard_service::LeaderboardService;
use crate::services::question_selector::QuestionSelector;
use crate::stores::{QuestionCatalog, SessionStore};
use crate::utils::retry::{retry_transient, RetryPolicy};

/// User-state lifecycle: creation on first contact, question serving and
/// explicit stat resets.
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    selector: QuestionSelector,
    leaderboard: LeaderboardService,
    read_policy: RetryPolicy,
}

impl SessionService {
    pub fn new(
        catalog: Arc<dyn QuestionCatalog>,
        store: Arc<dyn SessionStore>,
        leaderboard: LeaderboardService,
    ) -> Self {
        Self {
            selector: QuestionSelector::new(catalog, store.clone()),
            store,
            leaderboard,
            read_policy: RetryPolicy::reads(),
        }
    }

    pub fn with_read_policy(mut self, policy: RetryPolicy) -> Self {
        self.selector = self.selector.with_read_policy(policy.clone());
        self.read_policy = policy;
        self
    }

    async fn find(&self, user_id: &str) -> Result<Option<UserSessionState>, QuizError> {
        Ok(retry_transient(&self.read_policy, "user_states.find", || {
            self.store.get_user_state(user_id)
        })
        .await?)
    }

    /// Loads the user's state, creating the default one on first contact.
    pub async fn get_or_create(&self, user_id: &str) -> Result<UserSessionState, QuizError> {
        if let Some(state) = self.find(user_id).await? {
            return Ok(state);
        }
        let state = self
            .store
            .create_user_state(UserSessionState::new(user_id))
            .await?;
        tracing::info!("Initialized quiz state for user {}", user_id);
        Ok(state)
    }

    pub async fn next_question(&self, user_id: &str) -> Result<NextQuestionResponse, QuizError> {
        let mut state = self.get_or_create(user_id).await?;
        let selection = self.selector.select_next(&mut state).await?;
        Ok(NextQuestionResponse {
            user: state.snapshot(),
            question: selection.question.view(),
        })
    }

    pub async fn get_state(&self, user_id: &str) -> Result<UserSnapshot, QuizError> {
        self.find(user_id)
            .await?
            .map(|state| state.snapshot())
            .ok_or_else(|| QuizError::UserNotFound(user_id.to_string()))
    }

    /// Reinitializes the user's stats and zeroes the leaderboard entry.
    /// Answer records are kept.
    pub async fn reset(&self, user_id: &str) -> Result<UserSnapshot, QuizError> {
        let mut state = self
            .find(user_id)
            .await?
            .ok_or_else(|| QuizError::UserNotFound(user_id.to_string()))?;

        let expected_version = state.state_version;
        state.reset();
        self.store
            .commit_user_state(&state, Some(expected_version))
            .await
            .map_err(|e| QuizError::from_store(user_id, e))?;

        tracing::info!("Reset quiz stats for user {}", user_id);
        self.leaderboard.record(&state).await;
        Ok(state.snapshot())
    }
}
