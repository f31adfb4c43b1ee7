//! Next-question selection without repeats inside a cycle.
//!
//! Fallback chain: exact difficulty → neighbouring difficulties → cycle reset
//! (history cleared and committed) → any difficulty → `CatalogEmpty`.

use rand::Rng;
use std::sync::Arc;

use crate::error::QuizError;
use crate::metrics::{QUESTIONS_SERVED_TOTAL, QUESTION_CYCLES_RESET_TOTAL, STATE_CONFLICTS_TOTAL};
use crate::models::{DifficultyRange, Question, QuestionFilter, UserSessionState};
use crate::stores::{QuestionCatalog, SessionStore};
use crate::utils::retry::{retry_transient, RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStage {
    /// Unused question at the user's difficulty.
    Exact,
    /// Unused question one level above or below.
    Widened,
    /// History was cleared; question at the user's difficulty.
    CycleReset,
    /// Any question in the catalog.
    AnyDifficulty,
}

impl SelectionStage {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionStage::Exact => "exact",
            SelectionStage::Widened => "widened",
            SelectionStage::CycleReset => "cycle_reset",
            SelectionStage::AnyDifficulty => "any_difficulty",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub question: Question,
    pub stage: SelectionStage,
}

pub struct QuestionSelector {
    catalog: Arc<dyn QuestionCatalog>,
    store: Arc<dyn SessionStore>,
    read_policy: RetryPolicy,
}

fn pick_uniform(mut candidates: Vec<Question>) -> Option<Question> {
    if candidates.is_empty() {
        return None;
    }
    let index = rand::rng().random_range(0..candidates.len());
    Some(candidates.swap_remove(index))
}

impl QuestionSelector {
    pub fn new(catalog: Arc<dyn QuestionCatalog>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            catalog,
            store,
            read_policy: RetryPolicy::reads(),
        }
    }

    pub fn with_read_policy(mut self, policy: RetryPolicy) -> Self {
        self.read_policy = policy;
        self
    }

    async fn sample(&self, filter: QuestionFilter) -> Result<Option<Question>, QuizError> {
        let candidates = retry_transient(&self.read_policy, "catalog.query", || {
            self.catalog.query(&filter)
        })
        .await?;
        Ok(pick_uniform(candidates))
    }

    /// Picks the next question for `state`. A cycle reset is committed to the
    /// store right away and reflected in `state`, whether or not a question
    /// is found afterwards.
    pub async fn select_next(&self, state: &mut UserSessionState) -> Result<Selection, QuizError> {
        let exact = DifficultyRange::exact(state.difficulty);

        let stages = [
            (SelectionStage::Exact, exact),
            (SelectionStage::Widened, state.difficulty.neighbourhood()),
        ];
        for (stage, range) in stages {
            let filter = QuestionFilter::in_range(range).excluding(&state.used_question_ids);
            if let Some(question) = self.sample(filter).await? {
                return Ok(self.served(state, question, stage));
            }
        }

        self.reset_cycle(state).await?;
        if let Some(question) = self.sample(QuestionFilter::in_range(exact)).await? {
            return Ok(self.served(state, question, SelectionStage::CycleReset));
        }

        if let Some(question) = self.sample(QuestionFilter::any()).await? {
            tracing::warn!(
                "No questions near difficulty {} for user {}, serving question {} at difficulty {}",
                state.difficulty,
                state.user_id,
                question.id,
                question.difficulty
            );
            return Ok(self.served(state, question, SelectionStage::AnyDifficulty));
        }

        tracing::error!("Question catalog is empty, cannot serve user {}", state.user_id);
        Err(QuizError::CatalogEmpty)
    }

    async fn reset_cycle(&self, state: &mut UserSessionState) -> Result<(), QuizError> {
        let expected_version = state.state_version;
        let mut next = state.clone();
        if !next.start_new_cycle() {
            return Ok(());
        }

        if let Err(e) = self
            .store
            .commit_user_state(&next, Some(expected_version))
            .await
        {
            if matches!(e, crate::error::StoreError::Conflict) {
                STATE_CONFLICTS_TOTAL.with_label_values(&["cycle_reset"]).inc();
            }
            return Err(QuizError::from_store(&state.user_id, e));
        }

        QUESTION_CYCLES_RESET_TOTAL.inc();
        tracing::info!(
            "User {} exhausted reachable questions at difficulty {}, starting a new cycle",
            state.user_id,
            state.difficulty
        );
        *state = next;
        Ok(())
    }

    fn served(&self, state: &UserSessionState, question: Question, stage: SelectionStage) -> Selection {
        QUESTIONS_SERVED_TOTAL
            .with_label_values(&[stage.as_str()])
            .inc();
        tracing::debug!(
            "Serving question {} (difficulty {}) to user {} via {} selection",
            question.id,
            question.difficulty,
            state.user_id,
            stage.as_str()
        );
        Selection { question, stage }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;
    use crate::stores::{MemoryCatalog, MemorySessionStore};

    fn question(id: &str, level: u8) -> Question {
        Question {
            id: id.to_string(),
            difficulty: Difficulty::new(level).unwrap(),
            prompt: format!("Question {}", id),
            choices: vec!["a".to_string(), "b".to_string()],
            correct_answer: "a".to_string(),
        }
    }

    async fn setup(
        questions: Vec<Question>,
        user: UserSessionState,
    ) -> (QuestionSelector, Arc<MemorySessionStore>, UserSessionState) {
        let store = Arc::new(MemorySessionStore::new());
        let stored = store.create_user_state(user).await.unwrap();
        let selector = QuestionSelector::new(
            Arc::new(MemoryCatalog::with_questions(questions)),
            store.clone(),
        )
        .with_read_policy(RetryPolicy::none());
        (selector, store, stored)
    }

    fn user_at(level: u8, used: &[&str]) -> UserSessionState {
        let mut state = UserSessionState::new("selector-user");
        state.difficulty = Difficulty::new(level).unwrap();
        state.used_question_ids = used.iter().map(|s| s.to_string()).collect();
        state
    }

    #[tokio::test]
    async fn prefers_unused_question_at_exact_difficulty() {
        let (selector, _, mut state) = setup(
            vec![question("e1", 3), question("e2", 3), question("w1", 4)],
            user_at(3, &["e1"]),
        )
        .await;

        let selection = selector.select_next(&mut state).await.unwrap();
        assert_eq!(selection.stage, SelectionStage::Exact);
        assert_eq!(selection.question.id, "e2");
        assert_eq!(state.state_version, 0);
    }

    #[tokio::test]
    async fn widens_to_neighbouring_levels() {
        let (selector, _, mut state) = setup(
            vec![question("e1", 3), question("w1", 4), question("far", 7)],
            user_at(3, &["e1"]),
        )
        .await;

        let selection = selector.select_next(&mut state).await.unwrap();
        assert_eq!(selection.stage, SelectionStage::Widened);
        assert_eq!(selection.question.id, "w1");
    }

    #[tokio::test]
    async fn exhausted_cycle_is_cleared_and_committed() {
        let mut user = user_at(3, &["e1", "w1"]);
        user.streak_question_ids.insert("w1".to_string());
        let (selector, store, mut state) =
            setup(vec![question("e1", 3), question("w1", 2), question("far", 9)], user).await;

        let selection = selector.select_next(&mut state).await.unwrap();

        assert_eq!(selection.stage, SelectionStage::CycleReset);
        assert_eq!(selection.question.id, "e1");
        assert!(state.used_question_ids.is_empty());
        assert!(state.streak_question_ids.is_empty());
        assert_eq!(state.state_version, 1);

        let stored = store.get_user_state("selector-user").await.unwrap().unwrap();
        assert!(stored.used_question_ids.is_empty());
        assert_eq!(stored.state_version, 1);
    }

    #[tokio::test]
    async fn falls_back_to_any_difficulty_after_committing_reset() {
        let (selector, store, mut state) =
            setup(vec![question("far", 9)], user_at(2, &["old"])).await;

        let selection = selector.select_next(&mut state).await.unwrap();

        assert_eq!(selection.stage, SelectionStage::AnyDifficulty);
        assert_eq!(selection.question.id, "far");
        let stored = store.get_user_state("selector-user").await.unwrap().unwrap();
        assert!(stored.used_question_ids.is_empty());
    }

    #[tokio::test]
    async fn empty_history_skips_the_reset_commit() {
        let (selector, _, mut state) = setup(vec![question("far", 9)], user_at(2, &[])).await;

        let selection = selector.select_next(&mut state).await.unwrap();

        assert_eq!(selection.stage, SelectionStage::AnyDifficulty);
        assert_eq!(state.state_version, 0);
    }

    #[tokio::test]
    async fn empty_catalog_is_fatal() {
        let (selector, _, mut state) = setup(Vec::new(), user_at(1, &[])).await;

        let result = selector.select_next(&mut state).await;
        assert!(matches!(result, Err(QuizError::CatalogEmpty)));
    }

    #[tokio::test]
    async fn stale_state_conflicts_on_reset() {
        let (selector, store, state) =
            setup(vec![question("only", 5)], user_at(5, &["only"])).await;

        let mut newer = state.clone();
        newer.state_version = 3;
        store.commit_user_state(&newer, None).await.unwrap();

        let mut stale = state;
        let result = selector.select_next(&mut stale).await;
        assert!(matches!(result, Err(QuizError::ConcurrentStateConflict(_))));
    }

    #[tokio::test]
    async fn serving_does_not_commit_history() {
        let (selector, store, mut state) =
            setup(vec![question("only", 2), question("other", 6)], user_at(2, &[])).await;

        let first = selector.select_next(&mut state).await.unwrap();
        let second = selector.select_next(&mut state).await.unwrap();

        assert_eq!(first.question.id, "only");
        assert_eq!(second.question.id, "only");
        assert!(state.used_question_ids.is_empty());
        let stored = store.get_user_state("selector-user").await.unwrap().unwrap();
        assert!(stored.used_question_ids.is_empty());
        assert_eq!(stored.state_version, 0);
    }

    #[tokio::test]
    async fn serves_every_question_once_per_cycle() {
        let catalog: Vec<Question> = (0..4).map(|i| question(&format!("q{}", i), 1)).collect();
        let (selector, _, mut state) = setup(catalog, user_at(1, &[])).await;

        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..4 {
            let selection = selector.select_next(&mut state).await.unwrap();
            assert_eq!(selection.stage, SelectionStage::Exact);
            state.used_question_ids.insert(selection.question.id.clone());
            seen.insert(selection.question.id);
        }
        assert_eq!(seen.len(), 4);
    }
}
