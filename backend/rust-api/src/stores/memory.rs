//! In-process implementations of the storage traits, used by the test suite
//! and by `storage.backend = "memory"` for local runs without MongoDB/Redis.

use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};

use super::{Leaderboard, QuestionCatalog, SessionStore};
use crate::error::StoreError;
use crate::models::{
    AnswerRecord, Board, LeaderboardEntry, Question, QuestionFilter, RankedEntry,
    UserSessionState,
};

#[derive(Default)]
pub struct MemoryCatalog {
    questions: RwLock<Vec<Question>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_questions(questions: Vec<Question>) -> Self {
        Self {
            questions: RwLock::new(questions),
        }
    }
}

#[async_trait]
impl QuestionCatalog for MemoryCatalog {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn query(&self, filter: &QuestionFilter) -> Result<Vec<Question>, StoreError> {
        let questions = self.questions.read().await;
        Ok(questions
            .iter()
            .filter(|q| filter.matches(q))
            .cloned()
            .collect())
    }

    async fn find(&self, question_id: &str) -> Result<Option<Question>, StoreError> {
        let questions = self.questions.read().await;
        Ok(questions.iter().find(|q| q.id == question_id).cloned())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.questions.read().await.len() as u64)
    }

    async fn insert_many(&self, questions: Vec<Question>) -> Result<usize, StoreError> {
        let mut stored = self.questions.write().await;
        if questions
            .iter()
            .any(|q| stored.iter().any(|existing| existing.id == q.id))
        {
            return Err(StoreError::AlreadyExists);
        }
        let inserted = questions.len();
        stored.extend(questions);
        Ok(inserted)
    }
}

#[derive(Default)]
struct SessionTables {
    states: HashMap<String, UserSessionState>,
    records: HashMap<(String, String), AnswerRecord>,
}

/// One lock guards both tables so a grading commit is atomic.
#[derive(Default)]
pub struct MemorySessionStore {
    tables: Mutex<SessionTables>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of answer records stored for `user_id`.
    pub async fn record_count(&self, user_id: &str) -> usize {
        let tables = self.tables.lock().await;
        tables
            .records
            .keys()
            .filter(|(user, _)| user == user_id)
            .count()
    }
}

fn check_version(
    stored: Option<&UserSessionState>,
    expected_version: Option<u64>,
) -> Result<(), StoreError> {
    match (stored, expected_version) {
        (_, None) => Ok(()),
        (Some(current), Some(expected)) if current.state_version == expected => Ok(()),
        _ => Err(StoreError::Conflict),
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get_user_state(&self, user_id: &str) -> Result<Option<UserSessionState>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.states.get(user_id).cloned())
    }

    async fn create_user_state(
        &self,
        state: UserSessionState,
    ) -> Result<UserSessionState, StoreError> {
        let mut tables = self.tables.lock().await;
        let stored = tables
            .states
            .entry(state.user_id.clone())
            .or_insert(state);
        Ok(stored.clone())
    }

    async fn commit_user_state(
        &self,
        state: &UserSessionState,
        expected_version: Option<u64>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        check_version(tables.states.get(&state.user_id), expected_version)?;

        let mut stored = state.clone();
        stored.updated_at = Utc::now();
        tables.states.insert(stored.user_id.clone(), stored);
        Ok(())
    }

    async fn find_answer_record(
        &self,
        user_id: &str,
        question_id: &str,
    ) -> Result<Option<AnswerRecord>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .records
            .get(&(user_id.to_string(), question_id.to_string()))
            .cloned())
    }

    async fn commit_grading(
        &self,
        state: &UserSessionState,
        expected_version: u64,
        record: &AnswerRecord,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let key = (record.user_id.clone(), record.question_id.clone());

        if tables.records.contains_key(&key) {
            return Err(StoreError::AlreadyExists);
        }
        check_version(tables.states.get(&state.user_id), Some(expected_version))?;

        let mut stored = state.clone();
        stored.updated_at = Utc::now();
        tables.states.insert(stored.user_id.clone(), stored);
        tables.records.insert(key, record.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryLeaderboard {
    entries: RwLock<HashMap<String, (u64, u32)>>,
}

impl MemoryLeaderboard {
    pub fn new() -> Self {
        Self::default()
    }
}

// Same ordering as ZREVRANGE: value descending, then member descending.
fn by_rank(a: &(String, f64), b: &(String, f64)) -> Ordering {
    b.1.partial_cmp(&a.1)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.0.cmp(&a.0))
}

#[async_trait]
impl Leaderboard for MemoryLeaderboard {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn upsert(&self, username: &str, score: u64, streak: u32) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .insert(username.to_string(), (score, streak));
        Ok(())
    }

    async fn top(&self, board: Board, limit: usize) -> Result<Vec<RankedEntry>, StoreError> {
        let entries = self.entries.read().await;
        let mut ranked: Vec<(String, f64)> = entries
            .iter()
            .map(|(name, (score, streak))| {
                let value = match board {
                    Board::Score => *score as f64,
                    Board::Streak => f64::from(*streak),
                };
                (name.clone(), value)
            })
            .collect();
        ranked.sort_by(by_rank);

        Ok(ranked
            .into_iter()
            .take(limit)
            .map(|(username, value)| RankedEntry { username, value })
            .collect())
    }

    async fn top_with_streaks(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let top = self.top(Board::Score, limit).await?;
        let entries = self.entries.read().await;
        Ok(top
            .into_iter()
            .map(|entry| {
                let (score, streak) = entries.get(&entry.username).copied().unwrap_or_default();
                LeaderboardEntry {
                    username: entry.username,
                    score,
                    streak,
                }
            })
            .collect())
    }
}
