//! Storage collaborators consumed by the quiz services.
//!
//! Services only see these traits; the process bootstrap decides whether the
//! MongoDB/Redis implementations or the in-memory ones are wired in.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{
    AnswerRecord, Board, LeaderboardEntry, Question, QuestionFilter, RankedEntry,
    UserSessionState,
};

pub mod memory;
pub mod mongo;
pub mod redis_leaderboard;

pub use memory::{MemoryCatalog, MemoryLeaderboard, MemorySessionStore};
pub use mongo::{MongoCatalog, MongoSessionStore};
pub use redis_leaderboard::RedisLeaderboard;

#[async_trait]
pub trait QuestionCatalog: Send + Sync {
    /// Backend label used in health output.
    fn kind(&self) -> &'static str;

    async fn ping(&self) -> Result<(), StoreError>;

    /// All questions matching `filter`, in no particular order.
    async fn query(&self, filter: &QuestionFilter) -> Result<Vec<Question>, StoreError>;

    async fn find(&self, question_id: &str) -> Result<Option<Question>, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;

    async fn insert_many(&self, questions: Vec<Question>) -> Result<usize, StoreError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    fn kind(&self) -> &'static str;

    async fn ping(&self) -> Result<(), StoreError>;

    async fn get_user_state(&self, user_id: &str) -> Result<Option<UserSessionState>, StoreError>;

    /// Inserts `state` unless the user already exists; returns whatever is stored.
    async fn create_user_state(
        &self,
        state: UserSessionState,
    ) -> Result<UserSessionState, StoreError>;

    /// Replaces the stored state. With `expected_version`, fails with
    /// `StoreError::Conflict` when the stored version differs.
    async fn commit_user_state(
        &self,
        state: &UserSessionState,
        expected_version: Option<u64>,
    ) -> Result<(), StoreError>;

    async fn find_answer_record(
        &self,
        user_id: &str,
        question_id: &str,
    ) -> Result<Option<AnswerRecord>, StoreError>;

    /// Atomically stores the graded state and its answer record. Either both
    /// are written or neither: `AlreadyExists` when a record for the pair is
    /// present, `Conflict` when the state moved past `expected_version`.
    async fn commit_grading(
        &self,
        state: &UserSessionState,
        expected_version: u64,
        record: &AnswerRecord,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait Leaderboard: Send + Sync {
    fn kind(&self) -> &'static str;

    async fn ping(&self) -> Result<(), StoreError>;

    async fn upsert(&self, username: &str, score: u64, streak: u32) -> Result<(), StoreError>;

    /// Highest values first.
    async fn top(&self, board: Board, limit: usize) -> Result<Vec<RankedEntry>, StoreError>;

    /// Top scorers joined with their current streak.
    async fn top_with_streaks(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError>;
}
