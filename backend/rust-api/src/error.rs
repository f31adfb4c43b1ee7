use thiserror::Error;

/// Failures reported by the storage collaborators (catalog, session store, leaderboard).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Optimistic version check failed on commit.
    #[error("state version conflict")]
    Conflict,

    /// Uniqueness constraint hit, e.g. an answer record for the same (user, question).
    #[error("record already exists")]
    AlreadyExists,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    /// Only backend failures are worth retrying; conflicts and duplicates are answers.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Backend(_))
    }
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError::Backend(anyhow::Error::new(err))
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(anyhow::Error::new(err))
    }
}

/// Domain errors surfaced by the quiz services.
#[derive(Debug, Error)]
pub enum QuizError {
    #[error("No questions available in the catalog")]
    CatalogEmpty,

    #[error("User {0} not found")]
    UserNotFound(String),

    #[error("Question {0} not found")]
    QuestionNotFound(String),

    #[error("State of user {0} changed concurrently, retry the request")]
    ConcurrentStateConflict(String),

    #[error("Storage failure: {0}")]
    Storage(#[source] anyhow::Error),
}

impl QuizError {
    /// Maps a store failure for an operation scoped to `user_id`.
    pub fn from_store(user_id: &str, err: StoreError) -> Self {
        match err {
            StoreError::Conflict => QuizError::ConcurrentStateConflict(user_id.to_string()),
            StoreError::AlreadyExists => QuizError::Storage(anyhow::anyhow!(
                "unexpected duplicate record for user {}",
                user_id
            )),
            StoreError::Backend(e) => QuizError::Storage(e),
        }
    }
}

// Reads (catalog, leaderboard, lookups) never see Conflict/AlreadyExists.
impl From<StoreError> for QuizError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Backend(e) => QuizError::Storage(e),
            other => QuizError::Storage(anyhow::anyhow!(other.to_string())),
        }
    }
}
