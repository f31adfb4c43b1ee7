use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::error::QuizError;
use crate::metrics::LEADERBOARD_UPDATE_FAILURES_TOTAL;
use crate::models::{Board, LeaderboardResponse, UserSessionState};
use crate::stores::Leaderboard;
use crate::utils::retry::{retry_transient, RetryPolicy};

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 100;
const UPDATE_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct BoardUpdate {
    username: String,
    score: u64,
    streak: u32,
    state_version: u64,
}

impl BoardUpdate {
    fn from_state(state: &UserSessionState) -> Self {
        Self {
            username: state.user_id.clone(),
            score: state.score,
            streak: state.streak,
            state_version: state.state_version,
        }
    }
}

/// Applies updates to the board, skipping any that are older than the last
/// version written for the same user.
struct Publisher {
    board: Arc<dyn Leaderboard>,
    policy: RetryPolicy,
    applied: HashMap<String, u64>,
}

impl Publisher {
    fn new(board: Arc<dyn Leaderboard>, policy: RetryPolicy) -> Self {
        Self {
            board,
            policy,
            applied: HashMap::new(),
        }
    }

    async fn apply(&mut self, update: BoardUpdate) {
        if let Some(&applied) = self.applied.get(&update.username) {
            if update.state_version <= applied {
                tracing::debug!(
                    "Skipping stale leaderboard update for {} (version {} <= {})",
                    update.username,
                    update.state_version,
                    applied
                );
                return;
            }
        }

        let board = &self.board;
        let result = retry_transient(&self.policy, "leaderboard.upsert", || {
            board.upsert(&update.username, update.score, update.streak)
        })
        .await;

        match result {
            Ok(()) => {
                self.applied.insert(update.username, update.state_version);
            }
            Err(e) => {
                LEADERBOARD_UPDATE_FAILURES_TOTAL.inc();
                tracing::warn!(
                    "Leaderboard update for {} dropped (score={}, streak={}, version={}): {}",
                    update.username,
                    update.score,
                    update.streak,
                    update.state_version,
                    e
                );
            }
        }
    }
}

#[derive(Clone)]
enum Delivery {
    /// Written before `record` returns.
    Inline(Arc<Mutex<Publisher>>),
    /// Queued for the background writer, applied in enqueue order.
    Queued(mpsc::Sender<BoardUpdate>),
}

async fn run_writer(mut publisher: Publisher, mut rx: mpsc::Receiver<BoardUpdate>) {
    tracing::debug!("Leaderboard writer started");
    while let Some(update) = rx.recv().await {
        publisher.apply(update).await;
    }
    tracing::debug!("Leaderboard writer stopped");
}

/// Best-effort projection of user states onto the score and streak boards.
/// A failed update is logged and counted, never returned to the caller.
/// Clones share one writer, so build it once per application.
#[derive(Clone)]
pub struct LeaderboardService {
    board: Arc<dyn Leaderboard>,
    delivery: Delivery,
    default_limit: usize,
}

impl LeaderboardService {
    /// With `async_updates` a writer task is spawned, so this must run inside
    /// a tokio runtime.
    pub fn new(board: Arc<dyn Leaderboard>, async_updates: bool) -> Self {
        let delivery = if async_updates {
            let (tx, rx) = mpsc::channel(UPDATE_QUEUE_CAPACITY);
            let publisher = Publisher::new(board.clone(), RetryPolicy::background());
            tokio::spawn(run_writer(publisher, rx));
            Delivery::Queued(tx)
        } else {
            Delivery::Inline(Arc::new(Mutex::new(Publisher::new(
                board.clone(),
                RetryPolicy::none(),
            ))))
        };

        Self {
            board,
            delivery,
            default_limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit.clamp(1, MAX_LIMIT);
        self
    }

    /// Publishes the committed `state`. In async mode the update is queued
    /// and this returns once it is accepted.
    pub async fn record(&self, state: &UserSessionState) {
        let update = BoardUpdate::from_state(state);
        match &self.delivery {
            Delivery::Inline(publisher) => publisher.lock().await.apply(update).await,
            Delivery::Queued(tx) => {
                if let Err(e) = tx.send(update).await {
                    LEADERBOARD_UPDATE_FAILURES_TOTAL.inc();
                    tracing::warn!(
                        "Leaderboard writer is gone, dropping update for {}",
                        e.0.username
                    );
                }
            }
        }
    }

    /// Top entries of both boards, `limit` clamped to 1..=100.
    pub async fn standings(&self, limit: Option<usize>) -> Result<LeaderboardResponse, QuizError> {
        let limit = limit.unwrap_or(self.default_limit).clamp(1, MAX_LIMIT);
        let policy = RetryPolicy::reads();

        let scores = retry_transient(&policy, "leaderboard.scores", || {
            self.board.top_with_streaks(limit)
        })
        .await?;
        let streaks = retry_transient(&policy, "leaderboard.streaks", || {
            self.board.top(Board::Streak, limit)
        })
        .await?;

        Ok(LeaderboardResponse { scores, streaks })
    }
}
