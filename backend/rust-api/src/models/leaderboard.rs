use serde::{Deserialize, Serialize};
use validator::Validate;

/// The two sorted sets kept per username.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Board {
    Score,
    Streak,
}

impl Board {
    pub fn key(self) -> &'static str {
        match self {
            Board::Score => "leaderboard:score",
            Board::Streak => "leaderboard:streak",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub username: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub username: String,
    pub score: u64,
    pub streak: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    pub scores: Vec<LeaderboardEntry>,
    pub streaks: Vec<RankedEntry>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LeaderboardQuery {
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: Option<usize>,
}
