use async_trait::async_trait;
use redis::aio::ConnectionManager;

use super::Leaderboard;
use crate::error::StoreError;
use crate::metrics::track_store_operation;
use crate::models::{Board, LeaderboardEntry, RankedEntry};

/// Leaderboard kept in two Redis sorted sets, `leaderboard:score` and
/// `leaderboard:streak`, both keyed by username.
pub struct RedisLeaderboard {
    redis: ConnectionManager,
}

impl RedisLeaderboard {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

/// ZREVRANGE ... WITHSCORES replies `[member, score, member, score, ...]`.
fn parse_ranked(reply: Vec<String>) -> Result<Vec<RankedEntry>, StoreError> {
    reply
        .chunks(2)
        .map(|pair| match pair {
            [username, value] => value
                .parse::<f64>()
                .map(|value| RankedEntry {
                    username: username.clone(),
                    value,
                })
                .map_err(|e| {
                    StoreError::Backend(anyhow::anyhow!(
                        "Invalid leaderboard score {:?} for {}: {}",
                        value,
                        username,
                        e
                    ))
                }),
            _ => Err(StoreError::Backend(anyhow::anyhow!(
                "Odd-length WITHSCORES reply"
            ))),
        })
        .collect()
}

#[async_trait]
impl Leaderboard for RedisLeaderboard {
    fn kind(&self) -> &'static str {
        "redis"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    async fn upsert(&self, username: &str, score: u64, streak: u32) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();
        track_store_operation("redis", "leaderboard.zadd", async {
            redis::pipe()
                .atomic()
                .cmd("ZADD")
                .arg(Board::Score.key())
                .arg(score)
                .arg(username)
                .ignore()
                .cmd("ZADD")
                .arg(Board::Streak.key())
                .arg(streak)
                .arg(username)
                .ignore()
                .query_async::<()>(&mut conn)
                .await
        })
        .await?;
        Ok(())
    }

    async fn top(&self, board: Board, limit: usize) -> Result<Vec<RankedEntry>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.redis.clone();
        let reply: Vec<String> = track_store_operation("redis", "leaderboard.zrevrange", async {
            redis::cmd("ZREVRANGE")
                .arg(board.key())
                .arg(0)
                .arg(limit - 1)
                .arg("WITHSCORES")
                .query_async(&mut conn)
                .await
        })
        .await?;
        parse_ranked(reply)
    }

    async fn top_with_streaks(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let top = self.top(Board::Score, limit).await?;
        if top.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for entry in &top {
            pipe.cmd("ZSCORE")
                .arg(Board::Streak.key())
                .arg(&entry.username);
        }
        let mut conn = self.redis.clone();
        let streaks: Vec<Option<f64>> = track_store_operation("redis", "leaderboard.zscore", async {
            pipe.query_async(&mut conn).await
        })
        .await?;

        Ok(top
            .into_iter()
            .zip(streaks)
            .map(|(entry, streak)| LeaderboardEntry {
                username: entry.username,
                score: entry.value.max(0.0) as u64,
                streak: streak.unwrap_or(0.0).max(0.0) as u32,
            })
            .collect())
    }
}
