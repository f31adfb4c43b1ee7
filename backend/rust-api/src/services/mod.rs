use crate::config::Config;
use crate::stores::{
    Leaderboard, MemoryCatalog, MemoryLeaderboard, MemorySessionStore, MongoCatalog,
    MongoSessionStore, QuestionCatalog, RedisLeaderboard, SessionStore,
};
use mongodb::Client as MongoClient;
use redis::aio::ConnectionManager;
use std::sync::Arc;

use self::answer_service::AnswerService;
use self::leaderboard_service::LeaderboardService;
use self::session_service::SessionService;

pub struct AppState {
    pub config: Config,
    pub catalog: Arc<dyn QuestionCatalog>,
    pub store: Arc<dyn SessionStore>,
    pub leaderboard: Arc<dyn Leaderboard>,
    leaderboard_updates: LeaderboardService,
}

impl AppState {
    /// MongoDB for catalog and user state, Redis for the leaderboard.
    pub async fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: redis::Client,
    ) -> anyhow::Result<Self> {
        let catalog = MongoCatalog::new(mongo_client.database(&config.mongo_database));
        let store = MongoSessionStore::new(mongo_client, &config.mongo_database);
        catalog.ensure_indexes().await?;
        store.ensure_indexes().await?;

        tracing::info!("Attempting to connect to Redis...");

        let redis = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            ConnectionManager::new(redis_client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        tracing::info!("Redis ConnectionManager created, testing with PING...");

        let mut conn = redis.clone();
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        tracing::info!("Redis connection established successfully");

        Ok(Self::from_parts(
            config,
            Arc::new(catalog),
            Arc::new(store),
            Arc::new(RedisLeaderboard::new(redis)),
        ))
    }

    /// Process-local stores, for tests and `storage.backend = "memory"`.
    pub fn in_memory(config: Config) -> Self {
        Self::from_parts(
            config,
            Arc::new(MemoryCatalog::new()),
            Arc::new(MemorySessionStore::new()),
            Arc::new(MemoryLeaderboard::new()),
        )
    }

    /// Starts the leaderboard writer when async updates are enabled, so it
    /// must be called inside a tokio runtime.
    pub fn from_parts(
        config: Config,
        catalog: Arc<dyn QuestionCatalog>,
        store: Arc<dyn SessionStore>,
        leaderboard: Arc<dyn Leaderboard>,
    ) -> Self {
        let leaderboard_updates =
            LeaderboardService::new(leaderboard.clone(), config.leaderboard_async_updates)
                .with_default_limit(config.leaderboard_size);

        Self {
            config,
            catalog,
            store,
            leaderboard,
            leaderboard_updates,
        }
    }

    /// Every handle shares the one writer, which keeps a user's board
    /// updates in commit order.
    pub fn leaderboard_service(&self) -> LeaderboardService {
        self.leaderboard_updates.clone()
    }

    pub fn session_service(&self) -> SessionService {
        SessionService::new(
            self.catalog.clone(),
            self.store.clone(),
            self.leaderboard_service(),
        )
    }

    pub fn answer_service(&self) -> AnswerService {
        AnswerService::new(
            self.catalog.clone(),
            self.store.clone(),
            self.leaderboard_service(),
        )
    }
}

pub mod answer_service;
pub mod catalog_seed;
pub mod leaderboard_service;
pub mod question_selector;
pub mod scoring;
pub mod session_service;
