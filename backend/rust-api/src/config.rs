use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// MongoDB for catalog and user state, Redis for the leaderboard.
    Mongo,
    /// Everything in process memory; nothing survives a restart.
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = config::ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StorageBackend::Mongo),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(config::ConfigError::Message(format!(
                "unknown storage.backend {:?}, expected \"mongo\" or \"memory\"",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per line, for log shippers.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = config::ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(config::ConfigError::Message(format!(
                "unknown logging.format {:?}, expected \"text\" or \"json\"",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage_backend: StorageBackend,
    pub mongo_uri: String,
    pub redis_uri: String,
    pub mongo_database: String,
    pub bind_addr: String,
    pub leaderboard_size: usize,
    pub leaderboard_async_updates: bool,
    pub catalog_seed_file: Option<String>,
    pub metrics_auth: Option<String>,
    pub otlp_endpoint: Option<String>,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_backend: StorageBackend::Mongo,
            mongo_uri: "mongodb://localhost:27017/?replicaSet=rs0".to_string(),
            redis_uri: "redis://127.0.0.1:6379/0".to_string(),
            mongo_database: "adaptive_quiz".to_string(),
            bind_addr: "0.0.0.0:8081".to_string(),
            leaderboard_size: 10,
            leaderboard_async_updates: true,
            catalog_seed_file: None,
            metrics_auth: None,
            otlp_endpoint: None,
            log_format: LogFormat::Text,
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first, then the local one
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/*.toml, then APP__SECTION__KEY overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", app_env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let defaults = Config::default();

        let storage_backend = match settings
            .get_string("storage.backend")
            .or_else(|_| env::var("STORAGE_BACKEND"))
        {
            Ok(value) => value.parse()?,
            Err(_) => defaults.storage_backend,
        };

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or(defaults.mongo_uri);

        let redis_uri = settings
            .get_string("redis.uri")
            .or_else(|_| env::var("REDIS_URI"))
            .unwrap_or_else(|_| match env::var("REDIS_PASSWORD") {
                Ok(password) => {
                    let host = env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
                    let port = env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string());
                    format!("redis://:{}@{}:{}/0", password, host, port)
                }
                Err(_) => defaults.redis_uri.clone(),
            });

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or(defaults.mongo_database);

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("BIND_ADDR"))
            .unwrap_or(defaults.bind_addr);

        let leaderboard_size = match settings.get_int("leaderboard.size") {
            Ok(size) if size > 0 => usize::try_from(size).unwrap_or(defaults.leaderboard_size),
            Ok(size) => {
                return Err(config::ConfigError::Message(format!(
                    "leaderboard.size must be positive, got {}",
                    size
                )))
            }
            Err(_) => defaults.leaderboard_size,
        };

        let leaderboard_async_updates = settings
            .get_bool("leaderboard.async_updates")
            .unwrap_or(defaults.leaderboard_async_updates);

        let catalog_seed_file = settings
            .get_string("catalog.seed_file")
            .or_else(|_| env::var("CATALOG_SEED_FILE"))
            .ok()
            .and_then(non_empty);

        let metrics_auth = settings
            .get_string("metrics.auth")
            .or_else(|_| env::var("METRICS_AUTH"))
            .ok()
            .and_then(non_empty);

        let otlp_endpoint = settings
            .get_string("telemetry.otlp_endpoint")
            .or_else(|_| env::var("OTEL_EXPORTER_OTLP_ENDPOINT"))
            .ok()
            .and_then(non_empty);

        let log_format = match settings
            .get_string("logging.format")
            .or_else(|_| env::var("LOG_FORMAT"))
        {
            Ok(value) => value.parse()?,
            Err(_) => defaults.log_format,
        };

        if metrics_auth.is_none() && app_env == "prod" {
            return Err(config::ConfigError::Message(
                "metrics.auth must be set in production".to_string(),
            ));
        }

        Ok(Config {
            storage_backend,
            mongo_uri,
            redis_uri,
            mongo_database,
            bind_addr,
            leaderboard_size,
            leaderboard_async_updates,
            catalog_seed_file,
            metrics_auth,
            otlp_endpoint,
            log_format,
        })
    }
}
