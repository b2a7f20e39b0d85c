use anyhow::Context;
use redis::aio::ConnectionManager;
use std::sync::Arc;

use crate::config::{Config, StorageBackend};
use crate::middlewares::auth::JwtService;
use crate::store::{DocumentStore, MemoryStore, MongoStore};
use crate::utils::time::{Clock, SystemClock};

pub mod achievement_service;
pub mod activity_service;
pub mod challenge_service;
pub mod chat_service;
pub mod flashcard_service;
pub mod gemini_client;
pub mod grammar_service;
pub mod learning_events;
pub mod lesson_progress_service;
pub mod progression_service;
pub mod prompts;
pub mod session_analysis;
pub mod translation_service;

use gemini_client::{GeminiClient, TextGenerator};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub llm: Arc<dyn TextGenerator>,
    pub clock: Arc<dyn Clock>,
    pub redis: Option<ConnectionManager>,
    pub jwt: JwtService,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn DocumentStore> = match config.storage_backend {
            StorageBackend::Mongo => {
                let client = mongodb::Client::with_uri_str(&config.mongo_uri)
                    .await
                    .context("Failed to connect to MongoDB")?;
                let store = MongoStore::new(client.database(&config.mongo_database));
                store.ensure_indexes().await?;
                tracing::info!("MongoDB connected ({})", config.mongo_database);
                Arc::new(store)
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory record store, data is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        let redis = match config.redis_uri.as_deref() {
            Some(uri) => Some(connect_redis(uri).await?),
            None => {
                tracing::info!("Redis not configured, rate limiting disabled");
                None
            }
        };

        let llm: Arc<dyn TextGenerator> = Arc::new(GeminiClient::new(config.gemini.clone())?);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(config.utc_offset_minutes));

        let mut state = Self::from_parts(config, store, llm, clock);
        state.redis = redis;
        Ok(state)
    }

    /// Assembles state from ready-made collaborators. Redis stays off.
    pub fn from_parts(
        config: Config,
        store: Arc<dyn DocumentStore>,
        llm: Arc<dyn TextGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let jwt = JwtService::new(&config.jwt_secret);
        Self {
            config,
            store,
            llm,
            clock,
            redis: None,
            jwt,
        }
    }
}

async fn connect_redis(uri: &str) -> anyhow::Result<ConnectionManager> {
    let client = redis::Client::open(uri).context("Invalid Redis URI")?;

    tracing::info!("Attempting to connect to Redis...");
    let redis = tokio::time::timeout(
        std::time::Duration::from_secs(30),
        ConnectionManager::new(client),
    )
    .await
    .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

    let mut conn = redis.clone();
    tokio::time::timeout(
        std::time::Duration::from_secs(5),
        redis::cmd("PING").query_async::<String>(&mut conn),
    )
    .await
    .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

    tracing::info!("Redis connection established successfully");
    Ok(redis)
}
