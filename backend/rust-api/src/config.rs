use serde::Deserialize;
use std::env;

use crate::models::streak::FreezePolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.0-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 30,
        }
    }
}

/// XP paid per learning event, plus how streak freezes are earned.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RewardsConfig {
    pub lesson_xp: u64,
    pub chat_message_xp: u64,
    pub flashcard_correct_xp: u64,
    pub study_time_xp: u64,
    pub freeze_every_days: u32,
    pub max_banked_freezes: u32,
}

impl Default for RewardsConfig {
    fn default() -> Self {
        let freezes = FreezePolicy::default();
        Self {
            lesson_xp: 50,
            chat_message_xp: 5,
            flashcard_correct_xp: 5,
            study_time_xp: 0,
            freeze_every_days: freezes.earn_every_days,
            max_banked_freezes: freezes.max_banked,
        }
    }
}

impl RewardsConfig {
    pub fn freeze_policy(&self) -> FreezePolicy {
        FreezePolicy {
            earn_every_days: self.freeze_every_days,
            max_banked: self.max_banked_freezes,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app_env: String,
    pub storage_backend: StorageBackend,
    pub mongo_uri: String,
    pub mongo_database: String,
    pub redis_uri: Option<String>,
    pub jwt_secret: String,
    pub gemini: GeminiConfig,
    pub utc_offset_minutes: i32,
    pub chat_history_pairs: usize,
    pub rewards: RewardsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_env: "dev".to_string(),
            storage_backend: StorageBackend::Memory,
            mongo_uri: "mongodb://localhost:27017".to_string(),
            mongo_database: "guarani".to_string(),
            redis_uri: None,
            jwt_secret: "dev-secret-only-for-local-testing".to_string(),
            gemini: GeminiConfig::default(),
            utc_offset_minutes: 0,
            chat_history_pairs: 10,
            rewards: RewardsConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Try root .env first, then fallback to local .env
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
            .get_string("database.backend")
            .or_else(|_| env::var("STORAGE_BACKEND"))
            .unwrap_or_else(|_| "mongo".to_string())
            .to_lowercase()
            .as_str()
        {
            "mongo" | "mongodb" => StorageBackend::Mongo,
            "memory" => StorageBackend::Memory,
            other => {
                return Err(config::ConfigError::Message(format!(
                    "unknown database.backend '{}'",
                    other
                )))
            }
        };

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or(defaults.mongo_uri);

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or(defaults.mongo_database);

        let redis_uri = settings
            .get_string("redis.uri")
            .or_else(|_| env::var("REDIS_URI"))
            .ok()
            .filter(|uri| !uri.trim().is_empty());

        let jwt_secret = match settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
        {
            Ok(secret) => secret,
            Err(_) if app_env == "prod" => {
                return Err(config::ConfigError::Message(
                    "JWT_SECRET must be set in production".to_string(),
                ))
            }
            Err(_) => {
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                defaults.jwt_secret
            }
        };

        let gemini = GeminiConfig {
            api_key: settings
                .get_string("gemini.api_key")
                .or_else(|_| env::var("GEMINI_API_KEY"))
                .unwrap_or_default(),
            model: settings
                .get_string("gemini.model")
                .or_else(|_| env::var("GEMINI_MODEL"))
                .unwrap_or(defaults.gemini.model),
            base_url: settings
                .get_string("gemini.base_url")
                .unwrap_or(defaults.gemini.base_url),
            timeout_secs: int_setting(&settings, "gemini.timeout_secs", "GEMINI_TIMEOUT_SECS")
                .map(|secs| secs.max(1) as u64)
                .unwrap_or(defaults.gemini.timeout_secs),
        };
        if gemini.api_key.is_empty() {
            eprintln!("WARNING: GEMINI_API_KEY is not set, chat and translation will fail");
        }

        let utc_offset_minutes = int_setting(
            &settings,
            "calendar.utc_offset_minutes",
            "CALENDAR_UTC_OFFSET_MINUTES",
        )
        .map(|minutes| minutes.clamp(-14 * 60, 14 * 60) as i32)
        .unwrap_or(defaults.utc_offset_minutes);

        let chat_history_pairs = int_setting(&settings, "chat.history_pairs", "CHAT_HISTORY_PAIRS")
            .map(|pairs| pairs.max(0) as usize)
            .unwrap_or(defaults.chat_history_pairs);

        let rewards = settings
            .get::<RewardsConfig>("rewards")
            .unwrap_or(defaults.rewards);

        Ok(Config {
            app_env,
            storage_backend,
            mongo_uri,
            mongo_database,
            redis_uri,
            jwt_secret,
            gemini,
            utc_offset_minutes,
            chat_history_pairs,
            rewards,
        })
    }
}

fn int_setting(settings: &config::Config, key: &str, env_key: &str) -> Option<i64> {
    settings
        .get_int(key)
        .ok()
        .or_else(|| env::var(env_key).ok().and_then(|v| v.parse().ok()))
}
