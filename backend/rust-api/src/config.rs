use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub mongo_database: String,
    pub store_backend: StoreBackend,
    pub jwt_secret: String,
    /// Content generator secret. `None` is allowed at startup and reported,
    /// generation calls then fail with a generation error.
    pub ai_api_key: Option<String>,
    pub ai_api_url: String,
    pub ai_model: String,
    pub subject: String,
    pub test_session_ttl_secs: i64,
    pub bind_addr: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load environment variables from root .env file (two levels up)
        // Try root .env first, then fallback to local .env
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "adaptive_learning".to_string());

        let store_backend = match settings
            .get_string("store.backend")
            .or_else(|_| env::var("APP_STORE_BACKEND"))
            .unwrap_or_else(|_| "mongo".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => StoreBackend::Memory,
            "mongo" => StoreBackend::Mongo,
            other => {
                return Err(config::ConfigError::Message(format!(
                    "Unknown store backend `{}` (expected mongo or memory)",
                    other
                )))
            }
        };

        let jwt_secret = settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
            .unwrap_or_else(|_| {
                if env == "prod" {
                    panic!("FATAL: JWT_SECRET must be set in production!");
                }
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            });

        let ai_api_key = settings
            .get_string("ai.api_key")
            .or_else(|_| env::var("AI_API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty());

        let ai_api_url = settings
            .get_string("ai.api_url")
            .or_else(|_| env::var("AI_API_URL"))
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".to_string());

        let ai_model = settings
            .get_string("ai.model")
            .or_else(|_| env::var("AI_MODEL"))
            .unwrap_or_else(|_| "gemini-2.5-flash-lite".to_string());

        let subject = settings
            .get_string("learning.subject")
            .or_else(|_| env::var("APP_SUBJECT"))
            .unwrap_or_else(|_| "Python".to_string());

        let test_session_ttl_secs = settings
            .get_int("learning.test_session_ttl_secs")
            .ok()
            .or_else(|| {
                env::var("APP_TEST_SESSION_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok())
            })
            .filter(|v| *v > 0)
            .unwrap_or(3600);

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("APP_BIND_ADDR"))
            .unwrap_or_else(|_| "0.0.0.0:8081".to_string());

        Ok(Config {
            mongo_uri,
            mongo_database,
            store_backend,
            jwt_secret,
            ai_api_key,
            ai_api_url,
            ai_model,
            subject,
            test_session_ttl_secs,
            bind_addr,
        })
    }

    pub fn ai_configured(&self) -> bool {
        self.ai_api_key.is_some()
    }
}
