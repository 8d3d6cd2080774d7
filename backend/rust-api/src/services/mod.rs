use std::sync::Arc;

use crate::config::{Config, StoreBackend};

pub mod analytics_aggregator;
pub mod change_feed;
pub mod content_generator;
pub mod learning_service;
pub mod leveling_engine;
pub mod progress_tracker;
pub mod store;
pub mod test_sessions;

use analytics_aggregator::AnalyticsAggregator;
use change_feed::ChangeFeed;
use content_generator::{ContentGenerator, GeminiGenerator};
use learning_service::LearningService;
use progress_tracker::ProgressTracker;
use store::{MemoryStore, MongoStore, NotifyingStore, ProgressStore};
use test_sessions::TestSessionRegistry;

pub struct AppState {
    pub config: Config,
    /// Every write through this store is published on `feed`.
    pub store: Arc<dyn ProgressStore>,
    pub generator: Arc<dyn ContentGenerator>,
    pub feed: ChangeFeed,
    pub sessions: TestSessionRegistry,
}

impl AppState {
    /// Connects the configured store backend and the Gemini generator.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn ProgressStore> = match config.store_backend {
            StoreBackend::Mongo => {
                let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri).await?;
                let mongo_store = MongoStore::new(mongo_client.database(&config.mongo_database));

                tokio::time::timeout(std::time::Duration::from_secs(30), mongo_store.ping())
                    .await
                    .map_err(|_| anyhow::anyhow!("MongoDB ping timeout after 30s"))??;
                mongo_store.ensure_indexes().await?;

                tracing::info!("MongoDB connected: database={}", config.mongo_database);
                Arc::new(mongo_store)
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory store; data is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        let generator: Arc<dyn ContentGenerator> = Arc::new(GeminiGenerator::new(&config));
        Ok(Self::with_components(config, store, generator))
    }

    /// Assembles the state around an existing store and generator.
    pub fn with_components(
        config: Config,
        store: Arc<dyn ProgressStore>,
        generator: Arc<dyn ContentGenerator>,
    ) -> Self {
        let feed = ChangeFeed::new();
        let sessions = TestSessionRegistry::new(config.test_session_ttl_secs);
        Self {
            store: Arc::new(NotifyingStore::new(store, feed.clone())),
            generator,
            feed,
            sessions,
            config,
        }
    }

    pub fn learning(&self) -> LearningService {
        LearningService::new(
            self.store.clone(),
            self.generator.clone(),
            self.sessions.clone(),
            self.config.subject.clone(),
        )
    }

    pub fn tracker(&self) -> ProgressTracker {
        ProgressTracker::new(self.store.clone(), self.config.subject.clone())
    }

    pub fn aggregator(&self) -> AnalyticsAggregator {
        AnalyticsAggregator::new(self.store.clone(), self.config.subject.clone())
    }
}
