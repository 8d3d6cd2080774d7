use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    options::{IndexOptions, ReplaceOptions},
    Collection, Database, IndexModel,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ProgressStore, StoreResult};
use crate::metrics::track_store_operation;
use crate::models::{
    Analytics, AttemptQuery, LearningPathProgress, TestAttempt, UserProfile, UserRole,
};
use crate::utils::time::chrono_to_bson;

const USERS: &str = "users";
const PROGRESS: &str = "student_progress";
const ANALYTICS: &str = "analytics";
const ATTEMPTS: &str = "test_attempts";

/// Attempt as stored: the domain record plus a BSON creation date used for
/// ordering.
#[derive(Debug, Serialize, Deserialize)]
struct AttemptDocument {
    #[serde(rename = "_id")]
    id: String,
    #[serde(flatten)]
    attempt: TestAttempt,
    #[serde(rename = "createdAt")]
    created_at: mongodb::bson::DateTime,
}

pub struct MongoStore {
    mongo: Database,
}

impl MongoStore {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// Creates the per-user unique indexes and the attempt log index.
    pub async fn ensure_indexes(&self) -> StoreResult<()> {
        let unique_user = || {
            IndexModel::builder()
                .keys(doc! { "userId": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build()
        };

        self.mongo
            .collection::<Document>(USERS)
            .create_index(unique_user())
            .await?;
        self.mongo
            .collection::<Document>(PROGRESS)
            .create_index(unique_user())
            .await?;
        self.mongo
            .collection::<Document>(ANALYTICS)
            .create_index(unique_user())
            .await?;
        self.mongo
            .collection::<Document>(ATTEMPTS)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "userId": 1, "createdAt": -1 })
                    .build(),
            )
            .await?;

        tracing::info!("MongoDB indexes ensured");
        Ok(())
    }

    fn profiles(&self) -> Collection<UserProfile> {
        self.mongo.collection(USERS)
    }

    fn progress(&self) -> Collection<LearningPathProgress> {
        self.mongo.collection(PROGRESS)
    }

    fn analytics(&self) -> Collection<Analytics> {
        self.mongo.collection(ANALYTICS)
    }

    fn attempts(&self) -> Collection<AttemptDocument> {
        self.mongo.collection(ATTEMPTS)
    }

    fn upsert() -> ReplaceOptions {
        ReplaceOptions::builder().upsert(true).build()
    }
}

#[async_trait]
impl ProgressStore for MongoStore {
    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<UserProfile>> {
        track_store_operation("find_one", USERS, async {
            Ok(self.profiles().find_one(doc! { "userId": user_id }).await?)
        })
        .await
    }

    async fn save_profile(&self, profile: &UserProfile) -> StoreResult<()> {
        track_store_operation("replace_one", USERS, async {
            self.profiles()
                .replace_one(doc! { "userId": &profile.user_id }, profile)
                .with_options(Self::upsert())
                .await?;
            Ok(())
        })
        .await
    }

    async fn list_profiles(&self, role: UserRole) -> StoreResult<Vec<UserProfile>> {
        track_store_operation("find", USERS, async {
            let cursor = self.profiles().find(doc! { "role": role.as_str() }).await?;
            Ok(cursor.try_collect().await?)
        })
        .await
    }

    async fn get_progress(&self, user_id: &str) -> StoreResult<Option<LearningPathProgress>> {
        track_store_operation("find_one", PROGRESS, async {
            Ok(self.progress().find_one(doc! { "userId": user_id }).await?)
        })
        .await
    }

    async fn save_progress(&self, progress: &LearningPathProgress) -> StoreResult<()> {
        track_store_operation("replace_one", PROGRESS, async {
            self.progress()
                .replace_one(doc! { "userId": &progress.user_id }, progress)
                .with_options(Self::upsert())
                .await?;
            Ok(())
        })
        .await
    }

    async fn get_analytics(&self, user_id: &str) -> StoreResult<Option<Analytics>> {
        track_store_operation("find_one", ANALYTICS, async {
            Ok(self.analytics().find_one(doc! { "userId": user_id }).await?)
        })
        .await
    }

    async fn save_analytics(&self, analytics: &Analytics) -> StoreResult<()> {
        track_store_operation("replace_one", ANALYTICS, async {
            self.analytics()
                .replace_one(doc! { "userId": &analytics.user_id }, analytics)
                .with_options(Self::upsert())
                .await?;
            Ok(())
        })
        .await
    }

    async fn append_attempt(&self, attempt: &TestAttempt) -> StoreResult<String> {
        let id = Uuid::new_v4().to_string();
        let document = AttemptDocument {
            id: id.clone(),
            attempt: TestAttempt {
                id: None,
                ..attempt.clone()
            },
            created_at: chrono_to_bson(Utc::now()),
        };

        track_store_operation("insert_one", ATTEMPTS, async {
            self.attempts().insert_one(&document).await?;
            Ok(())
        })
        .await?;

        tracing::debug!(
            "Attempt {} saved for user {} ({})",
            id,
            attempt.user_id,
            attempt.test_type.as_str()
        );
        Ok(id)
    }

    async fn list_attempts(&self, query: &AttemptQuery) -> StoreResult<Vec<TestAttempt>> {
        let mut filter = Document::new();
        if let Some(user_id) = &query.user_id {
            filter.insert("userId", user_id);
        }
        if let Some(subject) = &query.subject {
            filter.insert("subject", subject);
        }
        if let Some(test_type) = query.test_type {
            filter.insert("type", test_type.as_str());
        }

        let attempts = self.attempts();
        track_store_operation("find", ATTEMPTS, async {
            let mut find = attempts.find(filter).sort(doc! { "createdAt": -1 });
            if let Some(limit) = query.limit {
                find = find.limit(i64::from(limit));
            }
            let documents: Vec<AttemptDocument> = find.await?.try_collect().await?;

            Ok(documents
                .into_iter()
                .map(|document| TestAttempt {
                    id: Some(document.id),
                    ..document.attempt
                })
                .collect())
        })
        .await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.mongo.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}
