use std::sync::Arc;

use async_trait::async_trait;

use super::{ProgressStore, StoreResult};
use crate::models::dashboard::ChangeTopic;
use crate::models::{
    Analytics, AttemptQuery, LearningPathProgress, TestAttempt, UserProfile, UserRole,
};
use crate::services::change_feed::ChangeFeed;

/// Store decorator that publishes a change event after every successful write.
pub struct NotifyingStore {
    inner: Arc<dyn ProgressStore>,
    feed: ChangeFeed,
}

impl NotifyingStore {
    pub fn new(inner: Arc<dyn ProgressStore>, feed: ChangeFeed) -> Self {
        Self { inner, feed }
    }
}

#[async_trait]
impl ProgressStore for NotifyingStore {
    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<UserProfile>> {
        self.inner.get_profile(user_id).await
    }

    async fn save_profile(&self, profile: &UserProfile) -> StoreResult<()> {
        self.inner.save_profile(profile).await?;
        self.feed.publish(&profile.user_id, ChangeTopic::Profile);
        Ok(())
    }

    async fn list_profiles(&self, role: UserRole) -> StoreResult<Vec<UserProfile>> {
        self.inner.list_profiles(role).await
    }

    async fn get_progress(&self, user_id: &str) -> StoreResult<Option<LearningPathProgress>> {
        self.inner.get_progress(user_id).await
    }

    async fn save_progress(&self, progress: &LearningPathProgress) -> StoreResult<()> {
        self.inner.save_progress(progress).await?;
        self.feed.publish(&progress.user_id, ChangeTopic::Progress);
        Ok(())
    }

    async fn get_analytics(&self, user_id: &str) -> StoreResult<Option<Analytics>> {
        self.inner.get_analytics(user_id).await
    }

    async fn save_analytics(&self, analytics: &Analytics) -> StoreResult<()> {
        self.inner.save_analytics(analytics).await?;
        self.feed.publish(&analytics.user_id, ChangeTopic::Analytics);
        Ok(())
    }

    async fn append_attempt(&self, attempt: &TestAttempt) -> StoreResult<String> {
        let id = self.inner.append_attempt(attempt).await?;
        self.feed.publish(&attempt.user_id, ChangeTopic::Attempts);
        Ok(id)
    }

    async fn list_attempts(&self, query: &AttemptQuery) -> StoreResult<Vec<TestAttempt>> {
        self.inner.list_attempts(query).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }
}
