//! Progress store contract: per-user documents for profile, learning path
//! and analytics, plus the append-only test-attempt log.

use async_trait::async_trait;

use crate::error::LearningError;
use crate::models::{
    Analytics, AttemptQuery, LearningPathProgress, TestAttempt, UserProfile, UserRole,
};

pub mod memory;
pub mod mongo;
pub mod notifying;

pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use notifying::NotifyingStore;

pub type StoreResult<T> = Result<T, LearningError>;

#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<UserProfile>>;

    async fn save_profile(&self, profile: &UserProfile) -> StoreResult<()>;

    async fn list_profiles(&self, role: UserRole) -> StoreResult<Vec<UserProfile>>;

    async fn get_progress(&self, user_id: &str) -> StoreResult<Option<LearningPathProgress>>;

    /// Replaces the user's learning path document wholesale.
    async fn save_progress(&self, progress: &LearningPathProgress) -> StoreResult<()>;

    async fn get_analytics(&self, user_id: &str) -> StoreResult<Option<Analytics>>;

    async fn save_analytics(&self, analytics: &Analytics) -> StoreResult<()>;

    /// Appends an attempt and returns its generated id.
    async fn append_attempt(&self, attempt: &TestAttempt) -> StoreResult<String>;

    /// Attempts matching `query`, newest first.
    async fn list_attempts(&self, query: &AttemptQuery) -> StoreResult<Vec<TestAttempt>>;

    async fn ping(&self) -> StoreResult<()>;
}
