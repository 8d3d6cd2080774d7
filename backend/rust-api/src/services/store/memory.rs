use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ProgressStore, StoreResult};
use crate::models::{
    Analytics, AttemptQuery, LearningPathProgress, TestAttempt, UserProfile, UserRole,
};

/// In-process store used for local runs (`APP_STORE_BACKEND=memory`) and tests.
#[derive(Default)]
pub struct MemoryStore {
    profiles: RwLock<HashMap<String, UserProfile>>,
    progress: RwLock<HashMap<String, LearningPathProgress>>,
    analytics: RwLock<HashMap<String, Analytics>>,
    attempts: RwLock<Vec<TestAttempt>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<UserProfile>> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn save_profile(&self, profile: &UserProfile) -> StoreResult<()> {
        self.profiles
            .write()
            .await
            .insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }

    async fn list_profiles(&self, role: UserRole) -> StoreResult<Vec<UserProfile>> {
        let mut profiles: Vec<UserProfile> = self
            .profiles
            .read()
            .await
            .values()
            .filter(|profile| profile.role == role)
            .cloned()
            .collect();
        profiles.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(profiles)
    }

    async fn get_progress(&self, user_id: &str) -> StoreResult<Option<LearningPathProgress>> {
        Ok(self.progress.read().await.get(user_id).cloned())
    }

    async fn save_progress(&self, progress: &LearningPathProgress) -> StoreResult<()> {
        self.progress
            .write()
            .await
            .insert(progress.user_id.clone(), progress.clone());
        Ok(())
    }

    async fn get_analytics(&self, user_id: &str) -> StoreResult<Option<Analytics>> {
        Ok(self.analytics.read().await.get(user_id).cloned())
    }

    async fn save_analytics(&self, analytics: &Analytics) -> StoreResult<()> {
        self.analytics
            .write()
            .await
            .insert(analytics.user_id.clone(), analytics.clone());
        Ok(())
    }

    async fn append_attempt(&self, attempt: &TestAttempt) -> StoreResult<String> {
        let id = Uuid::new_v4().to_string();
        let mut stored = attempt.clone();
        stored.id = Some(id.clone());
        self.attempts.write().await.push(stored);
        Ok(id)
    }

    async fn list_attempts(&self, query: &AttemptQuery) -> StoreResult<Vec<TestAttempt>> {
        let attempts = self.attempts.read().await;
        let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        // Insertion order is creation order, so reverse iteration is newest first.
        Ok(attempts
            .iter()
            .rev()
            .filter(|attempt| query.matches(attempt))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnsweredQuestion, TestType};
    use chrono::Utc;

    fn attempt(user_id: &str, test_type: TestType, score: u32) -> TestAttempt {
        TestAttempt {
            id: None,
            user_id: user_id.to_string(),
            subject: "Python".to_string(),
            level: None,
            test_type,
            lesson_id: None,
            questions: vec![AnsweredQuestion {
                question: "q".into(),
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                correct_answer: "a".into(),
                level: None,
                student_answer: Some("b".into()),
                is_correct: false,
            }],
            score,
            correct_count: 0,
            total_questions: 1,
            easy_score: None,
            medium_score: None,
            advanced_score: None,
            promoted_to: None,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn attempts_are_newest_first_and_filtered() {
        let store = MemoryStore::new();
        store.append_attempt(&attempt("u1", TestType::Mock, 10)).await.unwrap();
        store.append_attempt(&attempt("u2", TestType::Mock, 20)).await.unwrap();
        store.append_attempt(&attempt("u1", TestType::Lesson, 30)).await.unwrap();

        let all = store.list_attempts(&AttemptQuery::for_user("u1")).await.unwrap();
        assert_eq!(all.iter().map(|a| a.score).collect::<Vec<_>>(), vec![30, 10]);
        assert!(all.iter().all(|a| a.id.is_some()));

        let mocks = store
            .list_attempts(&AttemptQuery {
                user_id: Some("u1".into()),
                test_type: Some(TestType::Mock),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(mocks.len(), 1);
        assert_eq!(mocks[0].score, 10);
    }

    #[tokio::test]
    async fn saved_attempt_round_trips_answers() {
        let store = MemoryStore::new();
        let original = attempt("u1", TestType::Regular, 0);
        let id = store.append_attempt(&original).await.unwrap();

        let fetched = store.list_attempts(&AttemptQuery::for_user("u1")).await.unwrap();
        assert_eq!(fetched[0].id.as_deref(), Some(id.as_str()));
        assert_eq!(fetched[0].questions, original.questions);
    }
}
