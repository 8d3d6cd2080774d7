use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::LearningError;
use crate::metrics::{TEST_SESSIONS_ACTIVE, TEST_SESSIONS_TOTAL};
use crate::models::question::QuestionView;
use crate::models::{Level, SessionContext, TestQuestion, TestType};

/// A generated test waiting for its answers. Correct answers never leave the
/// server until the test is submitted.
#[derive(Debug, Clone)]
pub struct TestSession {
    pub id: String,
    pub user_id: String,
    pub test_type: TestType,
    pub level: Option<Level>,
    pub lesson_id: Option<String>,
    pub questions: Vec<TestQuestion>,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TestSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn view(&self) -> TestSessionView {
        TestSessionView {
            session_id: self.id.clone(),
            test_type: self.test_type,
            level: self.level,
            lesson_id: self.lesson_id.clone(),
            questions: self
                .questions
                .iter()
                .enumerate()
                .map(|(index, question)| QuestionView::from_question(index, question))
                .collect(),
            expires_at: self.expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSessionView {
    pub session_id: String,
    #[serde(rename = "type")]
    pub test_type: TestType,
    pub level: Option<Level>,
    pub lesson_id: Option<String>,
    pub questions: Vec<QuestionView>,
    pub expires_at: DateTime<Utc>,
}

/// Generated tests held between start and submit, with a fixed TTL.
#[derive(Clone)]
pub struct TestSessionRegistry {
    sessions: Arc<RwLock<HashMap<String, TestSession>>>,
    ttl: Duration,
}

impl TestSessionRegistry {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl: Duration::seconds(ttl_secs.max(1)),
        }
    }

    pub async fn open(
        &self,
        ctx: &SessionContext,
        test_type: TestType,
        level: Option<Level>,
        lesson_id: Option<String>,
        questions: Vec<TestQuestion>,
    ) -> TestSession {
        let now = Utc::now();
        let session = TestSession {
            id: Uuid::new_v4().to_string(),
            user_id: ctx.user_id.clone(),
            test_type,
            level,
            lesson_id,
            questions,
            started_at: now,
            expires_at: now + self.ttl,
        };

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, existing| !existing.is_expired(now));
        let expired = before - sessions.len();
        sessions.insert(session.id.clone(), session.clone());
        TEST_SESSIONS_ACTIVE.set(sessions.len() as i64);
        drop(sessions);

        if expired > 0 {
            TEST_SESSIONS_TOTAL
                .with_label_values(&["expired"])
                .inc_by(expired as u64);
        }
        TEST_SESSIONS_TOTAL.with_label_values(&["created"]).inc();
        tracing::info!(
            "Test session {} opened for user {} ({})",
            session.id,
            ctx.user_id,
            test_type.as_str()
        );
        session
    }

    /// Removes the caller's live session and hands it over for scoring, so a
    /// session is scored at most once even under concurrent submits.
    pub async fn take(
        &self,
        ctx: &SessionContext,
        session_id: &str,
    ) -> Result<TestSession, LearningError> {
        let mut sessions = self.sessions.write().await;
        let owned = matches!(
            sessions.get(session_id),
            Some(session) if session.user_id == ctx.user_id && !session.is_expired(Utc::now())
        );
        let taken = if owned { sessions.remove(session_id) } else { None };
        TEST_SESSIONS_ACTIVE.set(sessions.len() as i64);

        taken.ok_or_else(|| LearningError::not_found(format!("Test session {}", session_id)))
    }

    /// Puts back a taken session whose answers were rejected.
    pub async fn restore(&self, session: TestSession) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session);
        TEST_SESSIONS_ACTIVE.set(sessions.len() as i64);
    }
}
