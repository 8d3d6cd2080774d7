use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AnsweredQuestion, Level};

/// One submitted test. Attempts are append-only and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestAttempt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub subject: String,
    pub level: Option<Level>,
    #[serde(rename = "type")]
    pub test_type: TestType,
    #[serde(default)]
    pub lesson_id: Option<String>,
    pub questions: Vec<AnsweredQuestion>,
    pub score: u32,
    pub correct_count: u32,
    pub total_questions: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub easy_score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium_score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advanced_score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promoted_to: Option<Level>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    Diagnostic,
    Regular,
    Mock,
    Lesson,
}

impl TestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestType::Diagnostic => "diagnostic",
            TestType::Regular => "regular",
            TestType::Mock => "mock",
            TestType::Lesson => "lesson",
        }
    }

    /// Number of questions the content generator must return for this kind.
    pub fn expected_questions(&self) -> usize {
        match self {
            TestType::Diagnostic | TestType::Regular => 10,
            TestType::Mock => 15,
            TestType::Lesson => 5,
        }
    }
}

/// Filter for reading the attempt log; results are newest first.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptQuery {
    pub user_id: Option<String>,
    pub subject: Option<String>,
    #[serde(rename = "type")]
    pub test_type: Option<TestType>,
    pub limit: Option<u32>,
}

impl AttemptQuery {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, attempt: &TestAttempt) -> bool {
        self.user_id
            .as_deref()
            .map_or(true, |user_id| attempt.user_id == user_id)
            && self
                .subject
                .as_deref()
                .map_or(true, |subject| attempt.subject == subject)
            && self
                .test_type
                .map_or(true, |test_type| attempt.test_type == test_type)
    }
}

/// Answers in question order; `null` marks an unanswered question.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTestRequest {
    pub answers: Vec<Option<String>>,
}
