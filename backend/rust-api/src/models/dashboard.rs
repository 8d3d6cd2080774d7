use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{TestAttempt, UserProfile};

/// Kind of per-user document a subscription listens to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChangeTopic {
    Profile,
    Progress,
    Analytics,
    Attempts,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub user_id: String,
    pub topic: ChangeTopic,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSummary {
    pub total_tests: usize,
    pub last_test_score: Option<u32>,
    pub average_score: Option<u32>,
}

impl AttemptSummary {
    /// `attempts` must be ordered newest first, as the store returns them.
    pub fn from_attempts(attempts: &[TestAttempt]) -> Self {
        let total_tests = attempts.len();
        let average_score = if total_tests == 0 {
            None
        } else {
            let sum: u32 = attempts.iter().map(|attempt| attempt.score).sum();
            Some((sum as f64 / total_tests as f64).round() as u32)
        };

        Self {
            total_tests,
            last_test_score: attempts.first().map(|attempt| attempt.score),
            average_score,
        }
    }
}

/// Pushed to live dashboards whenever the profile or attempt log changes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub user_id: String,
    pub profile: Option<UserProfile>,
    pub attempts: AttemptSummary,
    pub generated_at: DateTime<Utc>,
}

impl DashboardSnapshot {
    pub fn to_sse_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn event_name(&self) -> &'static str {
        "dashboard-snapshot"
    }
}
