use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Band, Level, LearningPathProgress, TestAttempt, UserProfile};

/// Per-user analytics document stored in "analytics".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub user_id: String,
    pub subject: String,
    pub easy_score: u32,
    pub medium_score: u32,
    pub advanced_score: u32,
    #[serde(default)]
    pub strengths: BTreeSet<String>,
    #[serde(default)]
    pub weaknesses: BTreeSet<String>,
    #[serde(default)]
    pub promotion_history: Vec<PromotionRecord>,
    pub last_updated: DateTime<Utc>,
}

impl Analytics {
    pub fn empty(user_id: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            subject: subject.into(),
            easy_score: 0,
            medium_score: 0,
            advanced_score: 0,
            strengths: BTreeSet::new(),
            weaknesses: BTreeSet::new(),
            promotion_history: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    pub fn scores(&self) -> BandScores {
        BandScores::new(self.easy_score, self.medium_score, self.advanced_score)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromotionRecord {
    pub from: Option<Level>,
    pub to: Level,
    pub timestamp: DateTime<Utc>,
}

/// Correct answers per band in a 5 + 5 + 5 mock test.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BandScores {
    pub easy_score: u32,
    pub medium_score: u32,
    pub advanced_score: u32,
}

impl BandScores {
    pub fn new(easy_score: u32, medium_score: u32, advanced_score: u32) -> Self {
        Self {
            easy_score,
            medium_score,
            advanced_score,
        }
    }

    pub fn get(&self, band: Band) -> u32 {
        match band {
            Band::Easy => self.easy_score,
            Band::Medium => self.medium_score,
            Band::Advanced => self.advanced_score,
        }
    }
}

/// Aggregate for the teacher dashboard.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeacherOverview {
    pub student_count: usize,
    pub level_distribution: BTreeMap<String, usize>,
    pub mean_score: Option<f64>,
    pub attempt_count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentRow {
    pub user_id: String,
    pub display_name: String,
    pub email: String,
    pub current_level: String,
    pub progress_percentage: u32,
    pub lessons_completed: usize,
    pub total_lessons: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDetail {
    pub profile: UserProfile,
    pub progress: Option<LearningPathProgress>,
    pub analytics: Option<Analytics>,
    pub test_attempts: Vec<TestAttempt>,
}
