use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Level;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub lesson_id: String,
    pub title: String,
    pub description: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub content_viewed: bool,
    #[serde(default)]
    pub test_passed: bool,
    #[serde(default)]
    pub test_score: Option<u32>,
}

/// Learning path document stored in "student_progress", one per user.
///
/// `progress_percentage` is derived from lesson completion and is only ever
/// written by the progress tracker after recomputing it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LearningPathProgress {
    pub user_id: String,
    pub subject: String,
    pub current_level: Level,
    pub lessons: Vec<Lesson>,
    pub progress_percentage: u32,
    pub last_updated: DateTime<Utc>,
}

impl LearningPathProgress {
    pub fn lesson_index(&self, lesson_id: &str) -> Option<usize> {
        self.lessons
            .iter()
            .position(|lesson| lesson.lesson_id == lesson_id)
    }

    pub fn completed_count(&self) -> usize {
        self.lessons.iter().filter(|lesson| lesson.completed).count()
    }
}

/// Lesson with its read-time unlock state, as returned to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonStatus {
    pub lesson_id: String,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub content_viewed: bool,
    pub test_passed: bool,
    pub test_score: Option<u32>,
    pub accessible: bool,
    pub test_available: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathOverview {
    pub subject: String,
    pub current_level: Level,
    pub progress_percentage: u32,
    pub level_complete: bool,
    pub lessons: Vec<LessonStatus>,
}
