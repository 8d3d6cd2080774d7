use serde::{Deserialize, Serialize};
use std::fmt;

pub mod analytics;
pub mod attempt;
pub mod dashboard;
pub mod generated;
pub mod progress;
pub mod question;
pub mod user;

pub use analytics::{Analytics, PromotionRecord};
pub use attempt::{AttemptQuery, SubmitTestRequest, TestAttempt, TestType};
pub use progress::{LearningPathProgress, Lesson};
pub use question::{AnsweredQuestion, TestQuestion};
pub use user::{RegisterProfileRequest, UserProfile, UserRole};

/// Level stored on a profile or learning path.
///
/// Two vocabularies share this enum: the placement levels produced by a
/// diagnostic test (`beginner`, `intermediate`, `advanced`) and the band
/// ladder walked by mock tests (`easy`, `medium`, `advanced`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Easy,
    Medium,
    Advanced,
    Beginner,
    Intermediate,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Easy => "easy",
            Level::Medium => "medium",
            Level::Advanced => "advanced",
            Level::Beginner => "beginner",
            Level::Intermediate => "intermediate",
        }
    }

    /// Position on the easy → medium → advanced ladder, if this level is on it.
    pub fn band(&self) -> Option<Band> {
        match self {
            Level::Easy => Some(Band::Easy),
            Level::Medium => Some(Band::Medium),
            Level::Advanced => Some(Band::Advanced),
            Level::Beginner | Level::Intermediate => None,
        }
    }

    /// Difficulty word sent to the content generator for level-based tests.
    pub fn difficulty(&self) -> &'static str {
        match self {
            Level::Beginner | Level::Easy => "easy",
            Level::Intermediate | Level::Medium => "moderate",
            Level::Advanced => "hard",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Band> for Level {
    fn from(band: Band) -> Self {
        match band {
            Band::Easy => Level::Easy,
            Band::Medium => Level::Medium,
            Band::Advanced => Level::Advanced,
        }
    }
}

impl From<PlacementLevel> for Level {
    fn from(level: PlacementLevel) -> Self {
        match level {
            PlacementLevel::Beginner => Level::Beginner,
            PlacementLevel::Intermediate => Level::Intermediate,
            PlacementLevel::Advanced => Level::Advanced,
        }
    }
}

/// Difficulty tier used to partition mock-test questions and scores.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Easy,
    Medium,
    Advanced,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::Easy, Band::Medium, Band::Advanced];

    pub fn as_str(&self) -> &'static str {
        match self {
            Band::Easy => "easy",
            Band::Medium => "medium",
            Band::Advanced => "advanced",
        }
    }

    /// Label written into analytics strengths/weaknesses.
    pub fn label(&self) -> &'static str {
        match self {
            Band::Easy => "easy band",
            Band::Medium => "medium band",
            Band::Advanced => "advanced band",
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            Band::Easy => 0,
            Band::Medium => 1,
            Band::Advanced => 2,
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying a diagnostic score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlacementLevel {
    Beginner,
    Intermediate,
    Advanced,
}

/// Explicit per-request session, built by the auth middleware from the
/// verified token and passed to every service call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: String,
    pub role: UserRole,
}

impl SessionContext {
    pub fn new(user_id: impl Into<String>, role: UserRole) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn is_teacher(&self) -> bool {
        self.role == UserRole::Teacher
    }
}
