//! Longitudinal performance signal: band scores, strengths and weaknesses,
//! promotion history, and the read-only teacher aggregates.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;

use crate::error::LearningError;
use crate::models::analytics::{BandScores, StudentDetail, StudentRow, TeacherOverview};
use crate::models::{
    Analytics, AttemptQuery, Band, LearningPathProgress, PromotionRecord, SessionContext,
    UserProfile, UserRole,
};
use crate::services::leveling_engine::PromotionOutcome;
use crate::services::store::ProgressStore;

pub const STRENGTH_MIN_SCORE: u32 = 4;
pub const WEAKNESS_MAX_SCORE: u32 = 2;

const UNASSESSED: &str = "unassessed";
const NOT_STARTED: &str = "Not Started";

/// Splits band labels into strengths (≥4) and weaknesses (≤2). A band at 3
/// lands in neither set.
pub fn classify_bands(scores: BandScores) -> (BTreeSet<String>, BTreeSet<String>) {
    let mut strengths = BTreeSet::new();
    let mut weaknesses = BTreeSet::new();
    for band in Band::ALL {
        let score = scores.get(band);
        if score >= STRENGTH_MIN_SCORE {
            strengths.insert(band.label().to_string());
        } else if score <= WEAKNESS_MAX_SCORE {
            weaknesses.insert(band.label().to_string());
        }
    }
    (strengths, weaknesses)
}

/// Applies one mock result: last attempt wins for scores and labels, and the
/// history grows only when the level actually changed.
pub fn apply_mock_result(analytics: &mut Analytics, outcome: &PromotionOutcome, at: DateTime<Utc>) {
    let scores = BandScores::new(
        outcome.easy_score,
        outcome.medium_score,
        outcome.advanced_score,
    );
    analytics.easy_score = scores.easy_score;
    analytics.medium_score = scores.medium_score;
    analytics.advanced_score = scores.advanced_score;

    if outcome.promoted() {
        analytics.promotion_history.push(PromotionRecord {
            from: outcome.previous_level,
            to: outcome.promoted_level,
            timestamp: at,
        });
    }

    let (strengths, weaknesses) = classify_bands(scores);
    analytics.strengths = strengths;
    analytics.weaknesses = weaknesses;
    analytics.last_updated = at;
}

fn student_row(profile: &UserProfile, progress: Option<LearningPathProgress>) -> StudentRow {
    match progress {
        Some(progress) => StudentRow {
            user_id: profile.user_id.clone(),
            display_name: profile.display_name.clone(),
            email: profile.email.clone(),
            current_level: progress.current_level.to_string(),
            progress_percentage: progress.progress_percentage,
            lessons_completed: progress.completed_count(),
            total_lessons: progress.lessons.len(),
        },
        None => StudentRow {
            user_id: profile.user_id.clone(),
            display_name: profile.display_name.clone(),
            email: profile.email.clone(),
            current_level: NOT_STARTED.to_string(),
            progress_percentage: 0,
            lessons_completed: 0,
            total_lessons: 0,
        },
    }
}

pub struct AnalyticsAggregator {
    store: Arc<dyn ProgressStore>,
    subject: String,
}

impl AnalyticsAggregator {
    pub fn new(store: Arc<dyn ProgressStore>, subject: impl Into<String>) -> Self {
        Self {
            store,
            subject: subject.into(),
        }
    }

    pub async fn analytics(&self, ctx: &SessionContext) -> Result<Analytics, LearningError> {
        self.store
            .get_analytics(&ctx.user_id)
            .await?
            .ok_or_else(|| LearningError::not_found("Analytics"))
    }

    /// Creates the record on first use, then applies the mock result.
    pub async fn record_mock_result(
        &self,
        ctx: &SessionContext,
        outcome: &PromotionOutcome,
    ) -> Result<Analytics, LearningError> {
        let mut analytics = self
            .store
            .get_analytics(&ctx.user_id)
            .await?
            .unwrap_or_else(|| Analytics::empty(&ctx.user_id, &self.subject));

        apply_mock_result(&mut analytics, outcome, Utc::now());
        self.store.save_analytics(&analytics).await?;

        tracing::debug!(
            "Analytics updated for user {}: strengths={:?}, weaknesses={:?}",
            ctx.user_id,
            analytics.strengths,
            analytics.weaknesses
        );
        Ok(analytics)
    }

    /// One row per student; a failed progress read degrades that row to
    /// "Not Started" instead of failing the listing.
    pub async fn student_rows(&self) -> Result<Vec<StudentRow>, LearningError> {
        let students = self.store.list_profiles(UserRole::Student).await?;

        let rows = join_all(students.iter().map(|profile| async move {
            match self.store.get_progress(&profile.user_id).await {
                Ok(progress) => student_row(profile, progress),
                Err(e) => {
                    tracing::warn!(
                        "Could not fetch progress for user {}: {}",
                        profile.user_id,
                        e
                    );
                    student_row(profile, None)
                }
            }
        }))
        .await;

        Ok(rows)
    }

    pub async fn teacher_overview(&self) -> Result<TeacherOverview, LearningError> {
        let all = AttemptQuery::default();
        let (rows, attempts) =
            futures::try_join!(self.student_rows(), self.store.list_attempts(&all))?;

        let mut level_distribution: BTreeMap<String, usize> = BTreeMap::new();
        for row in &rows {
            let bucket = if row.current_level == NOT_STARTED {
                UNASSESSED
            } else {
                row.current_level.as_str()
            };
            *level_distribution.entry(bucket.to_string()).or_default() += 1;
        }

        let mean_score = if attempts.is_empty() {
            None
        } else {
            let total: u64 = attempts.iter().map(|a| u64::from(a.score)).sum();
            Some(total as f64 / attempts.len() as f64)
        };

        Ok(TeacherOverview {
            student_count: rows.len(),
            level_distribution,
            mean_score,
            attempt_count: attempts.len(),
        })
    }

    pub async fn student_detail(&self, user_id: &str) -> Result<StudentDetail, LearningError> {
        let profile = self
            .store
            .get_profile(user_id)
            .await?
            .ok_or_else(|| LearningError::not_found(format!("Student {}", user_id)))?;
        if profile.role != UserRole::Student {
            return Err(LearningError::not_found(format!("Student {}", user_id)));
        }

        let query = AttemptQuery::for_user(user_id);
        let (progress, analytics, test_attempts) = futures::try_join!(
            self.store.get_progress(user_id),
            self.store.get_analytics(user_id),
            self.store.list_attempts(&query)
        )?;

        Ok(StudentDetail {
            profile,
            progress,
            analytics,
            test_attempts,
        })
    }
}
