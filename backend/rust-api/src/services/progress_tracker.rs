//! Lesson completion, sequential unlocking and path progress.
//!
//! Unlock state is never stored: it is recomputed from lesson order on every
//! read, so a locked lesson stays locked whatever its `contentViewed` flag says.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::error::LearningError;
use crate::metrics::LESSON_COMPLETIONS_TOTAL;
use crate::models::progress::{LessonStatus, PathOverview};
use crate::models::{LearningPathProgress, Lesson, Level, SessionContext};
use crate::services::leveling_engine::percentage;
use crate::services::store::ProgressStore;

/// Minimum lesson test score that passes and completes a lesson.
pub const LESSON_PASS_THRESHOLD: u32 = 80;

/// `round(100 × completed / total)`; 0 for an empty path.
pub fn progress_percentage(lessons: &[Lesson]) -> u32 {
    let completed = lessons.iter().filter(|lesson| lesson.completed).count() as u32;
    percentage(completed, lessons.len() as u32)
}

/// The first lesson is always open; any other lesson opens once its
/// predecessor is completed.
pub fn is_accessible(lessons: &[Lesson], index: usize) -> bool {
    match index {
        0 => !lessons.is_empty(),
        i if i < lessons.len() => lessons[i - 1].completed,
        _ => false,
    }
}

pub fn can_take_test(lessons: &[Lesson], index: usize) -> bool {
    is_accessible(lessons, index) && lessons[index].content_viewed
}

/// True when the path has lessons and all of them are completed.
pub fn is_level_complete(lessons: &[Lesson]) -> bool {
    !lessons.is_empty() && lessons.iter().all(|lesson| lesson.completed)
}

fn lesson_status(lessons: &[Lesson], index: usize) -> LessonStatus {
    let lesson = &lessons[index];
    LessonStatus {
        lesson_id: lesson.lesson_id.clone(),
        title: lesson.title.clone(),
        description: lesson.description.clone(),
        completed: lesson.completed,
        content_viewed: lesson.content_viewed,
        test_passed: lesson.test_passed,
        test_score: lesson.test_score,
        accessible: is_accessible(lessons, index),
        test_available: can_take_test(lessons, index),
    }
}

pub fn path_overview(progress: &LearningPathProgress) -> PathOverview {
    PathOverview {
        subject: progress.subject.clone(),
        current_level: progress.current_level,
        progress_percentage: progress.progress_percentage,
        level_complete: is_level_complete(&progress.lessons),
        lessons: (0..progress.lessons.len())
            .map(|index| lesson_status(&progress.lessons, index))
            .collect(),
    }
}

fn reset_lesson(lesson: Lesson) -> Lesson {
    Lesson {
        completed: false,
        content_viewed: false,
        test_passed: false,
        test_score: None,
        ..lesson
    }
}

/// Lesson body as shown to the learner. `content` is only present while the
/// lesson is accessible.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonView {
    #[serde(flatten)]
    pub status: LessonStatus,
    pub content: Option<String>,
    pub topics: Vec<String>,
    pub estimated_duration: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonTestOutcome {
    pub lesson: LessonStatus,
    pub progress_percentage: u32,
    pub level_complete: bool,
}

pub struct ProgressTracker {
    store: Arc<dyn ProgressStore>,
    subject: String,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn ProgressStore>, subject: impl Into<String>) -> Self {
        Self {
            store,
            subject: subject.into(),
        }
    }

    pub async fn path(&self, ctx: &SessionContext) -> Result<LearningPathProgress, LearningError> {
        self.store
            .get_progress(&ctx.user_id)
            .await?
            .ok_or_else(|| LearningError::not_found("Learning path"))
    }

    pub async fn overview(&self, ctx: &SessionContext) -> Result<PathOverview, LearningError> {
        Ok(path_overview(&self.path(ctx).await?))
    }

    /// Creates the first path for the configured subject.
    pub async fn initialize_path(
        &self,
        ctx: &SessionContext,
        level: Level,
        lessons: Vec<Lesson>,
    ) -> Result<LearningPathProgress, LearningError> {
        if let Some(existing) = self.store.get_progress(&ctx.user_id).await? {
            if existing.subject == self.subject {
                return Err(LearningError::AlreadyExists(format!(
                    "Learning path for {}",
                    self.subject
                )));
            }
        }
        self.write_fresh_path(ctx, level, lessons).await
    }

    /// Full replace on promotion or regeneration: new lessons, all flags
    /// reset, progress back to 0.
    pub async fn replace_path(
        &self,
        ctx: &SessionContext,
        level: Level,
        lessons: Vec<Lesson>,
    ) -> Result<LearningPathProgress, LearningError> {
        self.write_fresh_path(ctx, level, lessons).await
    }

    async fn write_fresh_path(
        &self,
        ctx: &SessionContext,
        level: Level,
        lessons: Vec<Lesson>,
    ) -> Result<LearningPathProgress, LearningError> {
        if lessons.is_empty() {
            return Err(LearningError::validation("learning path has no lessons"));
        }
        let progress = LearningPathProgress {
            user_id: ctx.user_id.clone(),
            subject: self.subject.clone(),
            current_level: level,
            lessons: lessons.into_iter().map(reset_lesson).collect(),
            progress_percentage: 0,
            last_updated: Utc::now(),
        };
        self.store.save_progress(&progress).await?;

        tracing::info!(
            "Learning path written for user {}: level={}, lessons={}",
            ctx.user_id,
            level,
            progress.lessons.len()
        );
        Ok(progress)
    }

    /// Looks a lesson up and rejects it when locked.
    fn accessible_index(
        progress: &LearningPathProgress,
        lesson_id: &str,
    ) -> Result<usize, LearningError> {
        let index = progress
            .lesson_index(lesson_id)
            .ok_or_else(|| LearningError::not_found(format!("Lesson {}", lesson_id)))?;
        if !is_accessible(&progress.lessons, index) {
            return Err(LearningError::Locked(lesson_id.to_string()));
        }
        Ok(index)
    }

    pub async fn lesson_view(
        &self,
        ctx: &SessionContext,
        lesson_id: &str,
    ) -> Result<LessonView, LearningError> {
        let progress = self.path(ctx).await?;
        let index = progress
            .lesson_index(lesson_id)
            .ok_or_else(|| LearningError::not_found(format!("Lesson {}", lesson_id)))?;
        let status = lesson_status(&progress.lessons, index);
        let lesson = &progress.lessons[index];

        Ok(LessonView {
            content: status.accessible.then(|| lesson.content.clone()),
            topics: lesson.topics.clone(),
            estimated_duration: lesson.estimated_duration.clone(),
            status,
        })
    }

    pub async fn mark_content_viewed(
        &self,
        ctx: &SessionContext,
        lesson_id: &str,
    ) -> Result<LessonStatus, LearningError> {
        let mut progress = self.path(ctx).await?;
        let index = Self::accessible_index(&progress, lesson_id)?;

        if !progress.lessons[index].content_viewed {
            progress.lessons[index].content_viewed = true;
            progress.last_updated = Utc::now();
            self.store.save_progress(&progress).await?;
            tracing::debug!("User {} viewed lesson {}", ctx.user_id, lesson_id);
        }

        Ok(lesson_status(&progress.lessons, index))
    }

    /// Stores a lesson test score. Passing completes the lesson; failing
    /// never un-completes it.
    pub async fn record_lesson_test_result(
        &self,
        ctx: &SessionContext,
        lesson_id: &str,
        score: u32,
    ) -> Result<LessonTestOutcome, LearningError> {
        if score > 100 {
            return Err(LearningError::validation(format!(
                "score must be between 0 and 100, got {}",
                score
            )));
        }

        let mut progress = self.path(ctx).await?;
        let index = Self::accessible_index(&progress, lesson_id)?;

        let passed = score >= LESSON_PASS_THRESHOLD;
        let lesson = &mut progress.lessons[index];
        let newly_completed = passed && !lesson.completed;
        lesson.test_score = Some(score);
        lesson.test_passed = passed;
        if passed {
            lesson.completed = true;
        }

        progress.progress_percentage = progress_percentage(&progress.lessons);
        progress.last_updated = Utc::now();
        self.store.save_progress(&progress).await?;

        if newly_completed {
            LESSON_COMPLETIONS_TOTAL.inc();
        }
        tracing::info!(
            "Lesson {} test recorded for user {}: score={}, passed={}, progress={}%",
            lesson_id,
            ctx.user_id,
            score,
            passed,
            progress.progress_percentage
        );

        Ok(LessonTestOutcome {
            lesson: lesson_status(&progress.lessons, index),
            progress_percentage: progress.progress_percentage,
            level_complete: is_level_complete(&progress.lessons),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use crate::services::store::MemoryStore;

    fn lesson(id: &str, completed: bool) -> Lesson {
        Lesson {
            lesson_id: id.to_string(),
            title: format!("Lesson {}", id),
            description: "desc".into(),
            content: format!("content of {}", id),
            difficulty: None,
            topics: vec![],
            estimated_duration: None,
            completed,
            content_viewed: false,
            test_passed: completed,
            test_score: None,
        }
    }

    fn lessons(completed: usize, total: usize) -> Vec<Lesson> {
        (0..total)
            .map(|i| lesson(&format!("l{}", i), i < completed))
            .collect()
    }

    fn ctx() -> SessionContext {
        SessionContext::new("student-1", UserRole::Student)
    }

    async fn tracker_with_path(count: usize) -> ProgressTracker {
        let tracker = ProgressTracker::new(Arc::new(MemoryStore::new()), "Python");
        tracker
            .initialize_path(&ctx(), Level::Easy, lessons(0, count))
            .await
            .unwrap();
        tracker
    }

    #[test]
    fn percentage_rounds_and_is_idempotent() {
        let path = lessons(3, 8);
        assert_eq!(progress_percentage(&path), 38);
        assert_eq!(progress_percentage(&path), progress_percentage(&path));
        assert_eq!(progress_percentage(&[]), 0);
        assert_eq!(progress_percentage(&lessons(8, 8)), 100);
    }

    #[test]
    fn unlock_follows_predecessor_completion() {
        let mut path = lessons(0, 2);
        assert!(is_accessible(&path, 0));
        assert!(!is_accessible(&path, 1));

        path[0].completed = true;
        assert!(is_accessible(&path, 1));
        assert!(!is_accessible(&path, 2));
    }

    #[test]
    fn viewing_a_locked_lesson_does_not_unlock_its_test() {
        let mut path = lessons(0, 2);
        path[1].content_viewed = true;
        assert!(!can_take_test(&path, 1));

        path[0].content_viewed = true;
        assert!(can_take_test(&path, 0));
    }

    #[test]
    fn level_complete_requires_every_lesson() {
        assert!(!is_level_complete(&lessons(5, 6)));
        assert!(is_level_complete(&lessons(6, 6)));
        assert!(!is_level_complete(&[]));
    }

    #[tokio::test]
    async fn second_initialize_for_same_subject_conflicts() {
        let tracker = tracker_with_path(6).await;
        let err = tracker
            .initialize_path(&ctx(), Level::Medium, lessons(0, 6))
            .await
            .unwrap_err();
        assert!(matches!(err, LearningError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn replace_resets_flags_and_progress() {
        let tracker = tracker_with_path(6).await;
        let replaced = tracker
            .replace_path(&ctx(), Level::Medium, lessons(4, 6))
            .await
            .unwrap();

        assert_eq!(replaced.current_level, Level::Medium);
        assert_eq!(replaced.progress_percentage, 0);
        assert!(replaced.lessons.iter().all(|l| !l.completed && !l.test_passed));
    }

    #[tokio::test]
    async fn threshold_is_eighty() {
        let tracker = tracker_with_path(6).await;
        tracker.mark_content_viewed(&ctx(), "l0").await.unwrap();

        let failed = tracker
            .record_lesson_test_result(&ctx(), "l0", 79)
            .await
            .unwrap();
        assert!(!failed.lesson.test_passed);
        assert!(!failed.lesson.completed);
        assert_eq!(failed.progress_percentage, 0);

        let passed = tracker
            .record_lesson_test_result(&ctx(), "l0", 80)
            .await
            .unwrap();
        assert!(passed.lesson.test_passed);
        assert!(passed.lesson.completed);
        assert_eq!(passed.progress_percentage, 17);
    }

    #[tokio::test]
    async fn failing_retake_keeps_completion() {
        let tracker = tracker_with_path(6).await;
        tracker.record_lesson_test_result(&ctx(), "l0", 95).await.unwrap();

        let retake = tracker
            .record_lesson_test_result(&ctx(), "l0", 20)
            .await
            .unwrap();
        assert!(retake.lesson.completed);
        assert!(!retake.lesson.test_passed);
        assert_eq!(retake.lesson.test_score, Some(20));
    }

    #[tokio::test]
    async fn locked_lesson_is_unreachable() {
        let tracker = tracker_with_path(6).await;

        let err = tracker.mark_content_viewed(&ctx(), "l1").await.unwrap_err();
        assert!(matches!(err, LearningError::Locked(_)));
        let err = tracker
            .record_lesson_test_result(&ctx(), "l1", 100)
            .await
            .unwrap_err();
        assert!(matches!(err, LearningError::Locked(_)));

        let view = tracker.lesson_view(&ctx(), "l1").await.unwrap();
        assert!(!view.status.accessible);
        assert!(view.content.is_none());
    }

    #[tokio::test]
    async fn completing_a_lesson_unlocks_the_next() {
        let tracker = tracker_with_path(6).await;
        tracker.record_lesson_test_result(&ctx(), "l0", 100).await.unwrap();

        let view = tracker.lesson_view(&ctx(), "l1").await.unwrap();
        assert!(view.status.accessible);
        assert_eq!(view.content.as_deref(), Some("content of l1"));
    }

    #[tokio::test]
    async fn unknown_lesson_and_missing_path_are_not_found() {
        let tracker = tracker_with_path(6).await;
        let err = tracker.mark_content_viewed(&ctx(), "nope").await.unwrap_err();
        assert!(matches!(err, LearningError::NotFound(_)));

        let other = SessionContext::new("student-2", UserRole::Student);
        let err = tracker.overview(&other).await.unwrap_err();
        assert!(matches!(err, LearningError::NotFound(_)));
    }

    #[tokio::test]
    async fn out_of_range_score_is_rejected() {
        let tracker = tracker_with_path(6).await;
        let err = tracker
            .record_lesson_test_result(&ctx(), "l0", 101)
            .await
            .unwrap_err();
        assert!(matches!(err, LearningError::Validation(_)));
    }
}
