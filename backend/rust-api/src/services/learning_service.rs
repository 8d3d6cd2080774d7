//! Test workflow: starting tests, scoring submissions and fanning the results
//! out to the profile, attempt log, analytics and learning path.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::error::LearningError;
use crate::metrics::{
    BACKGROUND_TASKS_TOTAL, PROMOTIONS_TOTAL, TESTS_SUBMITTED_TOTAL, TEST_SESSIONS_TOTAL,
};
use crate::models::progress::PathOverview;
use crate::models::{
    AnsweredQuestion, AttemptQuery, LearningPathProgress, Lesson, Level, SessionContext,
    TestAttempt, TestType, UserProfile,
};
use crate::services::analytics_aggregator::AnalyticsAggregator;
use crate::services::content_generator::ContentGenerator;
use crate::services::leveling_engine::{
    band_scores, evaluate_placement, promote, score_answers, Placement, PromotionOutcome,
    ScoredTest,
};
use crate::services::progress_tracker::{
    can_take_test, path_overview, LessonTestOutcome, ProgressTracker,
};
use crate::services::store::ProgressStore;
use crate::services::test_sessions::{TestSession, TestSessionRegistry, TestSessionView};
use crate::utils::retry::{retry_async_with_config, RetryConfig};

/// What the learner sees right after submitting. Never retracted by later
/// background failures.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    #[serde(rename = "type")]
    pub test_type: TestType,
    pub score: u32,
    pub correct_count: u32,
    pub total_questions: u32,
    pub questions: Vec<AnsweredQuestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<Placement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion: Option<PromotionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson: Option<LessonTestOutcome>,
}

impl TestResult {
    fn from_scored(test_type: TestType, scored: &ScoredTest) -> Self {
        Self {
            test_type,
            score: scored.score,
            correct_count: scored.correct_count,
            total_questions: scored.total_questions,
            questions: scored.questions.clone(),
            attempt_id: None,
            placement: None,
            promotion: None,
            lesson: None,
        }
    }
}

/// A submitted test's result plus the post-submission work still running,
/// if any. Dropping the handle detaches that work.
pub struct Submission {
    pub result: TestResult,
    pub background: Option<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct LearningService {
    store: Arc<dyn ProgressStore>,
    generator: Arc<dyn ContentGenerator>,
    sessions: TestSessionRegistry,
    subject: String,
}

impl LearningService {
    pub fn new(
        store: Arc<dyn ProgressStore>,
        generator: Arc<dyn ContentGenerator>,
        sessions: TestSessionRegistry,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            store,
            generator,
            sessions,
            subject: subject.into(),
        }
    }

    fn tracker(&self) -> ProgressTracker {
        ProgressTracker::new(self.store.clone(), self.subject.clone())
    }

    fn aggregator(&self) -> AnalyticsAggregator {
        AnalyticsAggregator::new(self.store.clone(), self.subject.clone())
    }

    pub async fn register_profile(
        &self,
        ctx: &SessionContext,
        display_name: &str,
        email: &str,
    ) -> Result<UserProfile, LearningError> {
        if self.store.get_profile(&ctx.user_id).await?.is_some() {
            return Err(LearningError::AlreadyExists(format!("Profile {}", ctx.user_id)));
        }

        let profile = UserProfile::new(ctx.user_id.clone(), ctx.role, display_name, email);
        self.store.save_profile(&profile).await?;

        tracing::info!(
            "Profile registered: user={}, role={}",
            ctx.user_id,
            ctx.role.as_str()
        );
        Ok(profile)
    }

    pub async fn profile(&self, ctx: &SessionContext) -> Result<UserProfile, LearningError> {
        self.store
            .get_profile(&ctx.user_id)
            .await?
            .ok_or_else(|| LearningError::not_found("Profile"))
    }

    pub async fn attempts(
        &self,
        ctx: &SessionContext,
        mut query: AttemptQuery,
    ) -> Result<Vec<TestAttempt>, LearningError> {
        query.user_id = Some(ctx.user_id.clone());
        self.store.list_attempts(&query).await
    }

    /// Diagnostic test until one has been completed, then a test at the
    /// profile's level (intermediate when unset).
    pub async fn start_placement_test(
        &self,
        ctx: &SessionContext,
    ) -> Result<TestSessionView, LearningError> {
        let profile = self.profile(ctx).await?;

        let (test_type, level, questions) = if !profile.diagnostic_completed {
            let questions = self.generator.generate_diagnostic_test().await?;
            (TestType::Diagnostic, None, questions)
        } else {
            let level = profile.level.unwrap_or(Level::Intermediate);
            let questions = self.generator.generate_level_based_test(level).await?;
            (TestType::Regular, Some(level), questions)
        };

        let session = self
            .sessions
            .open(ctx, test_type, level, None, questions)
            .await;
        Ok(session.view())
    }

    /// Mock test scored against the learner's current path level.
    pub async fn start_mock_test(
        &self,
        ctx: &SessionContext,
    ) -> Result<TestSessionView, LearningError> {
        let current = self
            .store
            .get_progress(&ctx.user_id)
            .await?
            .map(|progress| progress.current_level);
        let questions = self.generator.generate_mock_test().await?;

        let session = self
            .sessions
            .open(ctx, TestType::Mock, current, None, questions)
            .await;
        Ok(session.view())
    }

    pub async fn start_lesson_test(
        &self,
        ctx: &SessionContext,
        lesson_id: &str,
    ) -> Result<TestSessionView, LearningError> {
        let progress = self.tracker().path(ctx).await?;
        let index = progress
            .lesson_index(lesson_id)
            .ok_or_else(|| LearningError::not_found(format!("Lesson {}", lesson_id)))?;
        if !can_take_test(&progress.lessons, index) {
            return Err(LearningError::Locked(lesson_id.to_string()));
        }

        let lesson = &progress.lessons[index];
        let questions = self
            .generator
            .generate_lesson_test(&lesson.lesson_id, &lesson.title, progress.current_level)
            .await?;

        let session = self
            .sessions
            .open(
                ctx,
                TestType::Lesson,
                Some(progress.current_level),
                Some(lesson.lesson_id.clone()),
                questions,
            )
            .await;
        Ok(session.view())
    }

    /// Scores a test session and applies its consequences.
    ///
    /// Invalid answers are rejected before anything is written, and the
    /// session stays open so the learner can resubmit.
    pub async fn submit_test(
        &self,
        ctx: &SessionContext,
        session_id: &str,
        answers: Vec<Option<String>>,
    ) -> Result<Submission, LearningError> {
        let session = self.sessions.take(ctx, session_id).await?;
        let scored = match score_answers(session.questions.clone(), answers) {
            Ok(scored) => scored,
            Err(e) => {
                self.sessions.restore(session).await;
                return Err(e);
            }
        };

        tracing::info!(
            "Test submitted: session={}, user={}, type={}, score={}, elapsed={}s",
            session.id,
            ctx.user_id,
            session.test_type.as_str(),
            scored.score,
            (Utc::now() - session.started_at).num_seconds()
        );

        let submission = match session.test_type {
            TestType::Diagnostic => self.submit_diagnostic(ctx, &session, scored).await?,
            TestType::Regular => self.submit_regular(ctx, &session, scored).await?,
            TestType::Mock => self.submit_mock(ctx, &session, scored),
            TestType::Lesson => self.submit_lesson(ctx, &session, scored).await?,
        };

        TEST_SESSIONS_TOTAL.with_label_values(&["completed"]).inc();
        TESTS_SUBMITTED_TOTAL
            .with_label_values(&[session.test_type.as_str()])
            .inc();
        Ok(submission)
    }

    fn attempt(
        &self,
        ctx: &SessionContext,
        session: &TestSession,
        level: Option<Level>,
        scored: &ScoredTest,
    ) -> TestAttempt {
        TestAttempt {
            id: None,
            user_id: ctx.user_id.clone(),
            subject: self.subject.clone(),
            level,
            test_type: session.test_type,
            lesson_id: session.lesson_id.clone(),
            questions: scored.questions.clone(),
            score: scored.score,
            correct_count: scored.correct_count,
            total_questions: scored.total_questions,
            easy_score: None,
            medium_score: None,
            advanced_score: None,
            promoted_to: None,
            timestamp: Utc::now(),
        }
    }

    async fn submit_diagnostic(
        &self,
        ctx: &SessionContext,
        session: &TestSession,
        scored: ScoredTest,
    ) -> Result<Submission, LearningError> {
        let placement =
            evaluate_placement(self.generator.as_ref(), &scored.questions, scored.score).await;
        let level = Level::from(placement.level);

        let mut profile = self.profile(ctx).await?;
        profile.level = Some(level);
        profile.diagnostic_completed = true;
        profile.weak_areas = placement.weak_areas.clone();
        self.store.save_profile(&profile).await?;

        let attempt_id = self
            .store
            .append_attempt(&self.attempt(ctx, session, Some(level), &scored))
            .await?;

        tracing::info!(
            "Diagnostic placement for user {}: level={}, weak_areas={:?}",
            ctx.user_id,
            level,
            placement.weak_areas
        );

        let mut result = TestResult::from_scored(TestType::Diagnostic, &scored);
        result.attempt_id = Some(attempt_id);
        result.placement = Some(placement);
        Ok(Submission {
            result,
            background: None,
        })
    }

    async fn submit_regular(
        &self,
        ctx: &SessionContext,
        session: &TestSession,
        scored: ScoredTest,
    ) -> Result<Submission, LearningError> {
        let attempt_id = self
            .store
            .append_attempt(&self.attempt(ctx, session, session.level, &scored))
            .await?;

        let mut result = TestResult::from_scored(TestType::Regular, &scored);
        result.attempt_id = Some(attempt_id);
        Ok(Submission {
            result,
            background: None,
        })
    }

    /// The promotion decision is returned at once; persisting it runs in the
    /// background and only ever logs its failures.
    fn submit_mock(
        &self,
        ctx: &SessionContext,
        session: &TestSession,
        scored: ScoredTest,
    ) -> Submission {
        let scores = band_scores(&scored.questions);
        let outcome = promote(session.level, scores);

        let mut attempt = self.attempt(ctx, session, Some(outcome.promoted_level), &scored);
        attempt.easy_score = Some(outcome.easy_score);
        attempt.medium_score = Some(outcome.medium_score);
        attempt.advanced_score = Some(outcome.advanced_score);
        attempt.promoted_to = Some(outcome.promoted_level);

        if outcome.promoted() {
            PROMOTIONS_TOTAL
                .with_label_values(&[outcome.promoted_level.as_str()])
                .inc();
        }
        tracing::info!(
            "Mock result for user {}: easy={}, medium={}, advanced={}, {:?} -> {}",
            ctx.user_id,
            outcome.easy_score,
            outcome.medium_score,
            outcome.advanced_score,
            outcome.previous_level,
            outcome.promoted_level
        );

        let service = self.clone();
        let ctx = ctx.clone();
        let background = tokio::spawn(
            async move {
                service.persist_mock_result(ctx, attempt, outcome).await;
            }
            .in_current_span(),
        );

        let mut result = TestResult::from_scored(TestType::Mock, &scored);
        result.promotion = Some(outcome);
        Submission {
            result,
            background: Some(background),
        }
    }

    async fn persist_mock_result(
        &self,
        ctx: SessionContext,
        attempt: TestAttempt,
        outcome: PromotionOutcome,
    ) {
        let user_id = ctx.user_id.as_str();
        let (attempt_saved, analytics_saved, path_saved, profile_saved) = futures::join!(
            run_background(user_id, "save_attempt", || async {
                self.store.append_attempt(&attempt).await.map(|_| ())
            }),
            run_background(user_id, "update_analytics", || async {
                self.aggregator()
                    .record_mock_result(&ctx, &outcome)
                    .await
                    .map(|_| ())
            }),
            run_background(user_id, "update_learning_path", || async {
                self.refresh_path_after_mock(&ctx, &outcome).await
            }),
            run_background(user_id, "update_profile_level", || async {
                self.update_profile_level(&ctx, &outcome).await
            }),
        );

        if attempt_saved && analytics_saved && path_saved && profile_saved {
            tracing::info!("Mock test follow-up completed for user {}", user_id);
        }
    }

    /// First mock test creates the path; a promotion replaces it. Otherwise
    /// the learner keeps the lessons already in progress.
    async fn refresh_path_after_mock(
        &self,
        ctx: &SessionContext,
        outcome: &PromotionOutcome,
    ) -> Result<(), LearningError> {
        let existing = self.store.get_progress(&ctx.user_id).await?;
        let needs_path = match &existing {
            None => true,
            Some(progress) => {
                progress.subject != self.subject
                    || progress.current_level != outcome.promoted_level
            }
        };
        if !needs_path {
            return Ok(());
        }

        let weak_areas = self.weak_areas(ctx).await?;
        let generated = self
            .generator
            .generate_learning_path(outcome.promoted_level, &weak_areas)
            .await?;
        self.write_path(ctx, existing.as_ref(), outcome.promoted_level, generated.lessons)
            .await
            .map(|_| ())
    }

    async fn update_profile_level(
        &self,
        ctx: &SessionContext,
        outcome: &PromotionOutcome,
    ) -> Result<(), LearningError> {
        if !outcome.promoted() {
            return Ok(());
        }
        let mut profile = self.profile(ctx).await?;
        profile.level = Some(outcome.promoted_level);
        self.store.save_profile(&profile).await
    }

    /// The lesson result is recorded before returning; the attempt log entry
    /// is written in the background.
    async fn submit_lesson(
        &self,
        ctx: &SessionContext,
        session: &TestSession,
        scored: ScoredTest,
    ) -> Result<Submission, LearningError> {
        let lesson_id = session
            .lesson_id
            .as_deref()
            .ok_or_else(|| LearningError::validation("lesson test without a lesson"))?;
        let outcome = self
            .tracker()
            .record_lesson_test_result(ctx, lesson_id, scored.score)
            .await?;

        let attempt = self.attempt(ctx, session, session.level, &scored);
        let store = self.store.clone();
        let user_id = ctx.user_id.clone();
        let background = tokio::spawn(
            async move {
                run_background(&user_id, "save_attempt", || async {
                    store.append_attempt(&attempt).await.map(|_| ())
                })
                .await;
            }
            .in_current_span(),
        );

        let mut result = TestResult::from_scored(TestType::Lesson, &scored);
        result.lesson = Some(outcome);
        Ok(Submission {
            result,
            background: Some(background),
        })
    }

    /// Regenerates the learning path on request, using the profile's weak
    /// areas. The level is the path's, else the profile's, else easy.
    pub async fn generate_path(&self, ctx: &SessionContext) -> Result<PathOverview, LearningError> {
        let profile = self.profile(ctx).await?;
        let existing = self.store.get_progress(&ctx.user_id).await?;
        let level = existing
            .as_ref()
            .map(|progress| progress.current_level)
            .or(profile.level)
            .unwrap_or(Level::Easy);

        let generated = self
            .generator
            .generate_learning_path(level, &profile.weak_areas)
            .await?;
        let progress = self
            .write_path(ctx, existing.as_ref(), level, generated.lessons)
            .await?;
        Ok(path_overview(&progress))
    }

    async fn write_path(
        &self,
        ctx: &SessionContext,
        existing: Option<&LearningPathProgress>,
        level: Level,
        lessons: Vec<Lesson>,
    ) -> Result<LearningPathProgress, LearningError> {
        let tracker = self.tracker();
        match existing {
            Some(_) => tracker.replace_path(ctx, level, lessons).await,
            None => tracker.initialize_path(ctx, level, lessons).await,
        }
    }

    async fn weak_areas(&self, ctx: &SessionContext) -> Result<Vec<String>, LearningError> {
        Ok(self
            .store
            .get_profile(&ctx.user_id)
            .await?
            .map(|profile| profile.weak_areas)
            .unwrap_or_default())
    }
}

/// Runs one post-submission step with retries. Failure is logged and counted,
/// never returned.
async fn run_background<F, Fut>(user_id: &str, operation: &'static str, f: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), LearningError>>,
{
    match retry_async_with_config(RetryConfig::background(), operation, f).await {
        Ok(()) => {
            BACKGROUND_TASKS_TOTAL
                .with_label_values(&[operation, "success"])
                .inc();
            true
        }
        Err(e) => {
            BACKGROUND_TASKS_TOTAL
                .with_label_values(&[operation, "error"])
                .inc();
            tracing::error!(
                "Background {} failed for user {}: {}",
                operation,
                user_id,
                e
            );
            false
        }
    }
}
