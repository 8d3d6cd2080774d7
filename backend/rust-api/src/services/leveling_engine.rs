//! Turns a scored test into a level decision.
//!
//! Everything here is free of persistence; callers decide what to store.

use serde::Serialize;

use crate::error::LearningError;
use crate::models::analytics::BandScores;
use crate::models::generated::MAX_WEAK_AREAS;
use crate::models::{AnsweredQuestion, Band, Level, PlacementLevel, TestQuestion};
use crate::services::content_generator::ContentGenerator;

/// Correct answers needed in a band to be promoted past it.
pub const PERFECT_BAND_SCORE: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredTest {
    pub questions: Vec<AnsweredQuestion>,
    pub correct_count: u32,
    pub total_questions: u32,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub level: PlacementLevel,
    pub weak_areas: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionOutcome {
    pub promoted_level: Level,
    pub previous_level: Option<Level>,
    pub easy_score: u32,
    pub medium_score: u32,
    pub advanced_score: u32,
}

impl PromotionOutcome {
    pub fn promoted(&self) -> bool {
        self.previous_level != Some(self.promoted_level)
    }
}

/// Checks the submitted answers against the offered options and scores them.
///
/// Every question must be answered with one of its own options; anything else
/// is rejected before any network call is made.
pub fn score_answers(
    questions: Vec<TestQuestion>,
    answers: Vec<Option<String>>,
) -> Result<ScoredTest, LearningError> {
    if questions.is_empty() {
        return Err(LearningError::validation("test has no questions"));
    }
    if answers.len() != questions.len() {
        return Err(LearningError::validation(format!(
            "expected {} answers, got {}",
            questions.len(),
            answers.len()
        )));
    }
    for (index, (question, answer)) in questions.iter().zip(&answers).enumerate() {
        match answer {
            None => {
                return Err(LearningError::validation(format!(
                    "question {} is unanswered",
                    index + 1
                )))
            }
            Some(answer) if !question.offers(answer) => {
                return Err(LearningError::validation(format!(
                    "answer to question {} is not one of its options",
                    index + 1
                )))
            }
            Some(_) => {}
        }
    }

    let questions: Vec<AnsweredQuestion> = questions
        .into_iter()
        .zip(answers)
        .map(|(question, answer)| question.answer(answer))
        .collect();

    let correct_count = questions.iter().filter(|q| q.is_correct).count() as u32;
    let total_questions = questions.len() as u32;

    Ok(ScoredTest {
        score: percentage(correct_count, total_questions),
        questions,
        correct_count,
        total_questions,
    })
}

/// `round(100 × part / whole)`, 0 for an empty whole.
pub fn percentage(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    (f64::from(part) * 100.0 / f64::from(whole)).round() as u32
}

/// Fixed score bands: [0,40] beginner, [41,70] intermediate, [71,100] advanced.
pub fn classify_score(score: u32) -> PlacementLevel {
    match score {
        0..=40 => PlacementLevel::Beginner,
        41..=70 => PlacementLevel::Intermediate,
        _ => PlacementLevel::Advanced,
    }
}

/// Places a learner after a diagnostic test.
///
/// The level always comes from the score bands. Weak areas come from the
/// generator's judgement of the wrong answers; if that call fails the list
/// is empty rather than failing the placement.
pub async fn evaluate_placement(
    generator: &dyn ContentGenerator,
    questions: &[AnsweredQuestion],
    score: u32,
) -> Placement {
    let level = classify_score(score);

    let wrong: Vec<AnsweredQuestion> = questions
        .iter()
        .filter(|q| !q.is_correct)
        .cloned()
        .collect();
    let weak_areas = if wrong.is_empty() {
        Vec::new()
    } else {
        match generator.evaluate_student_level(&wrong, score).await {
            Ok(evaluation) => {
                if Level::from(evaluation.level) != Level::from(level) {
                    tracing::debug!(
                        "Generator suggested {:?} for score {}, keeping {:?}: {}",
                        evaluation.level,
                        score,
                        level,
                        evaluation.reasoning
                    );
                }
                evaluation.weak_areas.into_iter().take(MAX_WEAK_AREAS).collect()
            }
            Err(e) => {
                tracing::warn!("Weak-area evaluation unavailable: {}", e);
                Vec::new()
            }
        }
    };

    Placement { level, weak_areas }
}

/// Correct answers per band. Questions without a band are ignored.
pub fn band_scores(questions: &[AnsweredQuestion]) -> BandScores {
    let count = |band: Band| {
        questions
            .iter()
            .filter(|q| q.level == Some(band) && q.is_correct)
            .count() as u32
    };
    BandScores::new(count(Band::Easy), count(Band::Medium), count(Band::Advanced))
}

/// Promotion ladder for mock tests, evaluated as ordered checks where a later
/// check overrides an earlier one:
///
/// 1. default to the current level, or `easy` when unset
/// 2. perfect easy band → `medium`
/// 3. perfect medium band → `advanced`
/// 4. already `advanced` → stays `advanced`
///
/// The result is never below the current ladder position, so one attempt can
/// cascade easy → advanced but nothing ever demotes.
pub fn promote(current: Option<Level>, scores: BandScores) -> PromotionOutcome {
    let mut promoted = current.unwrap_or(Level::Easy);

    if scores.easy_score == PERFECT_BAND_SCORE {
        promoted = Level::Medium;
    }
    if scores.medium_score == PERFECT_BAND_SCORE {
        promoted = Level::Advanced;
    }
    if current == Some(Level::Advanced) && scores.advanced_score < PERFECT_BAND_SCORE {
        promoted = Level::Advanced;
    }

    if let (Some(current_band), Some(promoted_band)) =
        (current.and_then(|level| level.band()), promoted.band())
    {
        if promoted_band.rank() < current_band.rank() {
            promoted = Level::from(current_band);
        }
    }

    PromotionOutcome {
        promoted_level: promoted,
        previous_level: current,
        easy_score: scores.easy_score,
        medium_score: scores.medium_score,
        advanced_score: scores.advanced_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::generated::{GeneratedLearningPath, LevelEvaluation};
    use crate::services::content_generator::GeneratorResult;
    use async_trait::async_trait;

    fn question(correct: &str, band: Option<Band>) -> TestQuestion {
        TestQuestion {
            question: format!("pick {}", correct),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_answer: correct.to_string(),
            level: band,
        }
    }

    fn answered(band: Band, is_correct: bool) -> AnsweredQuestion {
        question("a", Some(band)).answer(Some(if is_correct { "a" } else { "b" }.to_string()))
    }

    #[test]
    fn classification_boundaries() {
        assert_eq!(classify_score(0), PlacementLevel::Beginner);
        assert_eq!(classify_score(40), PlacementLevel::Beginner);
        assert_eq!(classify_score(41), PlacementLevel::Intermediate);
        assert_eq!(classify_score(70), PlacementLevel::Intermediate);
        assert_eq!(classify_score(71), PlacementLevel::Advanced);
        assert_eq!(classify_score(100), PlacementLevel::Advanced);
    }

    #[test]
    fn scoring_rounds_percentage() {
        let questions = vec![question("a", None), question("b", None), question("c", None)];
        let answers = vec![Some("a".into()), Some("b".into()), Some("a".into())];
        let scored = score_answers(questions, answers).unwrap();
        assert_eq!(scored.correct_count, 2);
        assert_eq!(scored.total_questions, 3);
        assert_eq!(scored.score, 67);
        assert!(!scored.questions[2].is_correct);
        assert_eq!(scored.questions[2].student_answer.as_deref(), Some("a"));
    }

    #[test]
    fn scoring_rejects_unanswered_and_foreign_answers() {
        let unanswered = score_answers(vec![question("a", None)], vec![None]).unwrap_err();
        assert!(matches!(unanswered, LearningError::Validation(_)));

        let foreign =
            score_answers(vec![question("a", None)], vec![Some("z".into())]).unwrap_err();
        assert!(matches!(foreign, LearningError::Validation(_)));

        let short = score_answers(vec![question("a", None)], vec![]).unwrap_err();
        assert!(matches!(short, LearningError::Validation(_)));
    }

    #[test]
    fn band_scores_count_correct_per_band() {
        let mut questions = Vec::new();
        questions.extend((0..5).map(|i| answered(Band::Easy, i < 4)));
        questions.extend((0..5).map(|i| answered(Band::Medium, i < 2)));
        questions.extend((0..5).map(|_| answered(Band::Advanced, true)));
        assert_eq!(band_scores(&questions), BandScores::new(4, 2, 5));
    }

    #[test]
    fn perfect_easy_and_medium_cascade_to_advanced() {
        let outcome = promote(None, BandScores::new(5, 5, 0));
        assert_eq!(outcome.promoted_level, Level::Advanced);
        assert_eq!(outcome.previous_level, None);
        assert!(outcome.promoted());
    }

    #[test]
    fn near_miss_does_not_promote() {
        let outcome = promote(None, BandScores::new(4, 0, 0));
        assert_eq!(outcome.promoted_level, Level::Easy);
    }

    #[test]
    fn perfect_easy_promotes_to_medium() {
        let outcome = promote(Some(Level::Easy), BandScores::new(5, 3, 0));
        assert_eq!(outcome.promoted_level, Level::Medium);
    }

    #[test]
    fn advanced_never_demotes() {
        assert_eq!(
            promote(Some(Level::Advanced), BandScores::new(0, 0, 0)).promoted_level,
            Level::Advanced
        );
        assert_eq!(
            promote(Some(Level::Advanced), BandScores::new(5, 0, 5)).promoted_level,
            Level::Advanced
        );
        let stay = promote(Some(Level::Advanced), BandScores::new(1, 1, 1));
        assert!(!stay.promoted());
    }

    #[test]
    fn medium_is_not_pulled_back_by_later_checks() {
        let outcome = promote(Some(Level::Medium), BandScores::new(2, 1, 0));
        assert_eq!(outcome.promoted_level, Level::Medium);
    }

    #[test]
    fn placement_levels_keep_their_value_without_promotion() {
        let outcome = promote(Some(Level::Beginner), BandScores::new(3, 3, 3));
        assert_eq!(outcome.promoted_level, Level::Beginner);
        let promoted = promote(Some(Level::Beginner), BandScores::new(5, 0, 0));
        assert_eq!(promoted.promoted_level, Level::Medium);
    }

    struct WeakAreaGenerator {
        fail: bool,
    }

    #[async_trait]
    impl ContentGenerator for WeakAreaGenerator {
        async fn generate_diagnostic_test(&self) -> GeneratorResult<Vec<TestQuestion>> {
            unimplemented!()
        }
        async fn generate_level_based_test(
            &self,
            _level: Level,
        ) -> GeneratorResult<Vec<TestQuestion>> {
            unimplemented!()
        }
        async fn generate_mock_test(&self) -> GeneratorResult<Vec<TestQuestion>> {
            unimplemented!()
        }
        async fn generate_learning_path(
            &self,
            _level: Level,
            _weak_areas: &[String],
        ) -> GeneratorResult<GeneratedLearningPath> {
            unimplemented!()
        }
        async fn generate_lesson_test(
            &self,
            _lesson_id: &str,
            _title: &str,
            _level: Level,
        ) -> GeneratorResult<Vec<TestQuestion>> {
            unimplemented!()
        }
        async fn evaluate_student_level(
            &self,
            _questions: &[AnsweredQuestion],
            _score: u32,
        ) -> GeneratorResult<LevelEvaluation> {
            if self.fail {
                return Err(LearningError::generation("service unavailable"));
            }
            Ok(LevelEvaluation {
                level: PlacementLevel::Advanced,
                reasoning: "strong".into(),
                weak_areas: vec!["loops".into(), "recursion".into()],
            })
        }
    }

    #[tokio::test]
    async fn placement_uses_bands_and_forwards_weak_areas() {
        let questions = vec![answered(Band::Easy, false), answered(Band::Easy, true)];
        let placement =
            evaluate_placement(&WeakAreaGenerator { fail: false }, &questions, 35).await;
        assert_eq!(placement.level, PlacementLevel::Beginner);
        assert_eq!(placement.weak_areas, vec!["loops", "recursion"]);
    }

    #[tokio::test]
    async fn placement_survives_generator_failure() {
        let questions = vec![answered(Band::Easy, false)];
        let placement = evaluate_placement(&WeakAreaGenerator { fail: true }, &questions, 55).await;
        assert_eq!(placement.level, PlacementLevel::Intermediate);
        assert!(placement.weak_areas.is_empty());
    }
}
