//! Payload shapes returned by the content generator and their boundary
//! validation. Raw structs accept anything the model might emit; only the
//! validated forms are turned into domain entities.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{Band, Lesson, PlacementLevel, TestQuestion, TestType};
use crate::error::LearningError;

pub const OPTIONS_PER_QUESTION: usize = 4;
pub const QUESTIONS_PER_MOCK_BAND: usize = 5;
pub const MIN_PATH_LESSONS: usize = 6;
pub const MAX_PATH_LESSONS: usize = 8;
pub const MAX_WEAK_AREAS: usize = 3;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestion {
    question: Option<String>,
    options: Option<Vec<String>>,
    correct_answer: Option<String>,
    level: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawQuestionSet {
    questions: Option<Vec<RawQuestion>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLesson {
    lesson_id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    content: Option<String>,
    difficulty: Option<String>,
    topics: Option<Vec<String>>,
    estimated_duration: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawLearningPath {
    subject: Option<String>,
    lessons: Option<Vec<RawLesson>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvaluation {
    level: Option<String>,
    reasoning: Option<String>,
    weak_areas: Option<Vec<String>>,
}

/// A learning path that passed validation, before it is attached to a user.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GeneratedLearningPath {
    pub subject: String,
    pub lessons: Vec<Lesson>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LevelEvaluation {
    pub level: PlacementLevel,
    pub reasoning: String,
    pub weak_areas: Vec<String>,
}

fn generation(message: impl Into<String>) -> LearningError {
    LearningError::Generation(message.into())
}

fn required(value: Option<String>, field: &str, position: usize) -> Result<String, LearningError> {
    match value {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(generation(format!("item {} is missing `{}`", position + 1, field))),
    }
}

/// Validates a question set for the given test kind.
///
/// Mock tests must carry exactly five questions per band; every other kind
/// ignores the `level` field.
pub fn validate_question_set(
    payload: serde_json::Value,
    test_type: TestType,
) -> Result<Vec<TestQuestion>, LearningError> {
    let raw: RawQuestionSet = serde_json::from_value(payload)
        .map_err(|e| generation(format!("unparsable question set: {}", e)))?;
    let raw_questions = raw
        .questions
        .ok_or_else(|| generation("question set has no `questions` array"))?;

    let expected = test_type.expected_questions();
    if raw_questions.len() != expected {
        return Err(generation(format!(
            "expected {} questions for a {} test, got {}",
            expected,
            test_type.as_str(),
            raw_questions.len()
        )));
    }

    let mut questions = Vec::with_capacity(raw_questions.len());
    for (position, raw) in raw_questions.into_iter().enumerate() {
        let question = required(raw.question, "question", position)?;
        let options = raw
            .options
            .ok_or_else(|| generation(format!("item {} is missing `options`", position + 1)))?;
        if options.len() != OPTIONS_PER_QUESTION {
            return Err(generation(format!(
                "item {} has {} options, expected {}",
                position + 1,
                options.len(),
                OPTIONS_PER_QUESTION
            )));
        }
        if options.iter().any(|option| option.trim().is_empty()) {
            return Err(generation(format!("item {} has an empty option", position + 1)));
        }
        let correct_answer = required(raw.correct_answer, "correctAnswer", position)?;
        if !options.contains(&correct_answer) {
            return Err(generation(format!(
                "item {} correctAnswer is not one of its options",
                position + 1
            )));
        }

        let level = if test_type == TestType::Mock {
            let band = raw
                .level
                .as_deref()
                .and_then(parse_band)
                .ok_or_else(|| {
                    generation(format!("item {} has no valid band level", position + 1))
                })?;
            Some(band)
        } else {
            None
        };

        questions.push(TestQuestion {
            question,
            options,
            correct_answer,
            level,
        });
    }

    if test_type == TestType::Mock {
        for band in Band::ALL {
            let count = questions.iter().filter(|q| q.level == Some(band)).count();
            if count != QUESTIONS_PER_MOCK_BAND {
                return Err(generation(format!(
                    "mock test has {} {} questions, expected {}",
                    count, band, QUESTIONS_PER_MOCK_BAND
                )));
            }
        }
    }

    Ok(questions)
}

pub fn validate_learning_path(
    payload: serde_json::Value,
    fallback_subject: &str,
) -> Result<GeneratedLearningPath, LearningError> {
    let raw: RawLearningPath = serde_json::from_value(payload)
        .map_err(|e| generation(format!("unparsable learning path: {}", e)))?;
    let raw_lessons = raw
        .lessons
        .ok_or_else(|| generation("learning path has no `lessons` array"))?;

    if !(MIN_PATH_LESSONS..=MAX_PATH_LESSONS).contains(&raw_lessons.len()) {
        return Err(generation(format!(
            "learning path has {} lessons, expected {}-{}",
            raw_lessons.len(),
            MIN_PATH_LESSONS,
            MAX_PATH_LESSONS
        )));
    }

    let mut seen = HashSet::new();
    let mut lessons = Vec::with_capacity(raw_lessons.len());
    for (position, raw) in raw_lessons.into_iter().enumerate() {
        let lesson_id = required(raw.lesson_id, "lessonId", position)?;
        if !seen.insert(lesson_id.clone()) {
            return Err(generation(format!("duplicate lessonId `{}`", lesson_id)));
        }

        lessons.push(Lesson {
            lesson_id,
            title: required(raw.title, "title", position)?,
            description: required(raw.description, "description", position)?,
            content: required(raw.content, "content", position)?,
            difficulty: raw.difficulty,
            topics: raw.topics.unwrap_or_default(),
            estimated_duration: raw.estimated_duration.and_then(|value| match value {
                serde_json::Value::String(text) => Some(text),
                serde_json::Value::Number(number) => Some(number.to_string()),
                _ => None,
            }),
            completed: false,
            content_viewed: false,
            test_passed: false,
            test_score: None,
        });
    }

    let subject = raw
        .subject
        .filter(|subject| !subject.trim().is_empty())
        .unwrap_or_else(|| fallback_subject.to_string());

    Ok(GeneratedLearningPath { subject, lessons })
}

pub fn validate_evaluation(payload: serde_json::Value) -> Result<LevelEvaluation, LearningError> {
    let raw: RawEvaluation = serde_json::from_value(payload)
        .map_err(|e| generation(format!("unparsable level evaluation: {}", e)))?;

    let level = match raw.level.as_deref().map(str::trim) {
        Some("beginner") => PlacementLevel::Beginner,
        Some("intermediate") => PlacementLevel::Intermediate,
        Some("advanced") => PlacementLevel::Advanced,
        other => {
            return Err(generation(format!(
                "evaluation level {:?} is not a placement level",
                other
            )))
        }
    };

    let weak_areas = raw
        .weak_areas
        .unwrap_or_default()
        .into_iter()
        .map(|area| area.trim().to_string())
        .filter(|area| !area.is_empty())
        .take(MAX_WEAK_AREAS)
        .collect();

    Ok(LevelEvaluation {
        level,
        reasoning: raw.reasoning.unwrap_or_default(),
        weak_areas,
    })
}

fn parse_band(value: &str) -> Option<Band> {
    match value.trim().to_ascii_lowercase().as_str() {
        "easy" => Some(Band::Easy),
        "medium" => Some(Band::Medium),
        "advanced" => Some(Band::Advanced),
        _ => None,
    }
}
