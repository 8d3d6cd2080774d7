use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::Config;
use crate::error::LearningError;
use crate::metrics::GENERATIONS_TOTAL;
use crate::models::generated::{
    validate_evaluation, validate_learning_path, validate_question_set, GeneratedLearningPath,
    LevelEvaluation,
};
use crate::models::{AnsweredQuestion, Level, TestQuestion, TestType};

pub type GeneratorResult<T> = Result<T, LearningError>;

/// Source of generated questions and lessons.
///
/// Implementations must return validated data only: any malformed, short or
/// unparsable response is a [`LearningError::Generation`].
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// 10 mixed-difficulty questions.
    async fn generate_diagnostic_test(&self) -> GeneratorResult<Vec<TestQuestion>>;

    /// 10 questions at the difficulty derived from `level`.
    async fn generate_level_based_test(&self, level: Level) -> GeneratorResult<Vec<TestQuestion>>;

    /// 15 questions, exactly 5 per band.
    async fn generate_mock_test(&self) -> GeneratorResult<Vec<TestQuestion>>;

    /// 6 to 8 lessons with all progress flags reset.
    async fn generate_learning_path(
        &self,
        level: Level,
        weak_areas: &[String],
    ) -> GeneratorResult<GeneratedLearningPath>;

    /// 5 questions on a single lesson.
    async fn generate_lesson_test(
        &self,
        lesson_id: &str,
        title: &str,
        level: Level,
    ) -> GeneratorResult<Vec<TestQuestion>>;

    async fn evaluate_student_level(
        &self,
        questions: &[AnsweredQuestion],
        score: u32,
    ) -> GeneratorResult<LevelEvaluation>;
}

lazy_static! {
    static ref CODE_FENCE: Regex =
        Regex::new(r"(?s)^```(?:json)?[ \t]*\n?(.*?)\n?```$").expect("valid code fence regex");
}

/// Removes a surrounding markdown code fence, if any.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    CODE_FENCE
        .captures(trimmed)
        .and_then(|captures| captures.get(1))
        .map(|body| body.as_str().trim())
        .unwrap_or(trimmed)
}

/// Parses the model's text reply into JSON.
pub fn parse_model_json(text: &str) -> GeneratorResult<serde_json::Value> {
    serde_json::from_str(strip_code_fence(text))
        .map_err(|e| LearningError::generation(format!("model reply is not valid JSON: {}", e)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Content generator backed by the Gemini `generateContent` REST endpoint.
pub struct GeminiGenerator {
    http_client: Client,
    api_url: String,
    model: String,
    api_key: Option<String>,
    subject: String,
}

impl GeminiGenerator {
    pub fn new(config: &Config) -> Self {
        if config.ai_api_key.is_none() {
            tracing::error!(
                "AI service API key is missing (set AI_API_KEY); test and lesson generation will fail"
            );
        }
        Self {
            http_client: Client::new(),
            api_url: config.ai_api_url.trim_end_matches('/').to_string(),
            model: config.ai_model.clone(),
            api_key: config.ai_api_key.clone(),
            subject: config.subject.clone(),
        }
    }

    async fn generate(
        &self,
        operation: &'static str,
        prompt: String,
    ) -> GeneratorResult<serde_json::Value> {
        let result = self.call_model(&prompt).await;
        let status = if result.is_ok() { "success" } else { "error" };
        GENERATIONS_TOTAL
            .with_label_values(&[operation, status])
            .inc();
        result
    }

    async fn call_model(&self, prompt: &str) -> GeneratorResult<serde_json::Value> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LearningError::generation("AI service API key is not configured"))?;

        let url = format!("{}/models/{}:generateContent", self.api_url, self.model);
        let payload = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        tracing::debug!("Calling content generator: model={}", self.model);

        let response = self
            .http_client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&payload)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| LearningError::generation(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LearningError::generation(format!(
                "generator returned error {}: {}",
                status, error_text
            )));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| {
                LearningError::generation(format!("unparsable generator response: {}", e))
            })?;

        let text = body
            .candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .find_map(|part| part.text)
            .ok_or_else(|| LearningError::generation("generator returned no text"))?;

        parse_model_json(&text)
    }

    fn question_format(with_band: bool) -> &'static str {
        if with_band {
            r#"{"questions": [{"question": "...", "options": ["A", "B", "C", "D"], "correctAnswer": "exact text of the correct option", "level": "easy" | "medium" | "advanced"}]}"#
        } else {
            r#"{"questions": [{"question": "...", "options": ["A", "B", "C", "D"], "correctAnswer": "exact text of the correct option"}]}"#
        }
    }
}

#[async_trait]
impl ContentGenerator for GeminiGenerator {
    async fn generate_diagnostic_test(&self) -> GeneratorResult<Vec<TestQuestion>> {
        let prompt = format!(
            "Generate a diagnostic test with 10 multiple-choice questions that mixes easy, \
             medium and hard questions to place a new {} student. Each question has exactly \
             4 options. Return only JSON in this format: {}",
            self.subject,
            Self::question_format(false)
        );
        let payload = self.generate("diagnostic_test", prompt).await?;
        validate_question_set(payload, TestType::Diagnostic)
    }

    async fn generate_level_based_test(&self, level: Level) -> GeneratorResult<Vec<TestQuestion>> {
        let prompt = format!(
            "Generate a {} level test with 10 multiple-choice {} questions for a {} student. \
             Each question has exactly 4 options. Return only JSON in this format: {}",
            level.difficulty(),
            self.subject,
            level,
            Self::question_format(false)
        );
        let payload = self.generate("level_test", prompt).await?;
        validate_question_set(payload, TestType::Regular)
    }

    async fn generate_mock_test(&self) -> GeneratorResult<Vec<TestQuestion>> {
        let prompt = format!(
            "Generate a {} mock test with exactly 15 multiple-choice questions: 5 easy, \
             5 medium and 5 advanced, each tagged with its level. Each question has exactly \
             4 options. Return only JSON in this format: {}",
            self.subject,
            Self::question_format(true)
        );
        let payload = self.generate("mock_test", prompt).await?;
        validate_question_set(payload, TestType::Mock)
    }

    async fn generate_learning_path(
        &self,
        level: Level,
        weak_areas: &[String],
    ) -> GeneratorResult<GeneratedLearningPath> {
        let focus = if weak_areas.is_empty() {
            String::new()
        } else {
            format!(" Give extra attention to: {}.", weak_areas.join(", "))
        };
        let prompt = format!(
            "Create a {} learning path of 6 to 8 sequential lessons for a {} level student.{} \
             Return only JSON in this format: {}",
            self.subject,
            level,
            focus,
            json!({
                "subject": self.subject,
                "lessons": [{
                    "lessonId": "unique-id",
                    "title": "...",
                    "description": "...",
                    "content": "full lesson text",
                    "difficulty": level.as_str(),
                    "topics": ["..."],
                    "estimatedDuration": "15 min"
                }]
            })
        );
        let payload = self.generate("learning_path", prompt).await?;
        validate_learning_path(payload, &self.subject)
    }

    async fn generate_lesson_test(
        &self,
        lesson_id: &str,
        title: &str,
        level: Level,
    ) -> GeneratorResult<Vec<TestQuestion>> {
        let prompt = format!(
            "Generate 5 multiple-choice questions testing the {} lesson \"{}\" (id {}) for a {} \
             level student. Each question has exactly 4 options. Return only JSON in this \
             format: {}",
            self.subject,
            title,
            lesson_id,
            level,
            Self::question_format(false)
        );
        let payload = self.generate("lesson_test", prompt).await?;
        validate_question_set(payload, TestType::Lesson)
    }

    async fn evaluate_student_level(
        &self,
        questions: &[AnsweredQuestion],
        score: u32,
    ) -> GeneratorResult<LevelEvaluation> {
        let answers: Vec<String> = questions
            .iter()
            .enumerate()
            .map(|(i, q)| {
                format!(
                    "{}. {} | correct: {} | student: {}",
                    i + 1,
                    q.question,
                    q.correct_answer,
                    q.student_answer.as_deref().unwrap_or("Not answered")
                )
            })
            .collect();
        let prompt = format!(
            "A student scored {}%. These are the questions they got wrong:\n{}\n\
             Classify the student as \"beginner\" (0-40%), \"intermediate\" (41-70%) or \
             \"advanced\" (71-100%) and name at most 3 weak areas. Return only JSON: \
             {{\"level\": \"...\", \"reasoning\": \"...\", \"weakAreas\": [\"...\"]}}",
            score,
            answers.join("\n")
        );
        let payload = self.generate("evaluate_level", prompt).await?;
        validate_evaluation(payload)
    }
}
