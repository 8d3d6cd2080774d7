#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use adaptive_learning_api::{
    config::{Config, StoreBackend},
    create_router,
    middlewares::auth::{JwtClaims, JwtService},
    models::{
        generated::{GeneratedLearningPath, LevelEvaluation},
        AnsweredQuestion, Band, Lesson, Level, PlacementLevel, TestQuestion, UserRole,
    },
    services::{
        content_generator::{ContentGenerator, GeneratorResult},
        store::MemoryStore,
        AppState,
    },
    LearningError,
};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

pub const JWT_SECRET: &str = "test-secret";
pub const CORRECT: &str = "right";
pub const WRONG: &str = "wrong";

/// Every generated question has `CORRECT` as its answer, so tests control
/// the score by choosing how many answers to get right.
pub struct ScriptedGenerator {
    failing: AtomicBool,
    paths_generated: AtomicUsize,
    weak_areas: Vec<String>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            failing: AtomicBool::new(false),
            paths_generated: AtomicUsize::new(0),
            weak_areas: vec!["loops".to_string(), "recursion".to_string()],
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn paths_generated(&self) -> usize {
        self.paths_generated.load(Ordering::SeqCst)
    }

    fn check(&self) -> GeneratorResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LearningError::generation("model unavailable"));
        }
        Ok(())
    }

    fn questions(prefix: &str, count: usize, band: Option<Band>) -> Vec<TestQuestion> {
        (0..count)
            .map(|i| TestQuestion {
                question: format!("{} question {}", prefix, i + 1),
                options: vec![
                    CORRECT.to_string(),
                    WRONG.to_string(),
                    "maybe".to_string(),
                    "never".to_string(),
                ],
                correct_answer: CORRECT.to_string(),
                level: band,
            })
            .collect()
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate_diagnostic_test(&self) -> GeneratorResult<Vec<TestQuestion>> {
        self.check()?;
        Ok(Self::questions("diagnostic", 10, None))
    }

    async fn generate_level_based_test(&self, level: Level) -> GeneratorResult<Vec<TestQuestion>> {
        self.check()?;
        Ok(Self::questions(level.as_str(), 10, None))
    }

    async fn generate_mock_test(&self) -> GeneratorResult<Vec<TestQuestion>> {
        self.check()?;
        let mut questions = Vec::new();
        for band in Band::ALL {
            questions.extend(Self::questions(band.as_str(), 5, Some(band)));
        }
        Ok(questions)
    }

    async fn generate_learning_path(
        &self,
        level: Level,
        _weak_areas: &[String],
    ) -> GeneratorResult<GeneratedLearningPath> {
        self.check()?;
        self.paths_generated.fetch_add(1, Ordering::SeqCst);
        let lessons = (1..=6)
            .map(|i| Lesson {
                lesson_id: format!("lesson-{}", i),
                title: format!("{} lesson {}", level, i),
                description: format!("Lesson {} description", i),
                content: format!("Lesson {} content", i),
                difficulty: Some(level.as_str().to_string()),
                topics: vec!["basics".to_string()],
                estimated_duration: Some("15 min".to_string()),
                completed: false,
                content_viewed: false,
                test_passed: false,
                test_score: None,
            })
            .collect();
        Ok(GeneratedLearningPath {
            subject: "Python".to_string(),
            lessons,
        })
    }

    async fn generate_lesson_test(
        &self,
        lesson_id: &str,
        _title: &str,
        _level: Level,
    ) -> GeneratorResult<Vec<TestQuestion>> {
        self.check()?;
        Ok(Self::questions(lesson_id, 5, None))
    }

    async fn evaluate_student_level(
        &self,
        _questions: &[AnsweredQuestion],
        _score: u32,
    ) -> GeneratorResult<LevelEvaluation> {
        // A real model call suspends here, letting concurrent submits interleave.
        tokio::task::yield_now().await;
        self.check()?;
        Ok(LevelEvaluation {
            level: PlacementLevel::Intermediate,
            reasoning: "scripted".to_string(),
            weak_areas: self.weak_areas.clone(),
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub generator: Arc<ScriptedGenerator>,
}

pub fn test_config() -> Config {
    Config {
        mongo_uri: "mongodb://localhost:27017".to_string(),
        mongo_database: "adaptive_learning_test".to_string(),
        store_backend: StoreBackend::Memory,
        jwt_secret: JWT_SECRET.to_string(),
        ai_api_key: Some("test-key".to_string()),
        ai_api_url: "http://localhost:0".to_string(),
        ai_model: "scripted".to_string(),
        subject: "Python".to_string(),
        test_session_ttl_secs: 600,
        bind_addr: "127.0.0.1:0".to_string(),
    }
}

pub fn create_test_app() -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let generator = Arc::new(ScriptedGenerator::new());
    let state = Arc::new(AppState::with_components(
        test_config(),
        Arc::new(MemoryStore::new()),
        generator.clone(),
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        generator,
    }
}

pub fn token(user_id: &str, role: UserRole) -> String {
    JwtService::new(JWT_SECRET)
        .generate_token(&JwtClaims::new(user_id, role, 3600))
        .unwrap()
}

pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, json)
}

pub async fn register(app: &Router, token: &str, name: &str) {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/profile",
        Some(token),
        Some(json!({ "displayName": name, "email": format!("{}@example.com", name) })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
}

/// Answers the first `correct` questions right and the rest wrong.
pub fn answers(total: usize, correct: usize) -> Value {
    let answers: Vec<&str> = (0..total)
        .map(|i| if i < correct { CORRECT } else { WRONG })
        .collect();
    json!({ "answers": answers })
}

/// Mock answers with the given number right in each band, in easy, medium,
/// advanced question order.
pub fn mock_answers(easy: usize, medium: usize, advanced: usize) -> Value {
    let mut answers = Vec::with_capacity(15);
    for correct in [easy, medium, advanced] {
        answers.extend((0..5).map(|i| if i < correct { CORRECT } else { WRONG }));
    }
    json!({ "answers": answers })
}

pub async fn start_test(app: &Router, token: &str, uri: &str) -> Value {
    let (status, body) = send(app, "POST", uri, Some(token), None).await;
    assert_eq!(status, StatusCode::CREATED, "start test failed: {}", body);
    body
}

pub async fn submit(
    app: &Router,
    token: &str,
    session: &Value,
    answers: Value,
) -> (StatusCode, Value) {
    let session_id = session["sessionId"].as_str().unwrap();
    send(
        app,
        "POST",
        &format!("/api/v1/tests/{}/submit", session_id),
        Some(token),
        Some(answers),
    )
    .await
}

/// Polls until `check` holds, for work that finishes after the response.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached within 2s");
}
