use adaptive_learning_api::models::{AttemptQuery, TestType, UserRole};
use adaptive_learning_api::services::store::ProgressStore;
use axum::http::StatusCode;
use serde_json::Value;

mod common;

use common::{answers, eventually, register, send, start_test, submit, token};

async fn student_with_path(app: &common::TestApp) -> String {
    let student = token("student-1", UserRole::Student);
    register(&app.router, &student, "ada").await;
    let (status, body) = send(
        &app.router,
        "POST",
        "/api/v1/path/generate",
        Some(&student),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    student
}

async fn view(app: &common::TestApp, student: &str, lesson_id: &str) -> (StatusCode, Value) {
    send(
        &app.router,
        "POST",
        &format!("/api/v1/path/lessons/{}/viewed", lesson_id),
        Some(student),
        None,
    )
    .await
}

async fn pass_lesson(app: &common::TestApp, student: &str, lesson_id: &str) -> Value {
    let (status, _) = view(app, student, lesson_id).await;
    assert_eq!(status, StatusCode::OK);
    let session = start_test(
        &app.router,
        student,
        &format!("/api/v1/path/lessons/{}/test", lesson_id),
    )
    .await;
    let (status, result) = submit(&app.router, student, &session, answers(5, 5)).await;
    assert_eq!(status, StatusCode::OK, "{}", result);
    result
}

#[tokio::test]
async fn test_path_is_missing_until_generated() {
    let app = common::create_test_app();
    let student = token("student-1", UserRole::Student);
    register(&app.router, &student, "ada").await;

    let (status, body) = send(&app.router, "GET", "/api/v1/path", Some(&student), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn test_only_first_lesson_is_open_on_a_new_path() {
    let app = common::create_test_app();
    let student = student_with_path(&app).await;

    let (_, path) = send(&app.router, "GET", "/api/v1/path", Some(&student), None).await;
    assert_eq!(path["currentLevel"], "easy");
    assert_eq!(path["levelComplete"], false);
    let lessons = path["lessons"].as_array().unwrap();
    assert_eq!(lessons[0]["accessible"], true);
    assert_eq!(lessons[0]["testAvailable"], false);
    assert!(lessons[1..].iter().all(|lesson| lesson["accessible"] == false));

    let (status, lesson) = send(
        &app.router,
        "GET",
        "/api/v1/path/lessons/lesson-1",
        Some(&student),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lesson["content"], "Lesson 1 content");
    assert_eq!(lesson["lessonId"], "lesson-1");

    let (status, locked) = send(
        &app.router,
        "GET",
        "/api/v1/path/lessons/lesson-2",
        Some(&student),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(locked["accessible"], false);
    assert!(locked["content"].is_null());

    let (status, body) = send(
        &app.router,
        "POST",
        "/api/v1/path/lessons/lesson-2/test",
        Some(&student),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::LOCKED);
    assert_eq!(body["kind"], "locked");

    let (status, _) = view(&app, &student, "lesson-2").await;
    assert_eq!(status, StatusCode::LOCKED);

    let (status, _) = send(
        &app.router,
        "GET",
        "/api/v1/path/lessons/lesson-99",
        Some(&student),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_lesson_test_requires_viewed_content() {
    let app = common::create_test_app();
    let student = student_with_path(&app).await;

    let (status, _) = send(
        &app.router,
        "POST",
        "/api/v1/path/lessons/lesson-1/test",
        Some(&student),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::LOCKED);

    let (status, lesson) = view(&app, &student, "lesson-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lesson["contentViewed"], true);
    assert_eq!(lesson["testAvailable"], true);

    let session = start_test(&app.router, &student, "/api/v1/path/lessons/lesson-1/test").await;
    assert_eq!(session["type"], "lesson");
    assert_eq!(session["lessonId"], "lesson-1");
    assert_eq!(session["questions"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_passing_at_threshold_completes_and_unlocks_next() {
    let app = common::create_test_app();
    let student = student_with_path(&app).await;
    view(&app, &student, "lesson-1").await;

    let failing = start_test(&app.router, &student, "/api/v1/path/lessons/lesson-1/test").await;
    let (_, result) = submit(&app.router, &student, &failing, answers(5, 3)).await;
    assert_eq!(result["score"], 60);
    assert_eq!(result["lesson"]["lesson"]["completed"], false);
    assert_eq!(result["lesson"]["lesson"]["testPassed"], false);
    assert_eq!(result["lesson"]["lesson"]["testScore"], 60);
    assert_eq!(result["lesson"]["progressPercentage"], 0);

    let passing = start_test(&app.router, &student, "/api/v1/path/lessons/lesson-1/test").await;
    let (_, result) = submit(&app.router, &student, &passing, answers(5, 4)).await;
    assert_eq!(result["score"], 80);
    assert_eq!(result["lesson"]["lesson"]["completed"], true);
    assert_eq!(result["lesson"]["lesson"]["testPassed"], true);
    assert_eq!(result["lesson"]["progressPercentage"], 17);
    assert_eq!(result["lesson"]["levelComplete"], false);

    let (_, path) = send(&app.router, "GET", "/api/v1/path", Some(&student), None).await;
    assert_eq!(path["progressPercentage"], 17);
    assert_eq!(path["lessons"][1]["accessible"], true);
    assert_eq!(path["lessons"][2]["accessible"], false);

    // A later failing retake does not undo completion.
    let retake = start_test(&app.router, &student, "/api/v1/path/lessons/lesson-1/test").await;
    let (_, result) = submit(&app.router, &student, &retake, answers(5, 0)).await;
    assert_eq!(result["lesson"]["lesson"]["completed"], true);
    assert_eq!(result["lesson"]["lesson"]["testScore"], 0);

    let store = &app.state.store;
    eventually(|| async move {
        let query = AttemptQuery {
            test_type: Some(TestType::Lesson),
            ..AttemptQuery::for_user("student-1")
        };
        let attempts = store.list_attempts(&query).await.unwrap();
        attempts.len() == 3 && attempts.iter().all(|a| a.lesson_id.as_deref() == Some("lesson-1"))
    })
    .await;
}

#[tokio::test]
async fn test_completing_every_lesson_completes_level() {
    let app = common::create_test_app();
    let student = student_with_path(&app).await;

    for i in 1..=5 {
        pass_lesson(&app, &student, &format!("lesson-{}", i)).await;
    }
    let last = pass_lesson(&app, &student, "lesson-6").await;
    assert_eq!(last["lesson"]["progressPercentage"], 100);
    assert_eq!(last["lesson"]["levelComplete"], true);

    let (_, path) = send(&app.router, "GET", "/api/v1/path", Some(&student), None).await;
    assert_eq!(path["levelComplete"], true);
    assert_eq!(path["progressPercentage"], 100);
}

#[tokio::test]
async fn test_regenerating_path_resets_lessons() {
    let app = common::create_test_app();
    let student = student_with_path(&app).await;
    pass_lesson(&app, &student, "lesson-1").await;

    let (status, path) = send(
        &app.router,
        "POST",
        "/api/v1/path/generate",
        Some(&student),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(path["progressPercentage"], 0);
    assert_eq!(path["lessons"][0]["completed"], false);
    assert_eq!(path["lessons"][1]["accessible"], false);
    assert_eq!(app.generator.paths_generated(), 2);
}
