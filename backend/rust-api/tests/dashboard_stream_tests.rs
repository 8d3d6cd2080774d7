use std::time::Duration;

use adaptive_learning_api::models::UserRole;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

mod common;

use common::{answers, register, start_test, submit, token};

/// Reads body frames until one complete SSE event has arrived.
async fn next_event(body: &mut Body) -> (String, Value) {
    let mut buffer = String::new();
    while !buffer.contains("\n\n") {
        let frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
            .await
            .expect("no event within 2s")
            .expect("stream ended")
            .unwrap();
        if let Ok(data) = frame.into_data() {
            buffer.push_str(&String::from_utf8_lossy(&data));
        }
    }

    let mut name = String::new();
    let mut data = String::new();
    for line in buffer.lines() {
        if let Some(value) = line.strip_prefix("event: ") {
            name = value.to_string();
        } else if let Some(value) = line.strip_prefix("data: ") {
            data.push_str(value);
        }
    }
    (name, serde_json::from_str(&data).unwrap())
}

#[tokio::test]
async fn test_dashboard_pushes_snapshot_on_connect_and_on_change() {
    let app = common::create_test_app();
    let student = token("student-1", UserRole::Student);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/dashboard/stream")
                .header("authorization", format!("Bearer {}", student))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );
    let mut body = response.into_body();

    let (name, snapshot) = next_event(&mut body).await;
    assert_eq!(name, "dashboard-snapshot");
    assert_eq!(snapshot["userId"], "student-1");
    assert!(snapshot["profile"].is_null());
    assert_eq!(snapshot["attempts"]["totalTests"], 0);

    register(&app.router, &student, "ada").await;
    let (_, snapshot) = next_event(&mut body).await;
    assert_eq!(snapshot["profile"]["displayName"], "ada");

    let diagnostic = start_test(&app.router, &student, "/api/v1/tests/placement").await;
    let (status, _) = submit(&app.router, &student, &diagnostic, answers(10, 7)).await;
    assert_eq!(status, StatusCode::OK);

    // The diagnostic writes the profile, then the attempt.
    let mut snapshot = next_event(&mut body).await.1;
    while snapshot["attempts"]["totalTests"] == 0 {
        snapshot = next_event(&mut body).await.1;
    }
    assert_eq!(snapshot["attempts"]["totalTests"], 1);
    assert_eq!(snapshot["attempts"]["lastTestScore"], 70);
    assert_eq!(snapshot["profile"]["level"], "intermediate");
}

#[tokio::test]
async fn test_dashboard_stream_requires_token() {
    let app = common::create_test_app();
    let (status, _) = common::send(
        &app.router,
        "GET",
        "/api/v1/dashboard/stream",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
