use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::error::LearningError;
use crate::extractors::{AppJson, Session};
use crate::models::{AttemptQuery, SubmitTestRequest};
use crate::services::AppState;

/// POST /api/v1/tests/placement
///
/// Diagnostic test for a new learner, level-based test afterwards.
pub async fn start_placement_test(
    State(state): State<Arc<AppState>>,
    Session(ctx): Session,
) -> Result<impl IntoResponse, LearningError> {
    let view = state.learning().start_placement_test(&ctx).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// POST /api/v1/tests/mock
pub async fn start_mock_test(
    State(state): State<Arc<AppState>>,
    Session(ctx): Session,
) -> Result<impl IntoResponse, LearningError> {
    let view = state.learning().start_mock_test(&ctx).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// POST /api/v1/tests/{id}/submit
pub async fn submit_test(
    State(state): State<Arc<AppState>>,
    Session(ctx): Session,
    Path(session_id): Path<String>,
    AppJson(req): AppJson<SubmitTestRequest>,
) -> Result<impl IntoResponse, LearningError> {
    let submission = state
        .learning()
        .submit_test(&ctx, &session_id, req.answers)
        .await?;

    // Follow-up persistence keeps running after the response is sent.
    drop(submission.background);
    Ok(Json(submission.result))
}

/// GET /api/v1/attempts?subject=&type=&limit=
pub async fn list_attempts(
    State(state): State<Arc<AppState>>,
    Session(ctx): Session,
    Query(query): Query<AttemptQuery>,
) -> Result<impl IntoResponse, LearningError> {
    Ok(Json(state.learning().attempts(&ctx, query).await?))
}
