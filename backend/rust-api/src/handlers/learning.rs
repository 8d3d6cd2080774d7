use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::error::LearningError;
use crate::extractors::Session;
use crate::services::AppState;

/// GET /api/v1/path
pub async fn get_path(
    State(state): State<Arc<AppState>>,
    Session(ctx): Session,
) -> Result<impl IntoResponse, LearningError> {
    Ok(Json(state.tracker().overview(&ctx).await?))
}

/// POST /api/v1/path/generate
pub async fn generate_path(
    State(state): State<Arc<AppState>>,
    Session(ctx): Session,
) -> Result<impl IntoResponse, LearningError> {
    let overview = state.learning().generate_path(&ctx).await?;
    Ok((StatusCode::CREATED, Json(overview)))
}

/// GET /api/v1/path/lessons/{lessonId}
pub async fn get_lesson(
    State(state): State<Arc<AppState>>,
    Session(ctx): Session,
    Path(lesson_id): Path<String>,
) -> Result<impl IntoResponse, LearningError> {
    Ok(Json(state.tracker().lesson_view(&ctx, &lesson_id).await?))
}

/// POST /api/v1/path/lessons/{lessonId}/viewed
pub async fn mark_lesson_viewed(
    State(state): State<Arc<AppState>>,
    Session(ctx): Session,
    Path(lesson_id): Path<String>,
) -> Result<impl IntoResponse, LearningError> {
    Ok(Json(
        state.tracker().mark_content_viewed(&ctx, &lesson_id).await?,
    ))
}

/// POST /api/v1/path/lessons/{lessonId}/test
pub async fn start_lesson_test(
    State(state): State<Arc<AppState>>,
    Session(ctx): Session,
    Path(lesson_id): Path<String>,
) -> Result<impl IntoResponse, LearningError> {
    let view = state.learning().start_lesson_test(&ctx, &lesson_id).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/v1/analytics
pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
    Session(ctx): Session,
) -> Result<impl IntoResponse, LearningError> {
    Ok(Json(state.aggregator().analytics(&ctx).await?))
}
