use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::error::LearningError;
use crate::services::AppState;

/// GET /api/v1/teacher/overview
pub async fn overview(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, LearningError> {
    Ok(Json(state.aggregator().teacher_overview().await?))
}

/// GET /api/v1/teacher/students
pub async fn list_students(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, LearningError> {
    let rows = state.aggregator().student_rows().await?;
    tracing::debug!("Listing {} students", rows.len());
    Ok(Json(rows))
}

/// GET /api/v1/teacher/students/{id}
pub async fn student_detail(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, LearningError> {
    Ok(Json(state.aggregator().student_detail(&user_id).await?))
}
