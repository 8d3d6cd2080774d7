use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

use crate::error::LearningError;
use crate::extractors::{Session, ValidatedJson};
use crate::models::RegisterProfileRequest;
use crate::services::AppState;

/// POST /api/v1/profile
pub async fn register_profile(
    State(state): State<Arc<AppState>>,
    Session(ctx): Session,
    ValidatedJson(req): ValidatedJson<RegisterProfileRequest>,
) -> Result<impl IntoResponse, LearningError> {
    let profile = state
        .learning()
        .register_profile(&ctx, req.display_name.trim(), req.email.trim())
        .await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// GET /api/v1/profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Session(ctx): Session,
) -> Result<impl IntoResponse, LearningError> {
    Ok(Json(state.learning().profile(&ctx).await?))
}
