use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Error taxonomy shared by the core components and the HTTP layer.
#[derive(Debug, Error)]
pub enum LearningError {
    /// Malformed or incomplete generator output. Prior state is preserved.
    #[error("Content generation failed: {0}")]
    Generation(String),
    /// Missing profile, path or analytics. Callers usually treat this as a
    /// first-time user.
    #[error("{0} not found")]
    NotFound(String),
    #[error("Storage error: {0}")]
    Persistence(String),
    /// Rejected before any network call.
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("Lesson {0} is locked")]
    Locked(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl LearningError {
    pub fn generation(message: impl Into<String>) -> Self {
        LearningError::Generation(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        LearningError::NotFound(what.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        LearningError::Persistence(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        LearningError::Validation(message.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LearningError::Generation(_) => "generation",
            LearningError::NotFound(_) => "not_found",
            LearningError::Persistence(_) => "persistence",
            LearningError::Validation(_) => "validation",
            LearningError::AlreadyExists(_) => "already_exists",
            LearningError::Locked(_) => "locked",
            LearningError::Forbidden(_) => "forbidden",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            LearningError::Generation(_) => StatusCode::BAD_GATEWAY,
            LearningError::NotFound(_) => StatusCode::NOT_FOUND,
            LearningError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
            LearningError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            LearningError::AlreadyExists(_) => StatusCode::CONFLICT,
            LearningError::Locked(_) => StatusCode::LOCKED,
            LearningError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl From<mongodb::error::Error> for LearningError {
    fn from(err: mongodb::error::Error) -> Self {
        LearningError::Persistence(err.to_string())
    }
}

impl IntoResponse for LearningError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), "{}", self);
        } else {
            tracing::debug!(kind = self.kind(), "{}", self);
        }

        let body = json!({
            "message": self.to_string(),
            "status": status.as_u16(),
            "kind": self.kind(),
        });
        (status, Json(body)).into_response()
    }
}
