use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::error::LearningError;
use crate::models::{SessionContext, UserRole};
use crate::services::AppState;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtClaims {
    pub sub: String,  // user_id
    pub role: String, // student | teacher
    pub exp: usize,
    pub iat: usize,
}

impl JwtClaims {
    pub fn new(user_id: impl Into<String>, role: UserRole, ttl_secs: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.into(),
            role: role.as_str().to_string(),
            exp: (now + ttl_secs) as usize,
            iat: now as usize,
        }
    }

    /// Session for a verified token. Unknown roles are rejected.
    pub fn session(&self) -> Result<SessionContext, AuthError> {
        let role = UserRole::parse(&self.role).ok_or(AuthError::UnknownRole)?;
        Ok(SessionContext::new(self.sub.clone(), role))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    ExpiredToken,
    #[error("Missing authorization token")]
    MissingToken,
    #[error("Invalid token signature")]
    InvalidSignature,
    #[error("Unknown role in token")]
    UnknownRole,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = axum::Json(serde_json::json!({
            "message": self.to_string(),
            "status": 401,
            "kind": "unauthorized",
        }));
        (axum::http::StatusCode::UNAUTHORIZED, body).into_response()
    }
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn generate_token(&self, claims: &JwtClaims) -> Result<String, AuthError> {
        encode(&Header::default(), claims, &self.encoding_key).map_err(|_| AuthError::InvalidToken)
    }

    pub fn validate_token(&self, token: &str) -> Result<JwtClaims, AuthError> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::InvalidToken,
            })
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AuthError::MissingToken)
}

/// Verifies the bearer token and attaches the caller's [`SessionContext`]
/// to the request.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(&headers)?;

    let jwt_service = JwtService::new(&state.config.jwt_secret);
    let claims = jwt_service.validate_token(token).map_err(|e| {
        tracing::warn!("JWT validation failed: {}", e);
        e
    })?;
    let session = claims.session()?;

    tracing::debug!(
        "Authenticated user: {} (role: {})",
        session.user_id,
        session.role.as_str()
    );

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

/// Lets only teachers through. Must run after [`auth_middleware`].
pub async fn teacher_guard_middleware(request: Request, next: Next) -> Response {
    match request.extensions().get::<SessionContext>() {
        Some(session) if session.is_teacher() => next.run(request).await,
        _ => {
            tracing::warn!("Access denied: teacher role required");
            LearningError::Forbidden("teacher role required".into()).into_response()
        }
    }
}
