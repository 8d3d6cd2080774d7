use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::LearningError;
pub use services::AppState;

/// CSP middleware adds Content-Security-Policy header to all responses
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );
    response
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    // The browser client is served from another origin.
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .nest(
            "/api/v1",
            api_routes()
                .nest("/teacher", teacher_routes())
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                ))
                .layer(cors),
        )
        .with_state(app_state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(
                    middlewares::trace::trace_context_middleware,
                ))
                .layer(middleware::from_fn(
                    middlewares::metrics::metrics_middleware,
                ))
                .layer(middleware::from_fn(csp_middleware))
                // Event streams are never compressed.
                .layer(CompressionLayer::new()),
        )
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/profile",
            get(handlers::profile::get_profile).post(handlers::profile::register_profile),
        )
        // Tests
        .route(
            "/tests/placement",
            post(handlers::assessments::start_placement_test),
        )
        .route("/tests/mock", post(handlers::assessments::start_mock_test))
        .route("/tests/{id}/submit", post(handlers::assessments::submit_test))
        .route("/attempts", get(handlers::assessments::list_attempts))
        // Learning path
        .route("/path", get(handlers::learning::get_path))
        .route("/path/generate", post(handlers::learning::generate_path))
        .route(
            "/path/lessons/{lesson_id}",
            get(handlers::learning::get_lesson),
        )
        .route(
            "/path/lessons/{lesson_id}/viewed",
            post(handlers::learning::mark_lesson_viewed),
        )
        .route(
            "/path/lessons/{lesson_id}/test",
            post(handlers::learning::start_lesson_test),
        )
        .route("/analytics", get(handlers::learning::get_analytics))
        .route("/dashboard/stream", get(handlers::sse::dashboard_events))
}

fn teacher_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/overview", get(handlers::teacher::overview))
        .route("/students", get(handlers::teacher::list_students))
        .route("/students/{id}", get(handlers::teacher::student_detail))
        .route_layer(middleware::from_fn(
            middlewares::auth::teacher_guard_middleware,
        ))
}
