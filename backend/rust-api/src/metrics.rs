use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

use crate::error::LearningError;

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Progress store (MongoDB)
    pub static ref STORE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "store_operations_total",
        "Total number of progress store operations",
        &["operation", "collection", "status"]
    )
    .unwrap();

    pub static ref STORE_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "store_operation_duration_seconds",
        "Progress store operation duration in seconds",
        &["operation", "collection"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap();

    // Content generator
    pub static ref GENERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "content_generations_total",
        "Total number of content generator calls",
        &["operation", "status"]
    )
    .unwrap();

    // Learning Metrics
    pub static ref TESTS_SUBMITTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "tests_submitted_total",
        "Total number of submitted tests",
        &["type"]
    )
    .unwrap();

    pub static ref PROMOTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "level_promotions_total",
        "Total number of level changes after mock tests",
        &["to_level"]
    )
    .unwrap();

    pub static ref LESSON_COMPLETIONS_TOTAL: IntCounter = register_int_counter!(
        "lesson_completions_total",
        "Total number of lessons completed by passing their test"
    )
    .unwrap();

    pub static ref BACKGROUND_TASKS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "background_tasks_total",
        "Post-submission background operations",
        &["operation", "status"]
    )
    .unwrap();

    pub static ref TEST_SESSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "test_sessions_total",
        "Total number of test sessions",
        &["status"]
    )
    .unwrap();

    pub static ref TEST_SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        "test_sessions_active",
        "Number of test sessions awaiting submission"
    )
    .unwrap();

    pub static ref SSE_CONNECTIONS_ACTIVE: IntGauge = register_int_gauge!(
        "sse_connections_active",
        "Number of active SSE connections"
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track progress store operation with metrics
pub async fn track_store_operation<F, T>(
    operation: &str,
    collection: &str,
    future: F,
) -> Result<T, LearningError>
where
    F: std::future::Future<Output = Result<T, LearningError>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    STORE_OPERATIONS_TOTAL
        .with_label_values(&[operation, collection, status])
        .inc();

    STORE_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation, collection])
        .observe(duration);

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_metrics() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = render_metrics().unwrap();
        assert!(output.contains("http_requests_total"));
    }

    #[tokio::test]
    async fn store_operations_are_counted_by_status() {
        let before = STORE_OPERATIONS_TOTAL
            .with_label_values(&["find_one", "metrics_test", "error"])
            .get();

        let result: Result<(), _> = track_store_operation("find_one", "metrics_test", async {
            Err(LearningError::persistence("down"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(
            STORE_OPERATIONS_TOTAL
                .with_label_values(&["find_one", "metrics_test", "error"])
                .get(),
            before + 1
        );
    }
}
