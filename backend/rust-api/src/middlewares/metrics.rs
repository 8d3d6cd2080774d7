use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

/// Records request count and latency per method, route shape and status.
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(duration);

    response
}

/// Segments that are followed by an identifier.
const ID_PARENTS: [&str; 3] = ["lessons", "students", "tests"];

/// Fixed route words that may appear where an identifier could.
const FIXED_SEGMENTS: [&str; 2] = ["placement", "mock"];

/// Collapses identifiers into `{id}` so label cardinality stays bounded.
fn normalize_path(path: &str) -> String {
    let mut normalized: Vec<&str> = Vec::new();
    let mut previous = "";

    for segment in path.split('/') {
        let after_parent = ID_PARENTS.contains(&previous) && !FIXED_SEGMENTS.contains(&segment);
        if !segment.is_empty()
            && (after_parent || is_uuid_like(segment) || is_numeric_id(segment))
        {
            normalized.push("{id}");
        } else {
            normalized.push(segment);
        }
        previous = segment;
    }

    normalized.join("/")
}

/// UUID format: 8-4-4-4-12 hex characters
fn is_uuid_like(s: &str) -> bool {
    s.len() == 36 && s.chars().all(|c| c.is_ascii_hexdigit() || c == '-')
}

fn is_numeric_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path("/api/v1/tests/550e8400-e29b-41d4-a716-446655440000/submit"),
            "/api/v1/tests/{id}/submit"
        );
        assert_eq!(
            normalize_path("/api/v1/path/lessons/python-variables/viewed"),
            "/api/v1/path/lessons/{id}/viewed"
        );
        assert_eq!(
            normalize_path("/api/v1/teacher/students/abc123"),
            "/api/v1/teacher/students/{id}"
        );
        assert_eq!(normalize_path("/api/v1/tests/placement"), "/api/v1/tests/placement");
        assert_eq!(normalize_path("/api/v1/teacher/students"), "/api/v1/teacher/students");
        assert_eq!(normalize_path("/health"), "/health");
    }

    #[test]
    fn test_is_uuid_like() {
        assert!(is_uuid_like("550e8400-e29b-41d4-a716-446655440000"));
        assert!(!is_uuid_like("not-a-uuid"));
    }

    #[test]
    fn test_is_numeric_id() {
        assert!(is_numeric_id("123"));
        assert!(!is_numeric_id("abc"));
        assert!(!is_numeric_id(""));
    }
}
