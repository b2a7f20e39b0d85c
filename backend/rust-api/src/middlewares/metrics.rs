use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let response = next.run(req).await;

    let status = response.status().as_u16().to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(start.elapsed().as_secs_f64());

    response
}

/// Collapses record ids in a path so label cardinality stays bounded.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| if is_dynamic(segment) { "{id}" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

/// Route literals are short lowercase words such as `v1` or `add-xp`;
/// uuids, numbers and dates are ids.
fn is_dynamic(segment: &str) -> bool {
    if segment.is_empty() {
        return false;
    }
    let is_route_word = segment.len() <= 24
        && segment.starts_with(|c: char| c.is_ascii_lowercase())
        && segment
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    !is_route_word
}
