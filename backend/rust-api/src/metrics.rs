use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

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

    // Record store
    pub static ref DB_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "db_operations_total",
        "Total number of record store operations",
        &["operation", "collection", "status"]
    )
    .unwrap();

    pub static ref DB_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "db_operation_duration_seconds",
        "Record store operation duration in seconds",
        &["operation", "collection"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap();

    // Progression
    pub static ref XP_GRANTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "xp_granted_total",
        "Total XP granted to learners",
        &["source"]
    )
    .unwrap();

    pub static ref LEVEL_UPS_TOTAL: IntCounter = register_int_counter!(
        "mascot_level_ups_total",
        "Total number of XP grants that raised a mascot level"
    )
    .unwrap();

    pub static ref STREAK_TRANSITIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "streak_transitions_total",
        "Streak updates by outcome",
        &["outcome"]
    )
    .unwrap();

    pub static ref CHALLENGES_COMPLETED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "challenges_completed_total",
        "Daily challenges completed",
        &["challenge_type"]
    )
    .unwrap();

    pub static ref ACHIEVEMENTS_UNLOCKED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "achievements_unlocked_total",
        "Achievements unlocked",
        &["achievement_type"]
    )
    .unwrap();

    // Chat
    pub static ref CHAT_SESSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "chat_sessions_total",
        "Chat sessions by lifecycle event",
        &["status"]
    )
    .unwrap();

    pub static ref CHAT_SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        "chat_sessions_active",
        "Chat sessions opened and not yet closed by this process"
    )
    .unwrap();

    pub static ref LLM_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "llm_requests_total",
        "Text generation requests",
        &["kind", "status"]
    )
    .unwrap();

    pub static ref LLM_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "llm_request_duration_seconds",
        "Text generation latency in seconds",
        &["kind"],
        vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .unwrap();

    pub static ref GRAMMAR_ANALYSIS_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "grammar_analysis_failures_total",
        "Grammar analyses degraded to no corrections",
        &["reason"]
    )
    .unwrap();

    pub static ref RATE_LIMITED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rate_limited_requests_total",
        "Requests rejected by the rate limiter",
        &["scope"]
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

/// Helper: track record store operation with metrics
pub async fn track_db_operation<F, T>(
    operation: &str,
    collection: &str,
    future: F,
) -> Result<T, anyhow::Error>
where
    F: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    DB_OPERATIONS_TOTAL
        .with_label_values(&[operation, collection, status])
        .inc();

    DB_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation, collection])
        .observe(duration);

    result
}

/// Helper: track a text generation call with metrics
pub async fn track_llm_request<F, T, E>(kind: &str, future: F) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let start = std::time::Instant::now();
    let result = future.await;

    let status = if result.is_ok() { "success" } else { "error" };
    LLM_REQUESTS_TOTAL.with_label_values(&[kind, status]).inc();
    LLM_REQUEST_DURATION_SECONDS
        .with_label_values(&[kind])
        .observe(start.elapsed().as_secs_f64());

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        let _ = HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/health", "200"])
            .get();
        let _ = GRAMMAR_ANALYSIS_FAILURES_TOTAL
            .with_label_values(&["malformed_json"])
            .get();
    }

    #[test]
    fn test_render_metrics() {
        XP_GRANTED_TOTAL.with_label_values(&["test"]).inc_by(5);

        let output = render_metrics().unwrap();
        assert!(output.contains("xp_granted_total"));
    }

    #[tokio::test]
    async fn llm_tracking_counts_failures() {
        let before = LLM_REQUESTS_TOTAL
            .with_label_values(&["metrics_test", "error"])
            .get();
        let result: Result<(), &str> = track_llm_request("metrics_test", async { Err("boom") }).await;
        assert!(result.is_err());
        assert_eq!(
            LLM_REQUESTS_TOTAL
                .with_label_values(&["metrics_test", "error"])
                .get(),
            before + 1
        );
    }
}
