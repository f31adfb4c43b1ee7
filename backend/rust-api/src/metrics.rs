use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramVec, IntCounter, IntCounterVec, TextEncoder,
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

    // Storage Metrics (MongoDB / Redis)
    pub static ref STORE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "store_operations_total",
        "Total number of storage operations",
        &["backend", "operation", "status"]
    )
    .unwrap();

    pub static ref STORE_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "store_operation_duration_seconds",
        "Storage operation duration in seconds",
        &["backend", "operation"],
        vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap();

    // Quiz Metrics
    pub static ref ANSWERS_GRADED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "answers_graded_total",
        "Total number of answers graded",
        &["correct"]
    )
    .unwrap();

    pub static ref DUPLICATE_SUBMISSIONS_TOTAL: IntCounter = register_int_counter!(
        "duplicate_submissions_total",
        "Submissions answered from an existing answer record"
    )
    .unwrap();

    pub static ref QUESTIONS_SERVED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "questions_served_total",
        "Questions served, by selector fallback stage",
        &["stage"]
    )
    .unwrap();

    pub static ref QUESTION_CYCLES_RESET_TOTAL: IntCounter = register_int_counter!(
        "question_cycles_reset_total",
        "Times a user's used-question history was cleared after exhausting the catalog"
    )
    .unwrap();

    pub static ref STATE_CONFLICTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "state_conflicts_total",
        "Optimistic version conflicts on user state commits",
        &["operation"]
    )
    .unwrap();

    pub static ref LEADERBOARD_UPDATE_FAILURES_TOTAL: IntCounter = register_int_counter!(
        "leaderboard_update_failures_total",
        "Leaderboard updates that failed and were dropped"
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

/// Helper: track a storage operation with metrics
pub async fn track_store_operation<F, T, E>(
    backend: &str,
    operation: &str,
    future: F,
) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    STORE_OPERATIONS_TOTAL
        .with_label_values(&[backend, operation, status])
        .inc();

    STORE_OPERATION_DURATION_SECONDS
        .with_label_values(&[backend, operation])
        .observe(duration);

    result
}

pub fn record_answer_graded(is_correct: bool) {
    let label = if is_correct { "true" } else { "false" };
    ANSWERS_GRADED_TOTAL.with_label_values(&[label]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        let _ = HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/health", "200"])
            .get();
        let _ = DUPLICATE_SUBMISSIONS_TOTAL.get();
    }

    #[test]
    fn test_render_metrics() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();
        record_answer_graded(true);

        let output = render_metrics().unwrap();
        assert!(output.contains("http_requests_total"));
        assert!(output.contains("answers_graded_total"));
    }

    #[tokio::test]
    async fn test_track_store_operation_counts_errors() {
        let before = STORE_OPERATIONS_TOTAL
            .with_label_values(&["test", "lookup", "error"])
            .get();

        let result: Result<(), &str> =
            track_store_operation("test", "lookup", async { Err("boom") }).await;

        assert!(result.is_err());
        let after = STORE_OPERATIONS_TOTAL
            .with_label_values(&["test", "lookup", "error"])
            .get();
        assert_eq!(after, before + 1);
    }
}
