//! Prometheus metrics: HTTP traffic plus the learning-platform events
//! (logins, notifications, payments, enrollments).

use std::{sync::LazyLock, time::Instant};

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use regex::Regex;

static UUID_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .expect("uuid pattern is valid")
});
static NUMERIC_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\d+(/|$)").expect("numeric pattern is valid"));

/// Initialize Prometheus metrics exporter
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        )?
        .install_recorder()?;

    Ok(handle)
}

/// Middleware to record HTTP request metrics
pub async fn track_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let in_flight = gauge!("http_requests_in_flight", "method" => method.clone(), "path" => path.clone());
    in_flight.increment(1.0);

    let response = next.run(req).await;

    in_flight.decrement(1.0);

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(
        "http_requests_total",
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status.clone()
    )
    .increment(1);

    histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "path" => path,
        "status" => status
    )
    .record(duration);

    response
}

/// Replace UUIDs and numeric ids in a path with `:id` to keep label
/// cardinality bounded.
fn normalize_path(path: &str) -> String {
    let normalized = UUID_SEGMENT.replace_all(path, ":id");
    NUMERIC_SEGMENT
        .replace_all(&normalized, "/:id$1")
        .into_owned()
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (StatusCode::OK, handle.render())
}

const fn outcome(success: bool) -> &'static str {
    if success { "success" } else { "failure" }
}

/// Record login, token refresh and OTP verification attempts
pub fn record_auth_event(event_type: &'static str, success: bool) {
    counter!(
        "auth_events_total",
        "type" => event_type,
        "status" => outcome(success)
    )
    .increment(1);
}

/// Record a notification delivery attempt
pub fn record_notification(kind: &'static str, success: bool) {
    counter!(
        "notifications_total",
        "kind" => kind,
        "status" => outcome(success)
    )
    .increment(1);
}

/// Record a payment step such as `intent_created`, `confirmed` or `mismatch`
pub fn record_payment_event(event: &'static str) {
    counter!("payment_events_total", "event" => event).increment(1);
}

/// Record an enrollment request; `created` is false when it already existed
pub fn record_enrollment(source: &'static str, created: bool) {
    counter!(
        "enrollments_total",
        "source" => source,
        "created" => if created { "true" } else { "false" }
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path("/courses/550e8400-e29b-41d4-a716-446655440000"),
            "/courses/:id"
        );
        assert_eq!(
            normalize_path(
                "/enrollments/550e8400-e29b-41d4-a716-446655440000/lessons/6ba7b810-9dad-11d1-80b4-00c04fd430c8/complete"
            ),
            "/enrollments/:id/lessons/:id/complete"
        );
        assert_eq!(normalize_path("/reviews/42/vote"), "/reviews/:id/vote");
        assert_eq!(normalize_path("/sections/7"), "/sections/:id");
        assert_eq!(normalize_path("/health"), "/health");
    }
}
