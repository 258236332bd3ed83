//! Prometheus metrics for the review API.

use std::time::Instant;

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

const HTTP_REQUESTS: &str = "clipqa_http_requests_total";
const HTTP_LATENCY: &str = "clipqa_http_request_duration_seconds";
const HTTP_IN_FLIGHT: &str = "clipqa_http_requests_in_flight";
const RATE_LIMITED: &str = "clipqa_rate_limit_hits_total";
const NAVIGATIONS: &str = "clipqa_review_navigations_total";
const DECISIONS: &str = "clipqa_review_decisions_total";

/// Path label for requests no route matched.
const UNMATCHED_ROUTE: &str = "unmatched";

pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

pub fn record_rate_limit_hit(route: &str) {
    counter!(RATE_LIMITED, "endpoint" => route.to_string()).increment(1);
}

/// `assigned` when a clip was locked, `empty` when the queue had nothing.
pub fn record_navigation(assigned: bool) {
    let outcome = if assigned { "assigned" } else { "empty" };
    counter!(NAVIGATIONS, "outcome" => outcome).increment(1);
}

/// One of `passed`, `failed` or `skipped`.
pub fn record_decision(decision: &'static str) {
    counter!(DECISIONS, "decision" => decision).increment(1);
}

/// Route template of the request, so clip ids stay out of label values.
pub(crate) fn route_label(request: &Request<Body>) -> String {
    match request.extensions().get::<MatchedPath>() {
        Some(path) => path.as_str().to_string(),
        None => UNMATCHED_ROUTE.to_string(),
    }
}

/// Count, time and track in-flight requests by method, route and status.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().as_str().to_string();
    let route = route_label(&request);
    let started = Instant::now();

    let in_flight = gauge!(HTTP_IN_FLIGHT);
    in_flight.increment(1.0);
    let response = next.run(request).await;
    in_flight.decrement(1.0);

    let labels = [
        ("method", method),
        ("path", route),
        ("status", response.status().as_u16().to_string()),
    ];
    counter!(HTTP_REQUESTS, &labels).increment(1);
    histogram!(HTTP_LATENCY, &labels).record(started.elapsed().as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmatched_route_label() {
        let request = Request::builder().uri("/api/clips/12345/qa").body(Body::empty()).unwrap();
        assert_eq!(route_label(&request), UNMATCHED_ROUTE);
    }
}
