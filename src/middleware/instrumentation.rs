use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::export::METRICS_PATH;
use crate::metrics::MetricsRegistry;

/// Outermost layer: counts every request and observes its latency.
///
/// The scrape path is passed through untouched. Labels use the concrete
/// request path, not the route template, so `/a/1` and `/a/2` are separate
/// series. Requests dropped before a response exists record nothing.
pub async fn instrumentation_middleware(
    State(metrics): State<Arc<MetricsRegistry>>,
    req: Request,
    next: Next,
) -> Response {
    if req.uri().path() == METRICS_PATH {
        return next.run(req).await;
    }

    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let start = Instant::now();
    let response = next.run(req).await;
    let elapsed = start.elapsed().as_secs_f64();

    let status = response.status().as_u16();

    let recorded = record_best_effort(|| {
        metrics.increment_request(method.as_str(), &path, status);
        metrics.observe_latency(&path, elapsed);
    });
    if !recorded {
        tracing::error!(%method, %path, status, "failed to record request metrics");
    }

    tracing::debug!(%method, %path, status, elapsed_ms = elapsed * 1000.0, "request completed");

    response
}

/// Runs `record`, swallowing a panic. Returns false when it panicked.
/// Metrics must never cost a request its response.
fn record_best_effort<F: FnOnce()>(record: F) -> bool {
    catch_unwind(AssertUnwindSafe(record)).is_ok()
}
