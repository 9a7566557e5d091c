use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
};
use std::sync::Arc;

use crate::AppState;

/// Path served by [`get_metrics`]. The instrumentation layer skips it.
pub const METRICS_PATH: &str = "/metricas";

pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

// ─── GET /metricas ───────────────────────────────────────────────

/// Pull-based scrape endpoint.
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
        state.metrics.export(),
    )
}
