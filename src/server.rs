use axum::{http::StatusCode, middleware as axum_mw, response::Response, routing::get, Router};
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;

use crate::error::AppError;
use crate::handlers;
use crate::metrics::export::{self, METRICS_PATH};
use crate::metrics::MetricsRegistry;
use crate::middleware::instrumentation_middleware;
use crate::AppState;

/// Builds the full Axum `Router` with all routes and middleware.
pub fn create_router(state: Arc<AppState>) -> Router {
    let routes = Router::new()
        // ── Business endpoints ──────────────────────────────────
        .route("/hora", get(handlers::hora::get_hora))
        .route("/texto", get(handlers::texto::get_texto))
        .route("/health", get(handlers::health::health))
        // ── Metrics ─────────────────────────────────────────────
        .route(METRICS_PATH, get(export::get_metrics))
        // ── Provide shared state to all routes above ────────────
        .with_state(Arc::clone(&state));

    with_middleware(routes, Arc::clone(&state.metrics))
}

/// Global middleware (applied bottom-up): panics are turned into a 500
/// first, so the instrumentation layer above them still counts the request.
pub fn with_middleware(routes: Router, metrics: Arc<MetricsRegistry>) -> Router {
    routes
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(axum_mw::from_fn_with_state(metrics, instrumentation_middleware))
        .layer(CorsLayer::permissive())
}

/// A panicking handler becomes a plain 500 with a `detail` body.
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_owned()
    } else {
        "handler panicked".to_owned()
    };

    tracing::error!(panic = %message, "handler panicked");
    axum::response::IntoResponse::into_response(AppError::with_status(
        StatusCode::INTERNAL_SERVER_ERROR,
        message,
    ))
}
