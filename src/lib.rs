//! Small HTTP API with a request-instrumentation pipeline: per-request
//! counters and latency histograms, a handler stopwatch, and an optional
//! Redis read-through cache.

pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod pipeline;
pub mod server;

use std::sync::Arc;

use cache::{CacheStore, ReadThroughCache};
use config::Config;
use handlers::Routes;
use metrics::MetricsRegistry;

pub use error::{ApiResult, AppError};
pub use server::create_router;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Single registry for the whole process; also read by `/metricas`.
    pub metrics: Arc<MetricsRegistry>,

    /// Shared by every cached route.
    pub cache: Arc<ReadThroughCache>,

    /// Per-route wrapping pipelines.
    pub routes: Routes,
}

impl AppState {
    /// `store` is `None` when caching is disabled.
    pub fn new(
        config: &Config,
        metrics: Arc<MetricsRegistry>,
        store: Option<Arc<dyn CacheStore>>,
    ) -> Self {
        let cache = Arc::new(ReadThroughCache::new(
            store,
            Arc::clone(&metrics),
            config.cache.prefix.clone(),
        ));

        Self {
            routes: Routes::new(Arc::clone(&cache), config.cache.ttl),
            metrics,
            cache,
        }
    }
}
