use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use instrumented_api::cache::{CacheStore, RedisStore};
use instrumented_api::config::Config;
use instrumented_api::metrics::MetricsRegistry;
use instrumented_api::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // A missing .env is fine; everything has a default.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("instrumented_api=info,tower_http=warn")),
        )
        .init();

    // ── 1. Configuration ─────────────────────────────────────────
    let config = Config::from_env()?;

    // ── 2. Cache store (connects lazily) ─────────────────────────
    let store: Option<Arc<dyn CacheStore>> = if config.cache.enabled {
        tracing::info!(
            url = %config.cache.redis_url,
            ttl_secs = config.cache.ttl.as_secs(),
            "response cache enabled"
        );
        Some(Arc::new(
            RedisStore::open(&config.cache.redis_url, config.cache.timeout)?
                .with_backoff(config.cache.backoff),
        ))
    } else {
        tracing::info!("response cache disabled");
        None
    };

    // ── 3. Build shared state ────────────────────────────────────
    let metrics = Arc::new(MetricsRegistry::new());
    let state = Arc::new(AppState::new(&config, metrics, store));

    // ── 4. Build Axum router ─────────────────────────────────────
    let app = create_router(state);

    // ── 5. Bind & serve ──────────────────────────────────────────
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
