//! Read-through response cache.
//!
//! Hit: count it, decode and return the stored payload.
//! Miss: count it, compute, store with the configured TTL, return.
//! Store trouble never reaches the caller; the layer falls back to
//! computing every time and logs once when it enters that state.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::CacheStore;
use crate::error::{ApiResult, CacheError};
use crate::metrics::MetricsRegistry;
use crate::pipeline::{Interceptor, Next, RequestIdentity};

/// Derives a store key from a request. Pluggable; see [`default_key`].
pub type KeyFn = Arc<dyn Fn(&str, &RequestIdentity) -> String + Send + Sync>;

/// `<prefix><METHOD>:<path>[?<query>]`. Headers are not part of the key.
pub fn default_key(prefix: &str, req: &RequestIdentity) -> String {
    match &req.query {
        Some(q) => format!("{prefix}{}:{}?{q}", req.method, req.path),
        None => format!("{prefix}{}:{}", req.method, req.path),
    }
}

pub struct ReadThroughCache {
    /// `None` when caching is switched off: pure pass-through, no counting.
    store: Option<Arc<dyn CacheStore>>,
    metrics: Arc<MetricsRegistry>,
    prefix: String,
    key_fn: KeyFn,
    /// Reads and writes fail independently (e.g. a read-only replica), so
    /// each direction keeps its own health flag.
    read_degraded: AtomicBool,
    write_degraded: AtomicBool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreOp {
    Read,
    Write,
}

impl ReadThroughCache {
    pub fn new(
        store: Option<Arc<dyn CacheStore>>,
        metrics: Arc<MetricsRegistry>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            metrics,
            prefix: prefix.into(),
            key_fn: Arc::new(default_key),
            read_degraded: AtomicBool::new(false),
            write_degraded: AtomicBool::new(false),
        }
    }

    pub fn with_key_fn(mut self, key_fn: KeyFn) -> Self {
        self.key_fn = key_fn;
        self
    }

    pub fn key_for(&self, req: &RequestIdentity) -> String {
        (self.key_fn)(&self.prefix, req)
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// True while the last lookup or the last write-back failed.
    pub fn is_degraded(&self) -> bool {
        self.read_degraded.load(Ordering::Relaxed) || self.write_degraded.load(Ordering::Relaxed)
    }

    pub async fn get_or_compute<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> ApiResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let Some(store) = self.store.as_ref() else {
            return compute().await;
        };

        let store_ok = match store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    self.mark_healthy(StoreOp::Read);
                    self.metrics.increment_cache_hit();
                    tracing::debug!(key, "cache hit");
                    return Ok(value);
                }
                Err(e) => {
                    self.mark_healthy(StoreOp::Read);
                    tracing::warn!(key, error = %e, "discarding undecodable cache entry");
                    true
                }
            },
            Ok(None) => {
                self.mark_healthy(StoreOp::Read);
                true
            }
            Err(e) => {
                self.mark_degraded(StoreOp::Read, &e);
                false
            }
        };

        self.metrics.increment_cache_miss();
        let value = compute().await?;

        if store_ok {
            self.write_back(store.as_ref(), key, &value, ttl).await;
        }

        Ok(value)
    }

    async fn write_back<T: Serialize>(
        &self,
        store: &dyn CacheStore,
        key: &str,
        value: &T,
        ttl: Duration,
    ) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key, error = %e, "payload not cacheable");
                return;
            }
        };

        match store.set_ex(key, &raw, ttl).await {
            Ok(()) => {
                self.mark_healthy(StoreOp::Write);
                tracing::debug!(key, ttl_secs = ttl.as_secs_f64(), "cache miss, stored");
            }
            Err(e) => self.mark_degraded(StoreOp::Write, &e),
        }
    }

    fn flag(&self, op: StoreOp) -> &AtomicBool {
        match op {
            StoreOp::Read => &self.read_degraded,
            StoreOp::Write => &self.write_degraded,
        }
    }

    fn mark_degraded(&self, op: StoreOp, err: &CacheError) {
        if self.flag(op).swap(true, Ordering::Relaxed) {
            tracing::debug!(?op, error = %err, "cache store still failing");
            return;
        }
        match op {
            StoreOp::Read => {
                tracing::warn!(error = %err, "cache store unavailable, serving uncached responses")
            }
            StoreOp::Write => {
                tracing::warn!(error = %err, "cache store rejecting writes, responses not cached")
            }
        }
    }

    fn mark_healthy(&self, op: StoreOp) {
        if self.flag(op).swap(false, Ordering::Relaxed) {
            tracing::info!(?op, "cache store reachable again");
        }
    }
}

// ─── Pipeline stage ──────────────────────────────────────────────

/// Puts a [`ReadThroughCache`] in front of the rest of a pipeline.
pub struct CacheStage {
    cache: Arc<ReadThroughCache>,
    ttl: Duration,
}

impl CacheStage {
    pub fn new(cache: Arc<ReadThroughCache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }
}

#[async_trait]
impl Interceptor for CacheStage {
    async fn intercept(&self, req: RequestIdentity, next: Next<'_>) -> ApiResult<Value> {
        let key = self.cache.key_for(&req);
        self.cache
            .get_or_compute(&key, self.ttl, move || next.run(req))
            .await
    }
}
