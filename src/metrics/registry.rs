//! Process-wide instrument set.
//!
//! Built once in `main` and handed to every component through `AppState`.
//! Unlabeled counters are plain atomics; labeled families each carry their
//! own mutex, so increments on different families never contend.

use super::{Counter, CounterVec, HistogramSeries, HistogramVec};

pub const REQUESTS_TOTAL: &str = "app_requisicoes_total";
pub const REQUEST_LATENCY_SECONDS: &str = "app_latencia_requisicoes_segundos";
pub const CACHE_HITS_TOTAL: &str = "app_cache_hits_total";
pub const CACHE_MISSES_TOTAL: &str = "app_cache_misses_total";

const REQUEST_LABELS: &[&str] = &["metodo", "endpoint", "status"];
const LATENCY_LABELS: &[&str] = &["endpoint"];

pub struct MetricsRegistry {
    requests: CounterVec,
    latency: HistogramVec,
    cache_hits: Counter,
    cache_misses: Counter,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            requests: CounterVec::new(REQUESTS_TOTAL, "Total de requisições", REQUEST_LABELS),
            latency: HistogramVec::new(
                REQUEST_LATENCY_SECONDS,
                "Latência das requisições em segundos",
                LATENCY_LABELS,
            ),
            cache_hits: Counter::new(CACHE_HITS_TOTAL, "Total de cache hits"),
            cache_misses: Counter::new(CACHE_MISSES_TOTAL, "Total de cache misses"),
        }
    }

    // ── Write side ──────────────────────────────────────────────

    pub fn increment_request(&self, method: &str, endpoint: &str, status: u16) {
        let status = status.to_string();
        self.requests.inc(&[method, endpoint, status.as_str()]);
    }

    pub fn observe_latency(&self, endpoint: &str, seconds: f64) {
        self.latency.observe(&[endpoint], seconds);
    }

    #[inline]
    pub fn increment_cache_hit(&self) {
        self.cache_hits.inc();
    }

    #[inline]
    pub fn increment_cache_miss(&self) {
        self.cache_misses.inc();
    }

    // ── Read side ───────────────────────────────────────────────

    pub fn request_count(&self, method: &str, endpoint: &str, status: u16) -> u64 {
        let status = status.to_string();
        self.requests.get(&[method, endpoint, status.as_str()])
    }

    pub fn latency(&self, endpoint: &str) -> Option<HistogramSeries> {
        self.latency.series(&[endpoint])
    }

    /// Number of latency observations recorded for `endpoint`.
    pub fn latency_count(&self, endpoint: &str) -> u64 {
        self.latency(endpoint).map(|s| s.count).unwrap_or(0)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.get()
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.get()
    }

    /// Text exposition of every instrument. Each family is read under its
    /// own lock; families are not snapshotted atomically with each other.
    pub fn export(&self) -> String {
        let mut out = String::with_capacity(4096);
        self.requests.render(&mut out);
        self.latency.render(&mut out);
        self.cache_hits.render(&mut out);
        self.cache_misses.render(&mut out);
        out
    }
}
