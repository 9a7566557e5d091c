#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use parking_lot::Mutex;
use tokio::time::Instant;
use tower::ServiceExt;

use instrumented_api::cache::CacheStore;
use instrumented_api::config::Config;
use instrumented_api::error::CacheError;
use instrumented_api::metrics::MetricsRegistry;
use instrumented_api::{create_router, AppState};

/// In-process stand-in for Redis. Expiry follows tokio's clock so tests can
/// pause and advance time.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
    pub gets: AtomicUsize,
    pub sets: AtomicUsize,
}

impl MemoryStore {
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((_, expires)) if Instant::now() >= *expires => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .insert(key.to_owned(), (value.to_owned(), Instant::now() + ttl));
        Ok(())
    }
}

/// Store that refuses every call, like Redis being down.
pub struct DownStore;

#[async_trait]
impl CacheStore for DownStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
}

pub struct TestApp {
    pub router: Router,
    pub metrics: Arc<MetricsRegistry>,
}

pub fn create_test_app(store: Option<Arc<dyn CacheStore>>) -> TestApp {
    let metrics = Arc::new(MetricsRegistry::new());
    let state = Arc::new(AppState::new(&Config::default(), Arc::clone(&metrics), store));
    TestApp {
        router: create_router(state),
        metrics,
    }
}

pub async fn get(router: &Router, uri: &str) -> Response<Body> {
    router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn get_ok_json(router: &Router, uri: &str) -> serde_json::Value {
    let response = get(router, uri).await;
    assert_eq!(response.status(), StatusCode::OK, "GET {uri}");
    serde_json::from_str(&body_string(response).await).unwrap()
}
