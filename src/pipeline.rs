//! Explicit handler wrapping.
//!
//! A [`Pipeline`] is a handler plus an ordered list of [`Interceptor`]s.
//! The first interceptor in the list is the outermost one: for
//! `[cache, timing]` the cache sees the call first and timing only runs
//! when the cache decides to compute.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, Method, Uri},
};
use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::ApiResult;

// ─── Request identity ────────────────────────────────────────────

/// What a handler invocation is about. Also the default cache key input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
}

impl RequestIdentity {
    pub fn new(method: Method, uri: &Uri) -> Self {
        Self {
            method,
            path: uri.path().to_owned(),
            query: uri.query().filter(|q| !q.is_empty()).map(str::to_owned),
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::new(parts.method.clone(), &parts.uri))
    }
}

// ─── Handler & interceptor contracts ─────────────────────────────

pub type HandlerFn =
    Arc<dyn Fn(RequestIdentity) -> BoxFuture<'static, ApiResult<Value>> + Send + Sync>;

/// One wrapping stage. Implementations call `next.run(req)` zero or one
/// times and may inspect or replace the result.
#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn intercept(&self, req: RequestIdentity, next: Next<'_>) -> ApiResult<Value>;
}

/// The remainder of the chain, handed to an interceptor.
pub struct Next<'a> {
    handler_name: &'a str,
    stages: &'a [Arc<dyn Interceptor>],
    handler: &'a HandlerFn,
}

impl<'a> Next<'a> {
    pub fn handler_name(&self) -> &'a str {
        self.handler_name
    }

    pub async fn run(self, req: RequestIdentity) -> ApiResult<Value> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                let next = Next {
                    handler_name: self.handler_name,
                    stages: rest,
                    handler: self.handler,
                };
                stage.intercept(req, next).await
            }
            None => (self.handler)(req).await,
        }
    }
}

// ─── Pipeline ────────────────────────────────────────────────────

pub struct Pipeline {
    name: &'static str,
    stages: Vec<Arc<dyn Interceptor>>,
    handler: HandlerFn,
}

impl Pipeline {
    pub fn new<F, Fut>(name: &'static str, handler: F) -> Self
    where
        F: Fn(RequestIdentity) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<Value>> + Send + 'static,
    {
        Self {
            name,
            stages: Vec::new(),
            handler: Arc::new(move |req| -> BoxFuture<'static, ApiResult<Value>> {
                Box::pin(handler(req))
            }),
        }
    }

    /// Appends `stage` inside every stage added before it.
    pub fn with(mut self, stage: Arc<dyn Interceptor>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn call(&self, req: RequestIdentity) -> ApiResult<Value> {
        Next {
            handler_name: self.name,
            stages: &self.stages,
            handler: &self.handler,
        }
        .run(req)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use parking_lot::Mutex;

    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Interceptor for Recorder {
        async fn intercept(&self, req: RequestIdentity, next: Next<'_>) -> ApiResult<Value> {
            self.log.lock().push(format!("enter {}", self.label));
            let out = next.run(req).await;
            self.log.lock().push(format!("leave {}", self.label));
            out
        }
    }

    struct ShortCircuit;

    #[async_trait]
    impl Interceptor for ShortCircuit {
        async fn intercept(&self, _req: RequestIdentity, _next: Next<'_>) -> ApiResult<Value> {
            Ok(Value::from("short"))
        }
    }

    fn identity(uri: &str) -> RequestIdentity {
        RequestIdentity::new(Method::GET, &uri.parse().unwrap())
    }

    #[tokio::test]
    async fn stages_run_in_list_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler_log = Arc::clone(&log);

        let pipeline = Pipeline::new("probe", move |_req| {
            let log = Arc::clone(&handler_log);
            async move {
                log.lock().push("handler".into());
                Ok(Value::from(1))
            }
        })
        .with(Arc::new(Recorder { label: "outer", log: Arc::clone(&log) }))
        .with(Arc::new(Recorder { label: "inner", log: Arc::clone(&log) }));

        let out = pipeline.call(identity("/x")).await.unwrap();
        assert_eq!(out, Value::from(1));
        assert_eq!(
            *log.lock(),
            vec!["enter outer", "enter inner", "handler", "leave inner", "leave outer"]
        );
    }

    #[tokio::test]
    async fn interceptor_can_skip_the_handler() {
        let pipeline = Pipeline::new("never", |_req| async {
            Err::<Value, _>(AppError::internal("must not run"))
        })
        .with(Arc::new(ShortCircuit));

        assert_eq!(pipeline.call(identity("/x")).await.unwrap(), Value::from("short"));
    }

    #[tokio::test]
    async fn handler_errors_propagate_through_stages() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new("failing", |_req| async {
            Err::<Value, _>(AppError::internal("boom"))
        })
        .with(Arc::new(Recorder { label: "only", log }));

        let err = pipeline.call(identity("/x")).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn identity_keeps_path_and_non_empty_query() {
        let id = identity("/texto?lang=pt");
        assert_eq!(id.path, "/texto");
        assert_eq!(id.query.as_deref(), Some("lang=pt"));
        assert_eq!(identity("/texto?").query, None);
    }
}
