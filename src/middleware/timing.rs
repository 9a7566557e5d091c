use async_trait::async_trait;
use serde_json::Value;
use std::time::Instant;

use crate::error::ApiResult;
use crate::pipeline::{Interceptor, Next, RequestIdentity};

/// Handler-level stopwatch. Logs one line per invocation:
///
///   `<handler> executed in <ms> ms`
///
/// The wrapped result, success or failure, is returned untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct Timing;

#[async_trait]
impl Interceptor for Timing {
    async fn intercept(&self, req: RequestIdentity, next: Next<'_>) -> ApiResult<Value> {
        let handler = next.handler_name();

        let start = Instant::now();
        let result = next.run(req).await;
        let ms = start.elapsed().as_secs_f64() * 1000.0;

        tracing::info!(handler, elapsed_ms = ms, ok = result.is_ok(), "{handler} executed in {ms:.5} ms");

        result
    }
}
