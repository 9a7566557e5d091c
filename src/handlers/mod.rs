pub mod health;
pub mod hora;
pub mod texto;

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheStage, ReadThroughCache};
use crate::middleware::Timing;
use crate::pipeline::Pipeline;

// ─── Route pipelines ─────────────────────────────────────────────

/// Wrapping order for each business route, outermost first.
///
///   /hora   → [timing]          output changes every second, never cached
///   /texto  → [cache, timing]   timing only runs on a cache miss
pub struct Routes {
    pub hora: Pipeline,
    pub texto: Pipeline,
}

impl Routes {
    pub fn new(cache: Arc<ReadThroughCache>, ttl: Duration) -> Self {
        Self {
            hora: Pipeline::new("hora_servidor", hora::server_time).with(Arc::new(Timing)),
            texto: Pipeline::new("texto_fixo", texto::welcome_text)
                .with(Arc::new(CacheStage::new(cache, ttl)))
                .with(Arc::new(Timing)),
        }
    }
}
