pub mod layer;
pub mod redis_store;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::CacheError;

pub use layer::{default_key, CacheStage, KeyFn, ReadThroughCache};
pub use redis_store::RedisStore;

/// The external key-value store, reduced to the two calls the cache needs.
/// Expiry is the store's job once the TTL has been handed over.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
}
