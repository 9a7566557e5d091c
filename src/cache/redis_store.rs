use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use super::CacheStore;
use crate::error::CacheError;

/// Redis-backed [`CacheStore`].
///
/// The `ConnectionManager` is created on first use rather than at startup so
/// the service can boot while Redis is down. It is cheaply cloneable; every
/// clone shares one multiplexed connection.
///
/// Every call, connect included, finishes within `timeout`. Only one connect
/// is in flight at a time; concurrent callers fail fast instead of queueing
/// behind it. After a failure the manager is dropped and calls fail fast until
/// `backoff` has elapsed.
pub struct RedisStore {
    client: redis::Client,
    slot: Mutex<Slot>,
    timeout: Duration,
    backoff: Duration,
}

#[derive(Default)]
struct Slot {
    conn: Option<ConnectionManager>,
    connecting: bool,
    retry_at: Option<Instant>,
}

/// Clears `connecting` even when the connect future is dropped mid-flight.
/// Unless `finish` ran, the attempt counts as failed.
struct ConnectAttempt<'a> {
    store: &'a RedisStore,
    done: bool,
}

impl ConnectAttempt<'_> {
    fn finish(mut self, conn: ConnectionManager) {
        let mut slot = self.store.slot.lock();
        slot.conn = Some(conn);
        slot.connecting = false;
        slot.retry_at = None;
        self.done = true;
    }
}

impl Drop for ConnectAttempt<'_> {
    fn drop(&mut self) {
        if !self.done {
            let mut slot = self.store.slot.lock();
            slot.connecting = false;
            slot.retry_at = Some(Instant::now() + self.store.backoff);
        }
    }
}

pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

impl RedisStore {
    /// Only validates the URL; no network I/O happens here.
    pub fn open(url: &str, timeout: Duration) -> Result<Self, CacheError> {
        Ok(Self {
            client: redis::Client::open(url)?,
            slot: Mutex::new(Slot::default()),
            timeout,
            backoff: DEFAULT_BACKOFF,
        })
    }

    /// How long calls fail fast after a failed round trip.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let attempt = {
            let mut slot = self.slot.lock();
            if let Some(conn) = slot.conn.as_ref() {
                return Ok(conn.clone());
            }
            if slot.connecting {
                return Err(CacheError::Unavailable("connect already in progress".into()));
            }
            if let Some(at) = slot.retry_at {
                if Instant::now() < at {
                    return Err(CacheError::Unavailable("backing off after failure".into()));
                }
            }
            slot.connecting = true;
            ConnectAttempt { store: self, done: false }
        };

        tracing::debug!("opening redis connection");
        let conn = ConnectionManager::new(self.client.clone()).await?;
        attempt.finish(conn.clone());
        tracing::info!("redis connection established");
        Ok(conn)
    }

    /// Runs `op` on a connection under a single deadline covering connect
    /// and command.
    async fn run<T, F, Fut>(&self, op: F) -> Result<T, CacheError>
    where
        F: FnOnce(ConnectionManager) -> Fut,
        Fut: Future<Output = Result<T, redis::RedisError>>,
    {
        let call = async {
            let conn = self.connection().await?;
            Ok::<_, CacheError>(op(conn).await?)
        };

        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(self.timeout)),
        };

        if let Err(e) = &result {
            if !matches!(e, CacheError::Unavailable(_)) {
                self.reset();
            }
        }
        result
    }

    fn reset(&self) {
        let mut slot = self.slot.lock();
        slot.conn = None;
        let retry_at = Instant::now() + self.backoff;
        if slot.retry_at.map_or(true, |at| at < retry_at) {
            slot.retry_at = Some(retry_at);
        }
    }
}

/// `PX` argument: keeps sub-second TTLs; Redis rejects a zero expiry.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.run(|mut conn| async move { conn.get::<_, Option<String>>(key).await })
            .await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("PX").arg(ttl_millis(ttl));

        self.run(|mut conn| async move { cmd.query_async::<_, ()>(&mut conn).await })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    /// Accepts TCP connections and never answers, like a blackholed server.
    async fn silent_listener() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("redis://{addr}/")
    }

    #[test]
    fn open_rejects_malformed_url() {
        assert!(RedisStore::open("not a url", Duration::from_millis(10)).is_err());
    }

    #[test]
    fn ttl_millis_saturates_and_never_hits_zero() {
        assert_eq!(ttl_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(ttl_millis(Duration::ZERO), 1);
        assert_eq!(ttl_millis(Duration::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn unreachable_server_yields_error_not_panic() {
        // Port 1 is reserved; nothing listens there.
        let store = RedisStore::open("redis://127.0.0.1:1/", Duration::from_millis(200))
            .unwrap()
            .with_backoff(Duration::ZERO);
        assert!(store.get("k").await.is_err());
        assert!(store.set_ex("k", "v", Duration::from_secs(1)).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_calls_against_silent_server_stay_within_one_timeout() {
        let timeout = Duration::from_millis(300);
        let store = Arc::new(RedisStore::open(&silent_listener().await, timeout).unwrap());

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    let start = std::time::Instant::now();
                    let result = store.get("k").await;
                    (result.is_err(), start.elapsed())
                })
            })
            .collect();

        let mut worst = Duration::ZERO;
        for handle in handles {
            let (failed, elapsed) = handle.await.unwrap();
            assert!(failed);
            worst = worst.max(elapsed);
        }
        assert!(worst < timeout * 2, "worst call took {worst:?}");
    }

    #[tokio::test]
    async fn calls_fail_fast_while_backing_off() {
        let timeout = Duration::from_millis(200);
        let store = RedisStore::open(&silent_listener().await, timeout)
            .unwrap()
            .with_backoff(Duration::from_secs(30));

        assert!(matches!(store.get("k").await, Err(CacheError::Timeout(_))));

        let start = std::time::Instant::now();
        assert!(matches!(store.get("k").await, Err(CacheError::Unavailable(_))));
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
