use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Runtime settings, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When false the cache layer is a pure pass-through.
    pub enabled: bool,
    pub redis_url: String,
    /// Prepended to every derived key.
    pub prefix: String,
    pub ttl: Duration,
    /// Upper bound on a single store round trip.
    pub timeout: Duration,
    /// How long store calls fail fast after a failed round trip.
    pub backoff: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            cache: CacheConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            redis_url: "redis://127.0.0.1:6379/".into(),
            prefix: "api-cache:".into(),
            ttl: Duration::from_secs(60),
            timeout: Duration::from_millis(500),
            backoff: Duration::from_secs(1),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or(defaults.host),
            port: parse_var("APP_PORT")?.unwrap_or(defaults.port),
            cache: CacheConfig {
                enabled: parse_var("CACHE_ENABLED")?.unwrap_or(defaults.cache.enabled),
                redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.cache.redis_url),
                prefix: std::env::var("CACHE_PREFIX").unwrap_or(defaults.cache.prefix),
                ttl: parse_var("CACHE_TTL_SECS")?
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.cache.ttl),
                timeout: parse_var("REDIS_TIMEOUT_MS")?
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.cache.timeout),
                backoff: parse_var("REDIS_BACKOFF_MS")?
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.cache.backoff),
            },
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) => parse_value(var, &raw).map(Some),
        Err(_) => Ok(None),
    }
}

fn parse_value<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        value: raw.to_owned(),
        reason: e.to_string(),
    })
}
