//! Client configuration loaded from the environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::ConfigError;

/// Settings shared by every request issued through one client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend origin, e.g. `https://api.shop.example`
    pub base_url: String,
    /// Optional version segment inserted before every path, e.g. `v1`
    pub api_version: Option<String>,
    pub timeout: Duration,
    pub retries: u32,
    pub retry_delay: Duration,
    /// TTL for cache-aside reads in services
    pub cache_ttl: Duration,
    /// Emit audit entries for mutations
    pub audit: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_version: None,
            timeout: Duration::from_secs(30),
            retries: 0,
            retry_delay: Duration::from_millis(1000),
            cache_ttl: Duration::from_secs(300),
            audit: false,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Reads configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("NEXT_PUBLIC_BACKEND_URL")
            .or_else(|| lookup("NEXT_PUBLIC_API_END_POINT"))
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("NEXT_PUBLIC_BACKEND_URL".to_string()))?;

        url::Url::parse(&base_url).map_err(|e| ConfigError::InvalidValue {
            key: "NEXT_PUBLIC_BACKEND_URL".to_string(),
            message: e.to_string(),
        })?;

        let defaults = Self::default();
        Ok(Self {
            base_url,
            api_version: lookup("API_VERSION").filter(|v| !v.is_empty()),
            timeout: parse_or(&lookup, "API_TIMEOUT_MS", defaults.timeout, Duration::from_millis)?,
            retries: parse_or(&lookup, "API_RETRIES", defaults.retries, |v| v)?,
            retry_delay: parse_or(
                &lookup,
                "API_RETRY_DELAY_MS",
                defaults.retry_delay,
                Duration::from_millis,
            )?,
            cache_ttl: parse_or(
                &lookup,
                "API_CACHE_TTL_SECS",
                defaults.cache_ttl,
                Duration::from_secs,
            )?,
            audit: parse_or(&lookup, "API_AUDIT", defaults.audit, |v| v)?,
        })
    }
}

fn parse_or<F, V, T>(lookup: &F, key: &str, default: T, map: impl Fn(V) -> T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    V: FromStr,
    V::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<V>()
            .map(map)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
    }
}
