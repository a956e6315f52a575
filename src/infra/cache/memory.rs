//! In-process cache store with per-entry expiry.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::domain::{AppError, CacheError, CacheStore};

struct CachedEntry {
    value: Value,
    /// `None` when the TTL reaches past what `Instant` can represent
    expires_at: Option<Instant>,
}

impl CachedEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Cache backed by a `HashMap`. Expired entries are dropped lazily on read
/// or eagerly via [`InMemoryCache::purge_expired`].
#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, CachedEntry>>,
}

impl InMemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes expired entries, returns how many were dropped.
    pub fn purge_expired(&self) -> Result<usize, AppError> {
        let mut entries = self.lock()?;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged = purged, "Purged expired cache entries");
        }
        Ok(purged)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, CachedEntry>>, AppError> {
        self.entries
            .lock()
            .map_err(|e| AppError::Cache(CacheError::Backend(e.to_string())))
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, AppError> {
        let mut entries = self.lock()?;
        match entries.get(key) {
            Some(entry) if entry.is_live(Instant::now()) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), AppError> {
        let expires_at = Instant::now().checked_add(ttl);
        self.lock()?
            .insert(key.to_string(), CachedEntry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        Ok(self.lock()?.remove(key).is_some())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, AppError> {
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - entries.len())
    }
}
