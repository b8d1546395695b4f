//! In-memory read-through cache using DashMap

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Key/value cache with per-entry TTL. Values are JSON bytes.
pub struct MemoryCache {
    data: Arc<DashMap<String, CacheEntry>>,
    default_ttl: Duration,
}

struct CacheEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|expires| now > expires).unwrap_or(false)
    }
}

impl MemoryCache {
    pub fn new(default_ttl: Duration) -> Self {
        let cache = Self {
            data: Arc::new(DashMap::new()),
            default_ttl,
        };

        cache.start_cleanup_task();

        cache
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let entry = self.data.get(key)?;
        if entry.is_expired(Instant::now()) {
            drop(entry);
            self.data.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    /// Set a value without expiry
    #[cfg(test)]
    pub fn set(&self, key: String, value: Vec<u8>) {
        self.data.insert(
            key,
            CacheEntry {
                value,
                expires_at: None,
            },
        );
    }

    pub fn set_with_ttl(&self, key: String, value: Vec<u8>, ttl: Duration) {
        self.data.insert(
            key,
            CacheEntry {
                value,
                expires_at: Some(Instant::now() + ttl),
            },
        );
    }

    pub fn delete(&self, key: &str) {
        self.data.remove(key);
    }

    /// Drop every key starting with `prefix` (e.g. `minervals:`).
    pub fn delete_prefix(&self, prefix: &str) {
        self.data.retain(|key, _| !key.starts_with(prefix));
    }

    #[cfg(test)]
    pub fn exists(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Get and delete
    #[cfg(test)]
    pub fn take(&self, key: &str) -> Option<Vec<u8>> {
        let (_, entry) = self.data.remove(key)?;
        if entry.is_expired(Instant::now()) {
            return None;
        }
        Some(entry.value)
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.get(key)?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Dropping undecodable cache entry {}: {}", key, e);
                self.delete(key);
                None
            }
        }
    }

    pub fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.set_with_ttl(key.to_string(), bytes, ttl),
            Err(e) => warn!("Failed to encode cache entry {}: {}", key, e),
        }
    }

    /// Returns the cached value for `key`, or runs `fetch` and caches its
    /// result for `ttl`. Errors from `fetch` are returned and never cached.
    pub async fn cached<T, E, F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get_json::<T>(key) {
            debug!("Cache hit: {}", key);
            return Ok(value);
        }

        debug!("Cache miss: {}", key);
        let value = fetch().await?;
        self.set_json(key, &value, ttl);
        Ok(value)
    }

    fn start_cleanup_task(&self) {
        let data = self.data.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                let now = Instant::now();
                data.retain(|_, entry| !entry.is_expired(now));
            }
        });
    }
}
