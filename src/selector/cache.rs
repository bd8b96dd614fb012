//! Caching layer for information point responses.
//!
//! Selectors on hot policy paths tend to ask the same question for every
//! request. The cache sits between a [`PipSelector`](super::PipSelector) and
//! its client and keeps recent answers for a limited time.

use super::pip::{PipAttribute, PipClient};
use crate::error::Result;

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cache statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Cache hits
    pub hits: u64,
    /// Cache misses
    pub misses: u64,
    /// Current number of entries
    pub size: usize,
    /// Hit rate in percent
    pub hit_rate: f64,
}

/// PIP client wrapper caching responses.
#[derive(Debug)]
pub struct CachingPipClient {
    inner: Arc<dyn PipClient>,
    l1: Mutex<LruCache<String, CachedResponse>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug)]
struct CachedResponse {
    attributes: Vec<PipAttribute>,
    expires_at: Instant,
}

impl CachingPipClient {
    /// Wrap a client with a cache of at most `max_entries` answers.
    pub fn new(inner: Arc<dyn PipClient>, max_entries: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            l1: Mutex::new(LruCache::new(capacity)),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn get(&self, key: &str) -> Option<Vec<PipAttribute>> {
        let mut cache = self.l1.lock();

        if let Some(cached) = cache.get(key) {
            if cached.expires_at > Instant::now() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(cached.attributes.clone());
            }
            cache.pop(key);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn put(&self, key: String, attributes: &[PipAttribute]) {
        let cached = CachedResponse {
            attributes: attributes.to_vec(),
            expires_at: Instant::now() + self.ttl,
        };

        self.l1.lock().put(key, cached);
    }

    /// Clear all cached entries.
    pub fn clear(&self) {
        self.l1.lock().clear();
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        CacheStats {
            hits,
            misses,
            size: self.l1.lock().len(),
            hit_rate,
        }
    }

    fn compute_key(content: &str, item: &str, args: &[PipAttribute]) -> String {
        let mut hasher = blake3::Hasher::new();
        for part in [content, item] {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        for a in args {
            for part in [&a.id, &a.type_key, &a.value] {
                hasher.update(&(part.len() as u64).to_le_bytes());
                hasher.update(part.as_bytes());
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

impl PipClient for CachingPipClient {
    fn query(&self, content: &str, item: &str, args: &[PipAttribute]) -> Result<Vec<PipAttribute>> {
        let key = Self::compute_key(content, item, args);
        if let Some(attributes) = self.get(&key) {
            return Ok(attributes);
        }

        let attributes = self.inner.query(content, item, args)?;
        self.put(key, &attributes);
        Ok(attributes)
    }
}
