//! TTL-bounded response cache for idempotent, side-effect-free calls.
//!
//! Uses interior mutability with `RwLock` so callers share one cache behind
//! `&self`. Expired entries are discarded lazily on lookup; at capacity the
//! single oldest entry by insertion timestamp is evicted (bounded
//! FIFO-by-age, deliberately not LRU — lookups do not refresh timestamps).
//!
//! Caching is best-effort: a poisoned lock degrades to "no cache" and never
//! fails the surrounding request.

use std::sync::RwLock;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_CACHE_CAPACITY: usize = 128;

/// Deterministic cache key over everything that identifies a request:
/// method, URL, canonicalized (sorted) query parameters, and the JSON body
/// when one is present.
pub fn request_cache_key(
    method: &str,
    url: &str,
    query: &[(String, String)],
    body: Option<&Value>,
) -> String {
    let mut params: Vec<&(String, String)> = query.iter().collect();
    params.sort();

    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    for (name, value) in params {
        hasher.update(b"\n");
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
    }
    if let Some(body) = body {
        hasher.update(b"\n");
        hasher.update(body.to_string().as_bytes());
    }

    let digest = hasher.finalize();
    let mut key = String::with_capacity(digest.len() * 2);
    for byte in digest {
        key.push_str(&format!("{:02x}", byte));
    }
    key
}

/// Opaque cached payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub body: Bytes,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: CachedResponse,
    created_at: SystemTime,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        SystemTime::now()
            .duration_since(self.created_at)
            .map(|age| age > ttl)
            .unwrap_or(true)
    }
}

/// Hit/miss/eviction counters, reported as a snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub current_size: usize,
    pub max_size: usize,
}

struct CacheInner {
    entries: FxHashMap<String, CacheEntry>,
    capacity: usize,
    ttl: Duration,
    stats: CacheStats,
}

pub struct ResponseCache {
    inner: RwLock<CacheInner>,
}

impl ResponseCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(CacheInner {
                entries: FxHashMap::default(),
                capacity,
                ttl,
                stats: CacheStats {
                    max_size: capacity,
                    ..CacheStats::default()
                },
            }),
        }
    }

    /// Look up an entry, lazily discarding it when its age exceeds the TTL.
    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        let mut guard = self.inner.write().ok()?;
        let inner = &mut *guard;
        let ttl = inner.ttl;

        let expired = match inner.entries.get(key) {
            Some(entry) if !entry.is_expired(ttl) => {
                let payload = entry.payload.clone();
                inner.stats.hits += 1;
                return Some(payload);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            inner.entries.remove(key);
        }
        inner.stats.misses += 1;
        inner.stats.current_size = inner.entries.len();
        None
    }

    /// Insert an entry, evicting the globally oldest one first when the
    /// store is at capacity.
    pub fn put(&self, key: impl Into<String>, payload: CachedResponse) {
        let Ok(mut guard) = self.inner.write() else {
            return;
        };
        let inner = &mut *guard;
        let key = key.into();

        if !inner.entries.contains_key(&key) && inner.entries.len() >= inner.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                inner.entries.remove(&oldest);
                inner.stats.evictions += 1;
            }
        }

        inner.entries.insert(
            key,
            CacheEntry {
                payload,
                created_at: SystemTime::now(),
            },
        );
        inner.stats.current_size = inner.entries.len();
    }

    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.entries.clear();
            inner.stats.current_size = 0;
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.inner
            .read()
            .map(|inner| inner.stats.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn payload(text: &str) -> CachedResponse {
        CachedResponse {
            body: Bytes::copy_from_slice(text.as_bytes()),
            content_type: Some("application/json".to_owned()),
        }
    }

    #[test]
    fn round_trips_within_ttl() {
        let cache = ResponseCache::new(4, Duration::from_secs(60));
        cache.put("a", payload("alpha"));
        assert_eq!(cache.get("a"), Some(payload("alpha")));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn expired_entries_report_absent_and_are_removed() {
        let cache = ResponseCache::new(4, Duration::from_millis(20));
        cache.put("a", payload("alpha"));
        thread::sleep(Duration::from_millis(40));

        assert_eq!(cache.get("a"), None);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn put_at_capacity_evicts_the_oldest_entry() {
        let cache = ResponseCache::new(2, Duration::from_secs(60));
        cache.put("first", payload("1"));
        thread::sleep(Duration::from_millis(5));
        cache.put("second", payload("2"));
        thread::sleep(Duration::from_millis(5));
        cache.put("third", payload("3"));

        assert_eq!(cache.get("first"), None);
        assert_eq!(cache.get("second"), Some(payload("2")));
        assert_eq!(cache.get("third"), Some(payload("3")));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn overwriting_an_existing_key_does_not_evict() {
        let cache = ResponseCache::new(2, Duration::from_secs(60));
        cache.put("a", payload("1"));
        cache.put("b", payload("2"));
        cache.put("a", payload("refreshed"));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(payload("refreshed")));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn clear_empties_the_store() {
        let cache = ResponseCache::new(4, Duration::from_secs(60));
        cache.put("a", payload("1"));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn cache_keys_are_deterministic_and_order_insensitive() {
        let q1 = vec![
            ("page".to_owned(), "1".to_owned()),
            ("query".to_owned(), "apfel".to_owned()),
        ];
        let q2 = vec![
            ("query".to_owned(), "apfel".to_owned()),
            ("page".to_owned(), "1".to_owned()),
        ];
        let k1 = request_cache_key("GET", "https://api.example.com/search", &q1, None);
        let k2 = request_cache_key("GET", "https://api.example.com/search", &q2, None);
        assert_eq!(k1, k2);

        let k3 = request_cache_key("GET", "https://api.example.com/search", &[], None);
        assert_ne!(k1, k3);

        let body = serde_json::json!({"q": "apfel", "target": "en"});
        let k4 = request_cache_key("POST", "https://api.example.com/translate", &[], Some(&body));
        let k5 = request_cache_key("POST", "https://api.example.com/translate", &[], Some(&body));
        assert_eq!(k4, k5);
    }
}
