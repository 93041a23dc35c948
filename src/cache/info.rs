//! TTL-bounded lookup cache

use std::time::{Duration, Instant};

use linked_hash_map::LinkedHashMap;
use parking_lot::RwLock;

use crate::protocol::VideoInfo;

struct CachedInfo {
    info: VideoInfo,
    stored_at: Instant,
}

/// Thread-safe lookup cache keyed by the raw request URL.
///
/// An entry is valid for `ttl` after insertion; expired entries read as
/// absent and are dropped on contact. The map never grows past `capacity`
/// entries; the least recently used entry is evicted first.
pub struct InfoCache {
    inner: RwLock<LinkedHashMap<String, CachedInfo>>,
    capacity: usize,
    ttl: Duration,
}

impl InfoCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(LinkedHashMap::new()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Get a fresh entry, refreshing its LRU position.
    pub fn get(&self, url: &str) -> Option<VideoInfo> {
        let mut inner = self.inner.write();

        match inner.get_refresh(url) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                return Some(entry.info.clone());
            }
            Some(_) => {}
            None => return None,
        }

        // Entry exists but has expired
        inner.remove(url);
        None
    }

    /// Insert or overwrite an entry, sweeping expired entries and evicting
    /// LRU-first when at capacity.
    pub fn put(&self, url: String, info: VideoInfo) {
        let mut inner = self.inner.write();
        inner.remove(&url);

        let expired: Vec<String> = inner
            .iter()
            .filter(|(_, entry)| entry.stored_at.elapsed() >= self.ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            inner.remove(&key);
        }

        while inner.len() >= self.capacity {
            if inner.pop_front().is_none() {
                break;
            }
        }

        inner.insert(
            url,
            CachedInfo {
                info,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FormatBuckets;

    fn info(title: &str) -> VideoInfo {
        VideoInfo {
            title: title.to_string(),
            duration: 60.0,
            view_count: 1,
            uploader: "someone".to_string(),
            formats: FormatBuckets::default(),
            thumbnail: String::new(),
            description: String::new(),
        }
    }

    #[test]
    fn hit_within_ttl_returns_stored_value() {
        let cache = InfoCache::new(8, Duration::from_secs(60));
        cache.put("u1".to_string(), info("first"));
        assert_eq!(cache.get("u1").unwrap().title, "first");
    }

    #[test]
    fn expired_entry_reads_as_absent() {
        let cache = InfoCache::new(8, Duration::from_millis(5));
        cache.put("u1".to_string(), info("first"));
        std::thread::sleep(Duration::from_millis(10));
        assert!(cache.get("u1").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn overwrite_replaces_previous_entry() {
        let cache = InfoCache::new(8, Duration::from_secs(60));
        cache.put("u1".to_string(), info("first"));
        cache.put("u1".to_string(), info("second"));
        assert_eq!(cache.get("u1").unwrap().title, "second");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn lru_eviction_at_capacity() {
        let cache = InfoCache::new(2, Duration::from_secs(60));
        cache.put("a".to_string(), info("a"));
        cache.put("b".to_string(), info("b"));

        // Touch "a" so "b" becomes the eviction candidate
        assert!(cache.get("a").is_some());
        cache.put("c".to_string(), info("c"));

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }
}
