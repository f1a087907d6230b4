use std::hash::Hash;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Explicit `{value, inserted_at}` record — no hidden clock, so tests drive
/// expiry deterministically.
#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// In-memory TTL cache. Entries are lazily evicted on the first read past
/// their TTL; there is no background sweeper. A latency optimization only —
/// the persisted price table stays the source of truth.
pub struct TtlCache<K, V> {
    entries: DashMap<K, Entry<V>>,
    ttl: Duration,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: DashMap::new(), ttl }
    }

    /// Read a live entry, evicting it if `now` is past its TTL.
    pub fn get(&self, key: &K, now: Instant) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                if now.duration_since(entry.inserted_at) < self.ttl {
                    return Some(entry.value.clone());
                }
                true
            }
            None => return None,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    pub fn insert(&self, key: K, value: V, now: Instant) {
        self.entries.insert(key, Entry { value, inserted_at: now });
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_value_within_ttl() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let t0 = Instant::now();
        cache.insert("k", 42, t0);
        assert_eq!(cache.get(&"k", t0 + Duration::from_secs(59)), Some(42));
    }

    #[test]
    fn expires_at_ttl() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let t0 = Instant::now();
        cache.insert("k", 42, t0);
        assert_eq!(cache.get(&"k", t0 + Duration::from_secs(60)), None);
    }

    #[test]
    fn expired_entry_is_evicted_on_read() {
        let cache = TtlCache::new(Duration::from_secs(1));
        let t0 = Instant::now();
        cache.insert("k", 1, t0);
        assert_eq!(cache.len(), 1);
        let _ = cache.get(&"k", t0 + Duration::from_secs(2));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn reinsert_refreshes_ttl() {
        let cache = TtlCache::new(Duration::from_secs(10));
        let t0 = Instant::now();
        cache.insert("k", 1, t0);
        cache.insert("k", 2, t0 + Duration::from_secs(9));
        assert_eq!(cache.get(&"k", t0 + Duration::from_secs(15)), Some(2));
    }
}
