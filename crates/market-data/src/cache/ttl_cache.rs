use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};

use crate::clock::Clock;

#[derive(Debug)]
struct Entry<V> {
    value: V,
    stored_at: DateTime<Utc>,
    /// Lifetime recorded at write time, used by `sweep` only.
    ttl: Duration,
}

/// A mutex-guarded map of timestamped values.
///
/// Lookups take the caller's maximum acceptable age; an entry older than
/// that is removed on the spot. Nothing is evicted in the background, but
/// `sweep` drops every entry past the TTL it was written with.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, Entry<V>>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("Cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Value stored under `key` if it is at most `max_age` old.
    pub fn get(&self, key: &str, max_age: Duration) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.lock_entries();

        let age = now - entries.get(key)?.stored_at;
        if age <= max_age {
            return entries.get(key).map(|entry| entry.value.clone());
        }

        debug!(
            "Cache entry '{}' expired ({}s old, max {}s)",
            key,
            age.num_seconds(),
            max_age.num_seconds()
        );
        entries.remove(key);
        None
    }

    pub fn put(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let stored_at = self.clock.now();
        self.lock_entries().insert(
            key.into(),
            Entry {
                value,
                stored_at,
                ttl,
            },
        );
    }

    /// Remove every entry, or only those whose key contains `pattern`.
    /// Returns how many were removed.
    pub fn clear(&self, pattern: Option<&str>) -> usize {
        let mut entries = self.lock_entries();
        let before = entries.len();
        match pattern {
            Some(pattern) => entries.retain(|key, _| !key.contains(pattern)),
            None => entries.clear(),
        }
        before - entries.len()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock_entries().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries older than `age`. Does not evict.
    pub fn count_older_than(&self, age: Duration) -> usize {
        let now = self.clock.now();
        self.lock_entries()
            .values()
            .filter(|entry| now - entry.stored_at > age)
            .count()
    }

    /// Drop entries older than the TTL they were written with.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock_entries();
        let before = entries.len();
        entries.retain(|_, entry| now - entry.stored_at <= entry.ttl);
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn cache() -> (Arc<ManualClock>, TtlCache<u32>) {
        let clock = Arc::new(ManualClock::default());
        let cache = TtlCache::new(clock.clone());
        (clock, cache)
    }

    #[test]
    fn test_get_within_max_age() {
        let (clock, cache) = cache();
        cache.put("a", 1, Duration::seconds(60));

        clock.advance(Duration::seconds(30));
        assert_eq!(cache.get("a", Duration::seconds(30)), Some(1));
        assert!(cache.get("missing", Duration::seconds(30)).is_none());
    }

    #[test]
    fn test_expired_lookup_removes_entry() {
        let (clock, cache) = cache();
        cache.put("a", 1, Duration::seconds(60));

        clock.advance(Duration::seconds(31));
        assert_eq!(cache.get("a", Duration::seconds(30)), None);
        assert!(!cache.contains_key("a"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_caller_max_age_overrides_ttl() {
        let (clock, cache) = cache();
        cache.put("a", 1, Duration::seconds(10));

        clock.advance(Duration::seconds(20));
        assert_eq!(cache.get("a", Duration::seconds(60)), Some(1));
    }

    #[test]
    fn test_clear_with_pattern() {
        let (_, cache) = cache();
        cache.put("quote_SPY", 1, Duration::seconds(30));
        cache.put("quote_QQQ", 2, Duration::seconds(30));
        cache.put("VIX", 3, Duration::seconds(30));

        assert_eq!(cache.clear(Some("quote")), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.clear(None), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_count_older_than_does_not_evict() {
        let (clock, cache) = cache();
        cache.put("old", 1, Duration::seconds(300));
        clock.advance(Duration::seconds(120));
        cache.put("new", 2, Duration::seconds(300));

        assert_eq!(cache.count_older_than(Duration::seconds(60)), 1);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_sweep_uses_recorded_ttl() {
        let (clock, cache) = cache();
        cache.put("short", 1, Duration::seconds(30));
        cache.put("long", 2, Duration::seconds(3600));

        clock.advance(Duration::seconds(31));
        assert_eq!(cache.sweep(), 1);
        assert!(cache.contains_key("long"));
        assert!(!cache.contains_key("short"));
    }
}
