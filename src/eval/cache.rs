//! Parsed script cache
//!
//! Callers usually send the same script text for every invocation of a
//! function, so parse trees are kept and reused. Least recently used entries
//! are evicted once the capacity is reached.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::parser::Expr;

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Entries currently held
    pub size: usize,
}

impl CacheStats {
    /// Hit rate in 0.0..=1.0
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Entry {
    expr: Arc<Expr>,
    last_used: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    /// Logical clock for recency
    tick: u64,
    stats: CacheStats,
}

/// Thread-safe LRU cache of parse trees keyed by script text.
pub struct ParseCache {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl ParseCache {
    /// A capacity of 0 disables caching.
    pub fn new(capacity: usize) -> Self {
        ParseCache {
            inner: Mutex::new(Inner::default()),
            capacity,
        }
    }

    pub fn get(&self, script: &str) -> Option<Arc<Expr>> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.tick += 1;
        let tick = inner.tick;
        match inner.entries.get_mut(script) {
            Some(entry) => {
                entry.last_used = tick;
                let expr = Arc::clone(&entry.expr);
                inner.stats.hits += 1;
                Some(expr)
            }
            None => {
                inner.stats.misses += 1;
                None
            }
        }
    }

    pub fn insert(&self, script: &str, expr: Arc<Expr>) {
        if self.capacity == 0 {
            return;
        }
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if !inner.entries.contains_key(script) && inner.entries.len() >= self.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone());
            if let Some(key) = oldest {
                inner.entries.remove(&key);
                inner.stats.evictions += 1;
            }
        }
        inner.tick += 1;
        let last_used = inner.tick;
        inner
            .entries
            .insert(script.to_string(), Entry { expr, last_used });
        inner.stats.size = inner.entries.len();
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.stats.size = 0;
    }
}

impl Default for ParseCache {
    fn default() -> Self {
        ParseCache::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(n: f64) -> Arc<Expr> {
        Arc::new(Expr::Number(n))
    }

    #[test]
    fn test_hit_and_miss() {
        let cache = ParseCache::new(4);
        assert!(cache.get("1").is_none());
        cache.insert("1", expr(1.0));
        assert_eq!(cache.get("1").as_deref(), Some(&Expr::Number(1.0)));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.size), (1, 1, 1));
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_least_recently_used_is_evicted() {
        let cache = ParseCache::new(2);
        cache.insert("a", expr(1.0));
        cache.insert("b", expr(2.0));
        cache.get("a");
        cache.insert("c", expr(3.0));

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_zero_capacity_disables() {
        let cache = ParseCache::new(0);
        cache.insert("a", expr(1.0));
        assert!(cache.get("a").is_none());
        assert_eq!(cache.stats().size, 0);
    }
}
