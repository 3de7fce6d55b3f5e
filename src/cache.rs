use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;

struct CacheEntry {
    computed_at: u32,
    ttl: u32,
    value: Rc<dyn Any>,
}

impl CacheEntry {
    fn is_valid(&self, now: u32) -> bool {
        now >= self.computed_at && now - self.computed_at < self.ttl.max(1)
    }
}

/// Tick-keyed memoization. A value computed at tick `t` with time-to-live
/// `ttl` is served until tick `t + max(ttl, 1)`.
#[derive(Default)]
pub struct TickCache {
    entries: HashMap<String, CacheEntry>,
}

impl TickCache {
    pub fn new() -> TickCache {
        TickCache { entries: HashMap::new() }
    }

    pub fn get<T, F>(&mut self, key: &str, now: u32, ttl: u32, compute: F) -> Rc<T>
    where
        T: 'static,
        F: FnOnce() -> T,
    {
        if let Some(entry) = self.entries.get(key) {
            if entry.is_valid(now) {
                if let Ok(value) = entry.value.clone().downcast::<T>() {
                    return value;
                }
            }
        }

        let value = Rc::new(compute());

        self.entries.insert(
            key.to_owned(),
            CacheEntry {
                computed_at: now,
                ttl,
                value: value.clone(),
            },
        );

        value
    }

    pub fn contains(&self, key: &str, now: u32) -> bool {
        self.entries.get(key).map(|e| e.is_valid(now)).unwrap_or(false)
    }

    pub fn invalidate(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Drops every entry that has expired at `now`.
    pub fn purge(&mut self, now: u32) {
        self.entries.retain(|_, entry| entry.is_valid(now));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn serves_cached_value_within_ttl() {
        let mut cache = TickCache::new();
        let calls = Cell::new(0);

        let compute = || {
            calls.set(calls.get() + 1);
            42u32
        };

        assert_eq!(*cache.get("k", 10, 3, compute), 42);
        assert_eq!(*cache.get("k", 12, 3, || -> u32 { unreachable!() }), 42);
        assert_eq!(calls.get(), 1);

        assert_eq!(*cache.get("k", 13, 3, || 7u32), 7);
    }

    #[test]
    fn zero_ttl_lasts_one_tick() {
        let mut cache = TickCache::new();

        cache.get("k", 5, 0, || 1u8);

        assert!(cache.contains("k", 5));
        assert!(!cache.contains("k", 6));
    }

    #[test]
    fn type_mismatch_recomputes() {
        let mut cache = TickCache::new();

        cache.get("k", 1, 10, || 1u8);

        assert_eq!(*cache.get("k", 1, 10, || "text".to_string()), "text");
    }

    #[test]
    fn purge_and_invalidate() {
        let mut cache = TickCache::new();

        cache.get("a", 1, 1, || 1u8);
        cache.get("b", 1, 100, || 2u8);
        cache.purge(5);

        assert_eq!(cache.len(), 1);

        cache.invalidate("b");

        assert!(cache.is_empty());
    }
}
