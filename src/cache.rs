//! Process-local TTL cache. PageRank/Insights/Recommendations each live as
//! a named `TtlCache<T>` field on `Engine`, with invalidation always an
//! explicit method call rather than something that falls out of import
//! order.

use std::time::{Duration, Instant};

pub struct TtlCache<T> {
    ttl: Duration,
    entry: Option<(Instant, T)>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: None }
    }

    /// `None` on a cold cache or past its TTL — equivalent to a cache miss,
    /// never a surfaced error.
    pub fn get(&self) -> Option<T> {
        self.entry.as_ref().filter(|(stamp, _)| stamp.elapsed() < self.ttl).map(|(_, v)| v.clone())
    }

    pub fn set(&mut self, value: T) {
        self.entry = Some((Instant::now(), value));
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

/// The insights cache additionally tracks the row count it was built from,
/// so a writer can bypass TTL and invalidate on `|delta| > 50`.
pub struct RowCountedCache<T> {
    inner: TtlCache<T>,
    cached_rows: Option<usize>,
}

impl<T: Clone> RowCountedCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { inner: TtlCache::new(ttl), cached_rows: None }
    }

    pub fn get(&self, current_rows: usize) -> Option<T> {
        let cached_rows = self.cached_rows?;
        if current_rows.abs_diff(cached_rows) > 50 {
            return None;
        }
        self.inner.get()
    }

    pub fn set(&mut self, value: T, rows: usize) {
        self.inner.set(value);
        self.cached_rows = Some(rows);
    }

    pub fn invalidate(&mut self) {
        self.inner.invalidate();
        self.cached_rows = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cold_cache_misses() {
        let cache: TtlCache<u32> = TtlCache::new(Duration::from_secs(60));
        assert!(cache.get().is_none());
    }

    #[test]
    fn set_then_get_hits_within_ttl() {
        let mut cache = TtlCache::new(Duration::from_secs(60));
        cache.set(42u32);
        assert_eq!(cache.get(), Some(42));
    }

    #[test]
    fn invalidate_clears_entry() {
        let mut cache = TtlCache::new(Duration::from_secs(60));
        cache.set(42u32);
        cache.invalidate();
        assert!(cache.get().is_none());
    }

    #[test]
    fn row_counted_cache_invalidates_past_delta_threshold() {
        let mut cache: RowCountedCache<u32> = RowCountedCache::new(Duration::from_secs(60));
        cache.set(1, 100);
        assert_eq!(cache.get(100), Some(1));
        assert_eq!(cache.get(140), Some(1));
        assert!(cache.get(151).is_none());
    }
}
