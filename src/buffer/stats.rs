//! Buffer manager statistics.

use std::fmt;

/// Counters kept by the buffer manager.
///
/// Updated under the manager's state lock; [`BufferManager::stats`] hands out
/// a copy.
///
/// [`BufferManager::stats`]: super::BufferManager::stats
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BufferStats {
    /// `read_page` calls served from the pool.
    pub cache_hits: u64,
    /// `read_page` calls that had to load from a file.
    pub cache_misses: u64,
    /// Valid frames reclaimed by the clock.
    pub evictions: u64,
    /// Pages read from files.
    pub pages_read: u64,
    /// Dirty pages written back (eviction, flush or shutdown).
    pub pages_written: u64,
    /// Pages created with `alloc_page`.
    pub allocations: u64,
    /// Pages removed with `dispose_page`.
    pub disposals: u64,
}

impl BufferStats {
    /// Fraction of `read_page` calls that hit the pool (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

impl fmt::Display for BufferStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats {{ hits: {}, misses: {}, evictions: {}, written: {}, hit_rate: {:.2}% }}",
            self.cache_hits,
            self.cache_misses,
            self.evictions,
            self.pages_written,
            self.hit_rate() * 100.0
        )
    }
}
