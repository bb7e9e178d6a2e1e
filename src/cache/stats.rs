//! Process-wide cache counters

use crate::cache::types::StatsSnapshot;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Thread-safe cache statistics with atomic counters
///
/// The entry counter is signed: an invalidation racing a write may apply its
/// decrement before the write's increment lands. Snapshots clamp at zero.
#[derive(Debug, Default)]
pub struct StatsAccumulator {
    entries: AtomicI64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_insert(&self) {
        self.entries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_removed(&self, count: usize) {
        self.entries.fetch_sub(count as i64, Ordering::Relaxed);
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
        self.record_removed(count);
    }

    pub fn record_expiration(&self, count: usize) {
        self.expirations.fetch_add(count as u64, Ordering::Relaxed);
        self.record_removed(count);
    }

    /// Seed the entry counter, used when restoring a snapshot
    pub fn set_entries(&self, count: usize) {
        self.entries.store(count as i64, Ordering::Relaxed);
    }

    /// Zero every counter
    pub fn reset(&self) {
        self.entries.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_entries: self.entries.load(Ordering::Relaxed).max(0) as u64,
            total_hits: self.hits.load(Ordering::Relaxed),
            total_misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }
}
