//! Cache Metrics Collection
//!
//! Counters describing how much storage traffic a cache caused during one
//! invocation. Shared between the cache and all of its chunks.

use std::sync::atomic::{AtomicU64, Ordering};

/// Cache metrics collector
#[derive(Debug, Default)]
pub struct CacheMetrics {
    chunk_loads: AtomicU64,
    chunk_writes: AtomicU64,
    bytes_written: AtomicU64,
    splits: AtomicU64,
    evictions: AtomicU64,
    rebalances: AtomicU64,
    commits: AtomicU64,
}

impl CacheMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_chunk_load(&self) {
        self.chunk_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_chunk_write(&self, bytes: usize) {
        self.chunk_writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_split(&self) {
        self.splits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rebalance(&self) {
        self.rebalances.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn chunk_loads(&self) -> u64 {
        self.chunk_loads.load(Ordering::Relaxed)
    }

    pub fn chunk_writes(&self) -> u64 {
        self.chunk_writes.load(Ordering::Relaxed)
    }

    pub fn splits(&self) -> u64 {
        self.splits.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Get a point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            chunk_loads: self.chunk_loads(),
            chunk_writes: self.chunk_writes(),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            splits: self.splits(),
            evictions: self.evictions(),
            rebalances: self.rebalances.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub chunk_loads: u64,
    pub chunk_writes: u64,
    pub bytes_written: u64,
    pub splits: u64,
    pub evictions: u64,
    pub rebalances: u64,
    pub commits: u64,
}

// =============================================================================
// Tests
// =============================================================================
