//! Cache Events
//!
//! Immutable records of significant things that happened to a cache during
//! one invocation. None of them is an error: a split or an eviction is
//! informational and never aborts the operation that caused it.
//!
//! # Example
//!
//! ```ignore
//! let event = CacheEvent::chunk_split(
//!     "connector",
//!     "connector_99999999",
//!     99_999_999,
//!     48_210_377,
//!     120,
//!     120,
//! );
//! publisher.publish(event);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Diagnostic event emitted by a cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CacheEvent {
    /// A chunk outgrew the row budget and was split in two.
    ChunkSplit {
        prefix: String,
        storage_key: String,
        index: u32,
        new_index: u32,
        retained_entries: usize,
        moved_entries: usize,
        timestamp: DateTime<Utc>,
    },

    /// The oldest entry of a chunk was dropped to honour the size cap.
    EntryEvicted {
        prefix: String,
        key: String,
        chunk_index: u32,
        timestamp: DateTime<Utc>,
    },

    /// Commit-time truncation brought the cache back under its cap.
    CacheTruncated {
        prefix: String,
        evicted: usize,
        max_size: usize,
        timestamp: DateTime<Utc>,
    },

    /// Chunk boundaries were redistributed.
    ChunksRebalanced {
        prefix: String,
        chunk_count: usize,
        target_size: usize,
        moved_entries: usize,
        timestamp: DateTime<Utc>,
    },

    /// Chunks and metadata index were written to storage.
    Committed {
        prefix: String,
        chunk_count: usize,
        entries: usize,
        timestamp: DateTime<Utc>,
    },
}

impl CacheEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            CacheEvent::ChunkSplit { timestamp, .. } => *timestamp,
            CacheEvent::EntryEvicted { timestamp, .. } => *timestamp,
            CacheEvent::CacheTruncated { timestamp, .. } => *timestamp,
            CacheEvent::ChunksRebalanced { timestamp, .. } => *timestamp,
            CacheEvent::Committed { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            CacheEvent::ChunkSplit { .. } => "ChunkSplit",
            CacheEvent::EntryEvicted { .. } => "EntryEvicted",
            CacheEvent::CacheTruncated { .. } => "CacheTruncated",
            CacheEvent::ChunksRebalanced { .. } => "ChunksRebalanced",
            CacheEvent::Committed { .. } => "Committed",
        }
    }

    /// Get the cache prefix the event belongs to.
    pub fn prefix(&self) -> &str {
        match self {
            CacheEvent::ChunkSplit { prefix, .. }
            | CacheEvent::EntryEvicted { prefix, .. }
            | CacheEvent::CacheTruncated { prefix, .. }
            | CacheEvent::ChunksRebalanced { prefix, .. }
            | CacheEvent::Committed { prefix, .. } => prefix,
        }
    }

    /// True for events operators should be warned about.
    pub fn is_warning(&self) -> bool {
        matches!(self, CacheEvent::ChunkSplit { .. })
    }
}

// Factory methods
impl CacheEvent {
    pub fn chunk_split(
        prefix: impl Into<String>,
        storage_key: impl Into<String>,
        index: u32,
        new_index: u32,
        retained_entries: usize,
        moved_entries: usize,
    ) -> Self {
        CacheEvent::ChunkSplit {
            prefix: prefix.into(),
            storage_key: storage_key.into(),
            index,
            new_index,
            retained_entries,
            moved_entries,
            timestamp: Utc::now(),
        }
    }

    pub fn entry_evicted(
        prefix: impl Into<String>,
        key: impl Into<String>,
        chunk_index: u32,
    ) -> Self {
        CacheEvent::EntryEvicted {
            prefix: prefix.into(),
            key: key.into(),
            chunk_index,
            timestamp: Utc::now(),
        }
    }

    pub fn cache_truncated(prefix: impl Into<String>, evicted: usize, max_size: usize) -> Self {
        CacheEvent::CacheTruncated {
            prefix: prefix.into(),
            evicted,
            max_size,
            timestamp: Utc::now(),
        }
    }

    pub fn chunks_rebalanced(
        prefix: impl Into<String>,
        chunk_count: usize,
        target_size: usize,
        moved_entries: usize,
    ) -> Self {
        CacheEvent::ChunksRebalanced {
            prefix: prefix.into(),
            chunk_count,
            target_size,
            moved_entries,
            timestamp: Utc::now(),
        }
    }

    pub fn committed(prefix: impl Into<String>, chunk_count: usize, entries: usize) -> Self {
        CacheEvent::Committed {
            prefix: prefix.into(),
            chunk_count,
            entries,
            timestamp: Utc::now(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
