//! In-Memory Context Store
//!
//! Host-free implementation of the `ContextStore` port. Used by tests and by
//! embedders that persist the whole store themselves.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::domain::ports::ContextStore;
use crate::error::{Error, Result};

/// In-memory context store statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextStoreStats {
    /// Number of keys stored
    pub key_count: u64,
    /// Total characters stored across all values
    pub total_chars: u64,
    /// Read operations
    pub reads: u64,
    /// Write operations
    pub writes: u64,
}

/// In-memory context store backed by a `DashMap`
#[derive(Debug, Default)]
pub struct InMemoryContextStore {
    values: DashMap<String, String>,
    /// Reject values of this many characters or more
    value_limit: Option<usize>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl InMemoryContextStore {
    /// Create a new unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects values at or above `limit` characters,
    /// like a host whose rows have a maximum property length
    pub fn with_value_limit(limit: usize) -> Self {
        Self {
            value_limit: Some(limit),
            ..Self::default()
        }
    }

    /// Raw value under `key`, without counting a read
    pub fn raw(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|v| v.value().clone())
    }

    /// All stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Length of the longest stored value
    pub fn longest_value(&self) -> usize {
        self.values.iter().map(|e| e.value().len()).max().unwrap_or(0)
    }

    /// Get store statistics
    pub fn stats(&self) -> ContextStoreStats {
        ContextStoreStats {
            key_count: self.values.len() as u64,
            total_chars: self.values.iter().map(|e| e.value().len() as u64).sum(),
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }
}

impl ContextStore for InMemoryContextStore {
    fn get_context(&self, key: &str) -> Result<Option<String>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.raw(key))
    }

    fn set_context(&self, key: &str, value: &str) -> Result<()> {
        if let Some(limit) = self.value_limit {
            if value.len() >= limit {
                return Err(Error::Storage(format!(
                    "value for '{}' has {} characters, limit is {}",
                    key,
                    value.len(),
                    limit
                )));
            }
        }

        self.writes.fetch_add(1, Ordering::Relaxed);
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
