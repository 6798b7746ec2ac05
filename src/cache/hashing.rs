//! Key Hashing and Row Serialization
//!
//! Routing must be reproducible on the next run, which only reloads chunk
//! metadata, so key hashes come from SHA-256 and never from the
//! process-seeded `std` hasher.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;

use super::{KeyHash, HASH_MODULUS};

/// Stable hash of `key` in `0..HASH_MODULUS`.
///
/// Equal to the SHA-256 digest of the UTF-8 bytes read as one big-endian
/// integer, reduced modulo 10^8.
pub fn hash_key(key: &str) -> KeyHash {
    let digest = Sha256::digest(key.as_bytes());
    let modulus = HASH_MODULUS as u64;

    let reduced = digest
        .iter()
        .fold(0u64, |acc, &byte| (acc * 256 + byte as u64) % modulus);
    reduced as KeyHash
}

/// Compact JSON encoding used for every storage row.
pub fn serialize<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Size budget of a single storage row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLimit {
    max_property_value: usize,
    padding: usize,
}

impl RowLimit {
    pub fn new(max_property_value: usize, padding: usize) -> Self {
        Self {
            max_property_value,
            padding,
        }
    }

    /// Largest length a row may approach, exclusive.
    pub fn budget(&self) -> usize {
        self.max_property_value.saturating_sub(self.padding)
    }

    pub fn row_too_long(&self, serialized: &str) -> bool {
        serialized.len() >= self.budget()
    }
}

// =============================================================================
// Tests
// =============================================================================
