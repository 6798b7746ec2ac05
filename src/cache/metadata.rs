//! Chunk Metadata
//!
//! What the cache knows about a chunk without loading its content. The whole
//! metadata index is persisted under `"{prefix}_cache_chunks_metadata"`.

use serde::{Deserialize, Serialize};

use super::KeyHash;

/// Persisted form of one metadata record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadataRecord {
    pub storage_key: String,
    pub index: KeyHash,
    pub size: usize,
}

/// Metadata of one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMetadata {
    /// Namespace of the owning cache
    pub prefix: String,
    /// Unique identity of the chunk object, stable across renames
    pub storage_key: String,
    /// Upper bound (inclusive) of the key hashes this chunk owns
    pub index: KeyHash,
    /// Entry count as of the last commit
    pub size: usize,
}

impl ChunkMetadata {
    pub fn new(prefix: impl Into<String>, index: KeyHash) -> Self {
        Self {
            prefix: prefix.into(),
            storage_key: uuid::Uuid::new_v4().to_string(),
            index,
            size: 0,
        }
    }

    pub fn from_storage_form(record: ChunkMetadataRecord, prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            storage_key: record.storage_key,
            index: record.index,
            size: record.size,
        }
    }

    pub fn to_storage_form(&self) -> ChunkMetadataRecord {
        ChunkMetadataRecord {
            storage_key: self.storage_key.clone(),
            index: self.index,
            size: self.size,
        }
    }

    /// Backend key holding the chunk content.
    ///
    /// Derived from the current index, so it changes whenever the index does.
    pub fn backend_key(&self) -> String {
        format!("{}_{}", self.prefix, self.index)
    }
}

/// Backend key of the metadata index for `prefix`
pub fn metadata_key(prefix: &str) -> String {
    format!("{}_cache_chunks_metadata", prefix)
}

// =============================================================================
// Tests
// =============================================================================
