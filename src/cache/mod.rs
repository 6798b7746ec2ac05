//! Chunked Key-Value Cache
//!
//! Persists a string-keyed map in a context store whose values are limited
//! in length, by spreading it over several rows ("chunks").
//!
//! # Storage Layout
//!
//! ```text
//! {prefix}_cache_chunks_metadata  →  [{"storageKey","index","size"}, ...]
//! {prefix}_{index}                →  {"key": value, ...}   (one per chunk)
//! ```
//!
//! # Routing
//!
//! ```text
//!  hash 0 ───────────────────────────────────────────────── 99_999_999
//!  │  chunk idx 2_500_000 │     chunk idx 61_000_000 │ chunk idx MAX │
//!  └──────────────────────┴──────────────────────────┴───────────────┘
//! ```
//!
//! A key belongs to the chunk with the smallest index that is at least the
//! key's hash.

pub mod chunk;
pub mod config;
pub mod hashing;
pub mod metadata;
pub mod metrics;
pub mod store;

#[cfg(test)]
mod proptest;

pub use chunk::{CacheChunk, ChunkContent, ChunkCut};
pub use config::CacheConfig;
pub use hashing::{hash_key, RowLimit};
pub use metadata::{metadata_key, ChunkMetadata, ChunkMetadataRecord};
pub use metrics::{CacheMetrics, MetricsSnapshot};
pub use store::Cache;

/// Hash of a key, always below `HASH_MODULUS`
pub type KeyHash = u32;

/// Size of the key hash space
pub const HASH_MODULUS: KeyHash = 100_000_000;

/// Index of the catch-all chunk
pub const MAX_KEY_HASH: KeyHash = HASH_MODULUS - 1;

/// Default maximum characters per context-store value
pub const MAXIMUM_PROPERTY_VALUE: usize = 65_536;

/// Characters kept free below the value limit
pub const ROW_PADDING_LENGTH: usize = 40;
