//! Cache Chunk
//!
//! A chunk owns every key whose hash falls in `(next smaller index, index]`
//! and persists them as one JSON row under `"{prefix}_{index}"`.
//!
//! # Lifecycle
//!
//! ```text
//! Unloaded ──first access──▶ Loaded ──commit──▶ written (possibly as several chunks)
//!    │                                              ▲
//!    └────────────── never touched ─────────────────┘  (no write at all)
//! ```
//!
//! Content keeps insertion order; the oldest entry is the first one.
//! Updating an existing key keeps its original position.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::events::CacheEvent;
use crate::domain::ports::{ContextStore, EventPublisher};
use crate::error::{Error, Result};

use super::hashing::{hash_key, serialize, RowLimit};
use super::metadata::ChunkMetadata;
use super::metrics::CacheMetrics;
use super::KeyHash;

/// Ordered chunk content
pub type ChunkContent<V> = IndexMap<String, V>;

/// Collaborators shared by a cache and all of its chunks
#[derive(Clone)]
pub(crate) struct ChunkEnv {
    pub store: Arc<dyn ContextStore>,
    pub events: Arc<dyn EventPublisher>,
    pub metrics: Arc<CacheMetrics>,
    pub limit: RowLimit,
}

enum ContentState<V> {
    Unloaded,
    Loaded(ChunkContent<V>),
}

/// Result of cutting a chunk: entries handed to the next lower range
#[derive(Debug)]
pub struct ChunkCut<V> {
    /// New upper bound for the chunk receiving `content`
    pub index: KeyHash,
    /// Entries whose hash is at most `index`
    pub content: ChunkContent<V>,
}

/// One storage slot worth of cache entries
pub struct CacheChunk<V> {
    env: ChunkEnv,
    metadata: ChunkMetadata,
    content: ContentState<V>,
}

impl<V> CacheChunk<V> {
    pub fn metadata(&self) -> &ChunkMetadata {
        &self.metadata
    }

    pub fn index(&self) -> KeyHash {
        self.metadata.index
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.content, ContentState::Loaded(_))
    }

    /// Live entry count when loaded, otherwise the count recorded at the last commit.
    pub fn len(&self) -> usize {
        match &self.content {
            ContentState::Loaded(content) => content.len(),
            ContentState::Unloaded => self.metadata.size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries currently in memory; nothing for an unloaded chunk.
    pub(crate) fn loaded_entries(&self) -> impl Iterator<Item = (&String, &V)> + '_ {
        match &self.content {
            ContentState::Loaded(content) => Some(content),
            ContentState::Unloaded => None,
        }
        .into_iter()
        .flat_map(|content| content.iter())
    }
}

impl<V> fmt::Debug for CacheChunk<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheChunk")
            .field("metadata", &self.metadata)
            .field("loaded", &self.is_loaded())
            .field("len", &self.len())
            .finish()
    }
}

impl<V: Serialize + DeserializeOwned> CacheChunk<V> {
    /// Chunk known only by its metadata; content is fetched on first access.
    pub(crate) fn unloaded(env: ChunkEnv, metadata: ChunkMetadata) -> Self {
        Self {
            env,
            metadata,
            content: ContentState::Unloaded,
        }
    }

    /// Chunk created in this session with known content.
    pub(crate) fn with_content(
        env: ChunkEnv,
        metadata: ChunkMetadata,
        content: ChunkContent<V>,
    ) -> Self {
        Self {
            env,
            metadata,
            content: ContentState::Loaded(content),
        }
    }

    /// Fetch content from storage if it is not in memory yet.
    pub fn load(&mut self) -> Result<()> {
        self.content_mut().map(|_| ())
    }

    fn fetch(&self) -> Result<ChunkContent<V>> {
        let key = self.metadata.backend_key();
        let raw = self.env.store.get_context(&key)?;
        self.env.metrics.record_chunk_load();

        let content = match raw.as_deref() {
            None | Some("") => ChunkContent::new(),
            Some(raw) => serde_json::from_str(raw)?,
        };
        debug!(key = %key, entries = content.len(), "Loaded cache chunk");
        Ok(content)
    }

    fn content_mut(&mut self) -> Result<&mut ChunkContent<V>> {
        if !self.is_loaded() {
            let content = self.fetch()?;
            self.content = ContentState::Loaded(content);
        }

        match &mut self.content {
            ContentState::Loaded(content) => Ok(content),
            ContentState::Unloaded => Err(Error::Storage(format!(
                "chunk {} has no content after load",
                self.metadata.backend_key()
            ))),
        }
    }

    pub fn get(&mut self, key: &str) -> Result<&V> {
        self.content_mut()?
            .get(key)
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    pub fn contains_key(&mut self, key: &str) -> Result<bool> {
        Ok(self.content_mut()?.contains_key(key))
    }

    pub fn set(&mut self, key: String, value: V) -> Result<()> {
        self.content_mut()?.insert(key, value);
        Ok(())
    }

    pub fn delete(&mut self, key: &str) -> Result<V> {
        self.content_mut()?
            .shift_remove(key)
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    /// Remove the oldest entry and return its value.
    pub fn pop_left(&mut self) -> Result<Option<V>> {
        Ok(self.pop_oldest()?.map(|(_, value)| value))
    }

    pub(crate) fn pop_oldest(&mut self) -> Result<Option<(String, V)>> {
        Ok(self.content_mut()?.shift_remove_index(0))
    }

    /// Keep the `target_length` entries with the largest hashes and hand the
    /// rest, the lower end of this chunk's range, to the caller.
    ///
    /// Returns `None` when the chunk already fits or cannot be cut below its
    /// own index.
    pub fn cut(&mut self, target_length: usize) -> Result<Option<ChunkCut<V>>> {
        let own_index = self.metadata.index;
        let content = self.content_mut()?;
        if content.len() <= target_length {
            return Ok(None);
        }

        let mut hashes: Vec<KeyHash> = content.keys().map(|k| hash_key(k)).collect();
        hashes.sort_unstable();
        let boundary = hashes[content.len() - target_length - 1];
        if boundary >= own_index {
            return Ok(None);
        }

        let (moved, kept): (ChunkContent<V>, ChunkContent<V>) = std::mem::take(content)
            .into_iter()
            .partition(|(key, _)| hash_key(key) <= boundary);
        *content = kept;

        Ok(Some(ChunkCut {
            index: boundary,
            content: moved,
        }))
    }

    /// Take over the entries of a cut from the neighbouring higher chunk.
    ///
    /// Content is loaded under the old index before the index moves up to the
    /// cut boundary.
    pub(crate) fn absorb(&mut self, cut: ChunkCut<V>) -> Result<usize> {
        self.load()?;
        self.metadata.index = cut.index;

        let moved = cut.content.len();
        self.content_mut()?.extend(cut.content);
        Ok(moved)
    }

    /// Split into two chunks of roughly equal length.
    ///
    /// Returns the new lower-range chunk, or `None` when every entry would
    /// end up on the same side.
    pub fn split(&mut self) -> Result<Option<CacheChunk<V>>> {
        let Some(cut) = self.cut(self.len() / 2)? else {
            return Ok(None);
        };

        if self.len() == 0 {
            self.content = ContentState::Loaded(cut.content);
            return Ok(None);
        }

        warn!(
            key = %self.metadata.backend_key(),
            new_index = cut.index,
            retained = self.len(),
            moved = cut.content.len(),
            "Cache chunk was split"
        );
        self.env.metrics.record_split();
        self.env.events.publish(CacheEvent::chunk_split(
            self.metadata.prefix.clone(),
            self.metadata.backend_key(),
            self.metadata.index,
            cut.index,
            self.len(),
            cut.content.len(),
        ));

        let metadata = ChunkMetadata::new(self.metadata.prefix.clone(), cut.index);
        Ok(Some(CacheChunk::with_content(self.env.clone(), metadata, cut.content)))
    }

    /// Split until every part fits in one row, without writing anything.
    ///
    /// `self` stays the highest-range part; chunks split off are returned.
    /// An unloaded chunk was never touched and is left alone.
    pub fn split_to_fit(&mut self) -> Result<Vec<CacheChunk<V>>> {
        let mut pending = Vec::new();
        while let Some(sibling) = self.split_if_too_long()? {
            pending.push(sibling);
        }

        let mut fitted = Vec::new();
        while let Some(mut chunk) = pending.pop() {
            while let Some(sibling) = chunk.split_if_too_long()? {
                pending.push(sibling);
            }
            fitted.push(chunk);
        }
        Ok(fitted)
    }

    fn split_if_too_long(&mut self) -> Result<Option<CacheChunk<V>>> {
        let ContentState::Loaded(content) = &self.content else {
            return Ok(None);
        };

        let row = serialize(content)?;
        if !self.env.limit.row_too_long(&row) {
            return Ok(None);
        }

        let oversized_key = match content.len() {
            1 => content.keys().next().cloned(),
            _ => None,
        };
        match self.split()? {
            Some(sibling) => Ok(Some(sibling)),
            None => Err(Error::EntryTooLarge {
                key: oversized_key.unwrap_or_else(|| self.metadata.backend_key()),
                size: row.len(),
                limit: self.env.limit.budget(),
            }),
        }
    }

    /// Write the content row under the current backend key. No-op when unloaded.
    pub fn write(&mut self) -> Result<()> {
        let ContentState::Loaded(content) = &self.content else {
            return Ok(());
        };

        let row = serialize(content)?;
        let key = self.metadata.backend_key();
        self.env.store.set_context(&key, &row)?;
        self.metadata.size = content.len();
        self.env.metrics.record_chunk_write(row.len());
        debug!(key = %key, entries = content.len(), chars = row.len(), "Wrote cache chunk");
        Ok(())
    }

    /// Persist this chunk, splitting it until every part fits in one row.
    ///
    /// Split-off chunks are written first and returned; `self` keeps its
    /// backend key and is rewritten last.
    pub fn commit(&mut self) -> Result<Vec<CacheChunk<V>>> {
        let mut siblings = self.split_to_fit()?;
        for sibling in &mut siblings {
            sibling.write()?;
        }
        self.write()?;
        Ok(siblings)
    }
}

/// JSON row a single entry would occupy alone in a chunk.
pub(crate) fn single_entry_row<V: Serialize>(key: &str, value: &V) -> Result<String> {
    let mut row = IndexMap::with_capacity(1);
    row.insert(key, value);
    serialize(&row)
}

// =============================================================================
// Tests
// =============================================================================
