//! Chunked Cache
//!
//! A string-keyed map spread over several context-store rows. Chunks are
//! kept sorted by descending index; a key goes to the chunk with the
//! smallest index that is still `>= hash_key(key)`. The first chunk always
//! carries `MAX_KEY_HASH`, so every key has a home.
//!
//! Only chunk metadata is read on construction. Content is read per chunk on
//! first access and nothing is written until `commit()`.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::adapters::LoggingEventPublisher;
use crate::domain::events::CacheEvent;
use crate::domain::ports::{ContextStore, EventPublisher};
use crate::error::{Error, Result};

use super::chunk::{single_entry_row, CacheChunk, ChunkContent, ChunkCut, ChunkEnv};
use super::config::CacheConfig;
use super::hashing::{hash_key, serialize};
use super::metadata::{metadata_key, ChunkMetadata, ChunkMetadataRecord};
use super::metrics::CacheMetrics;
use super::{KeyHash, MAX_KEY_HASH};

/// Cache persisted across invocations in a size-bounded context store
pub struct Cache<V = serde_json::Value> {
    prefix: String,
    max_size: Option<usize>,
    env: ChunkEnv,
    chunks: Vec<CacheChunk<V>>,
}

impl<V: Serialize + DeserializeOwned> Cache<V> {
    /// Open the cache stored under `prefix`
    pub fn new(
        store: Arc<dyn ContextStore>,
        prefix: impl Into<String>,
        max_size: Option<usize>,
    ) -> Result<Self> {
        Self::with_config(store, CacheConfig::new(prefix).with_max_size(max_size))
    }

    /// Open a cache with explicit limits, logging events through `tracing`
    pub fn with_config(store: Arc<dyn ContextStore>, config: CacheConfig) -> Result<Self> {
        Self::with_events(store, config, Arc::new(LoggingEventPublisher::new()))
    }

    /// Open a cache publishing its events to `events`
    pub fn with_events(
        store: Arc<dyn ContextStore>,
        config: CacheConfig,
        events: Arc<dyn EventPublisher>,
    ) -> Result<Self> {
        config.validate()?;

        let env = ChunkEnv {
            store,
            events,
            metrics: Arc::new(CacheMetrics::new()),
            limit: config.row_limit(),
        };
        let chunks = load_chunks(&env, &config.prefix)?;
        debug!(prefix = %config.prefix, chunks = chunks.len(), "Opened cache");

        Ok(Self {
            prefix: config.prefix,
            max_size: config.max_size,
            env,
            chunks,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn max_size(&self) -> Option<usize> {
        self.max_size
    }

    /// Change the entry cap; it is enforced per `set` and again on `commit`
    pub fn set_max_size(&mut self, max_size: Option<usize>) {
        self.max_size = max_size;
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.env.metrics
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn loaded_chunk_count(&self) -> usize {
        self.chunks.iter().filter(|c| c.is_loaded()).count()
    }

    /// Metadata of every chunk in routing order, with live sizes
    pub fn chunk_metadata(&self) -> Vec<ChunkMetadata> {
        self.chunks
            .iter()
            .map(|chunk| ChunkMetadata {
                size: chunk.len(),
                ..chunk.metadata().clone()
            })
            .collect()
    }

    /// Total entries; untouched chunks answer from their metadata
    pub fn len(&self) -> usize {
        self.chunks.iter().map(|c| c.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn route_position(&self, key: &str) -> usize {
        let hash = hash_key(key);
        // Indices >= hash form a prefix of the descending list; take its last.
        self.chunks
            .iter()
            .rposition(|chunk| chunk.index() >= hash)
            .unwrap_or(0)
    }

    /// Index of the chunk responsible for `key`
    pub fn route(&self, key: &str) -> KeyHash {
        self.chunks[self.route_position(key)].index()
    }

    pub fn get(&mut self, key: &str) -> Result<&V> {
        let pos = self.route_position(key);
        self.chunks[pos].get(key)
    }

    pub fn contains_key(&mut self, key: &str) -> Result<bool> {
        let pos = self.route_position(key);
        self.chunks[pos].contains_key(key)
    }

    /// Insert or update an entry.
    ///
    /// With a cap set and exceeded, the written chunk drops its oldest entry
    /// if it holds more than one. Entries too large to ever fit in a row are
    /// rejected up front.
    pub fn set(&mut self, key: impl Into<String>, value: V) -> Result<()> {
        let key = key.into();

        let row = single_entry_row(&key, &value)?;
        if self.env.limit.row_too_long(&row) {
            return Err(Error::EntryTooLarge {
                key,
                size: row.len(),
                limit: self.env.limit.budget(),
            });
        }

        let pos = self.route_position(&key);
        self.chunks[pos].set(key, value)?;
        self.evict_after_set(pos)
    }

    fn evict_after_set(&mut self, pos: usize) -> Result<()> {
        let Some(max_size) = self.max_size else {
            return Ok(());
        };
        if self.len() > max_size && self.chunks[pos].len() > 1 {
            self.evict_oldest(pos)?;
        }
        Ok(())
    }

    fn evict_oldest(&mut self, pos: usize) -> Result<bool> {
        let chunk = &mut self.chunks[pos];
        let Some((key, _)) = chunk.pop_oldest()? else {
            return Ok(false);
        };

        debug!(prefix = %self.prefix, key = %key, chunk = chunk.index(), "Evicted cache entry");
        self.env.metrics.record_eviction();
        self.env
            .events
            .publish(CacheEvent::entry_evicted(self.prefix.clone(), key, chunk.index()));
        Ok(true)
    }

    pub fn delete(&mut self, key: &str) -> Result<V> {
        let pos = self.route_position(key);
        self.chunks[pos].delete(key)
    }

    fn load_all(&mut self) -> Result<()> {
        for chunk in &mut self.chunks {
            chunk.load()?;
        }
        Ok(())
    }

    /// All entries, chunk by chunk in insertion order. Loads every chunk.
    pub fn iter(&mut self) -> Result<impl Iterator<Item = (&String, &V)> + '_> {
        self.load_all()?;
        Ok(self.chunks.iter().flat_map(|chunk| chunk.loaded_entries()))
    }

    pub fn keys(&mut self) -> Result<Vec<String>> {
        Ok(self.iter()?.map(|(key, _)| key.clone()).collect())
    }

    /// Merged copy of every chunk's content
    pub fn content(&mut self) -> Result<ChunkContent<V>>
    where
        V: Clone,
    {
        Ok(self
            .iter()?
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    /// Drop oldest entries round-robin over non-empty chunks until the cap holds.
    pub fn truncate_to_max_size(&mut self) -> Result<usize> {
        let Some(max_size) = self.max_size else {
            return Ok(0);
        };

        let mut cursor = 0;
        let mut evicted = 0;
        while self.len() > max_size {
            let count = self.chunks.len();
            let Some(pos) = (0..count)
                .map(|offset| (cursor + offset) % count)
                .find(|&i| !self.chunks[i].is_empty())
            else {
                break;
            };

            if self.evict_oldest(pos)? {
                evicted += 1;
            }
            cursor = (pos + 1) % count;
        }

        if evicted > 0 {
            info!(prefix = %self.prefix, evicted, max_size, "Truncated cache to max size");
            self.env
                .events
                .publish(CacheEvent::cache_truncated(self.prefix.clone(), evicted, max_size));
        }
        Ok(evicted)
    }

    /// Even out chunk lengths.
    ///
    /// Walking from the highest range down, any chunk above the target length
    /// hands its lowest-hash overflow to the next chunk, whose index rises to
    /// the cut boundary. The last chunk keeps whatever is left.
    pub fn balance_chunks(&mut self) -> Result<()> {
        let count = self.chunks.len();
        let target_size = self.len() / count;

        let mut carried: Option<ChunkCut<V>> = None;
        let mut moved = 0;
        for pos in 0..count {
            if let Some(cut) = carried.take() {
                moved += self.chunks[pos].absorb(cut)?;
            }
            if pos + 1 < count && self.chunks[pos].len() > target_size {
                carried = self.chunks[pos].cut(target_size)?;
            }
        }

        debug!(prefix = %self.prefix, target_size, moved, "Balanced cache chunks");
        self.env.metrics.record_rebalance();
        self.env.events.publish(CacheEvent::chunks_rebalanced(
            self.prefix.clone(),
            count,
            target_size,
            moved,
        ));
        Ok(())
    }

    /// Persist every touched chunk and the metadata index.
    ///
    /// Enforces the cap first, then splits chunks that outgrow a row. Nothing
    /// is written unless the resulting metadata index also fits in a row.
    /// Split-off chunks are written before chunks rewritten in place, and the
    /// index goes last. After a storage error the in-memory instance should
    /// be discarded.
    pub fn commit(&mut self) -> Result<()> {
        if let Some(max_size) = self.max_size {
            if self.len() > max_size {
                self.truncate_to_max_size()?;
                self.balance_chunks()?;
            }
        }

        let mut split_off = Vec::new();
        for chunk in &mut self.chunks {
            split_off.extend(chunk.split_to_fit()?);
        }

        let row = metadata_row(self.chunks.iter().chain(split_off.iter()))?;
        if self.env.limit.row_too_long(&row) {
            let chunks = self.chunks.len() + split_off.len();
            self.merge(split_off);
            return Err(Error::MetadataTooLarge {
                chunks,
                size: row.len(),
                limit: self.env.limit.budget(),
            });
        }

        let written = split_off
            .iter_mut()
            .chain(self.chunks.iter_mut())
            .try_for_each(|chunk| chunk.write());
        self.merge(split_off);
        written?;
        self.env.store.set_context(&metadata_key(&self.prefix), &row)?;

        let entries = self.len();
        info!(prefix = %self.prefix, chunks = self.chunks.len(), entries, "Committed cache");
        self.env.metrics.record_commit();
        self.env.events.publish(CacheEvent::committed(
            self.prefix.clone(),
            self.chunks.len(),
            entries,
        ));
        Ok(())
    }

    fn merge(&mut self, split_off: Vec<CacheChunk<V>>) {
        self.chunks.extend(split_off);
        self.chunks.sort_by(|a, b| b.index().cmp(&a.index()));
    }
}

impl<V> fmt::Debug for Cache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("prefix", &self.prefix)
            .field("max_size", &self.max_size)
            .field("chunks", &self.chunks)
            .finish()
    }
}

/// Serialized metadata index for `chunks`, with live sizes, highest index first.
fn metadata_row<'a, V: 'a>(chunks: impl Iterator<Item = &'a CacheChunk<V>>) -> Result<String> {
    let mut records: Vec<ChunkMetadataRecord> = chunks
        .map(|chunk| ChunkMetadataRecord {
            size: chunk.len(),
            ..chunk.metadata().to_storage_form()
        })
        .collect();
    records.sort_by(|a, b| b.index.cmp(&a.index));
    serialize(&records)
}

/// Build the chunk list from the stored metadata index, without content.
fn load_chunks<V: Serialize + DeserializeOwned>(
    env: &ChunkEnv,
    prefix: &str,
) -> Result<Vec<CacheChunk<V>>> {
    let raw = env.store.get_context(&metadata_key(prefix))?;
    let records: Vec<ChunkMetadataRecord> = match raw.as_deref() {
        None | Some("") => Vec::new(),
        Some(raw) => serde_json::from_str(raw)?,
    };

    if records.is_empty() {
        let metadata = ChunkMetadata::new(prefix, MAX_KEY_HASH);
        return Ok(vec![CacheChunk::with_content(
            env.clone(),
            metadata,
            ChunkContent::new(),
        )]);
    }

    let mut metadata: Vec<ChunkMetadata> = records
        .into_iter()
        .map(|record| ChunkMetadata::from_storage_form(record, prefix))
        .collect();
    metadata.sort_by(|a, b| b.index.cmp(&a.index));

    if metadata[0].index != MAX_KEY_HASH {
        return Err(Error::CorruptMetadata(format!(
            "no catch-all chunk for prefix '{}' (highest index {})",
            prefix, metadata[0].index
        )));
    }
    if let Some(pair) = metadata.windows(2).find(|w| w[0].index == w[1].index) {
        return Err(Error::CorruptMetadata(format!(
            "duplicate chunk index {} for prefix '{}'",
            pair[0].index, prefix
        )));
    }

    Ok(metadata
        .into_iter()
        .map(|m| CacheChunk::unloaded(env.clone(), m))
        .collect())
}

// =============================================================================
// Tests
// =============================================================================
