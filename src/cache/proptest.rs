//! Property-Based Tests for the Chunked Cache
//!
//! # Test Properties
//!
//! 1. **Persistence**: what one instance commits, a fresh instance reads back
//! 2. **Size Accounting**: `len()` matches the number of distinct live keys
//! 3. **Eviction Bound**: after `commit()` the cap holds
//! 4. **Row Bound**: no committed row, metadata index included, exceeds the budget
//! 5. **Split Correctness**: a split partitions the hash range cleanly

#![cfg(test)]

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{json, Value};

use super::config::CacheConfig;
use super::hashing::hash_key;
use super::store::Cache;
use super::MAX_KEY_HASH;
use crate::adapters::InMemoryContextStore;
use crate::error::Error;

// =============================================================================
// Property Strategies
// =============================================================================

fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9_-]{1,12}"
}

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(|n| json!(n)),
        "[ -~]{0,40}".prop_map(|s| json!(s)),
        any::<bool>().prop_map(|b| json!({ "flag": b })),
    ]
}

/// Small rows force splits while the metadata index still fits.
fn small_config() -> CacheConfig {
    CacheConfig::new("prop").with_max_property_value(2_000)
}

/// Rows small enough that the metadata index may outgrow one.
fn tight_config() -> CacheConfig {
    CacheConfig::new("prop").with_max_property_value(600)
}

#[derive(Debug, Clone)]
enum Op {
    Set(String, Value),
    Delete(String),
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            3 => (key_strategy(), value_strategy()).prop_map(|(k, v)| Op::Set(k, v)),
            1 => key_strategy().prop_map(Op::Delete),
        ],
        1..120,
    )
}

fn apply(cache: &mut Cache<Value>, model: &mut BTreeMap<String, Value>, ops: &[Op]) {
    for op in ops {
        match op {
            Op::Set(key, value) => {
                cache.set(key.clone(), value.clone()).unwrap();
                model.insert(key.clone(), value.clone());
            }
            Op::Delete(key) => {
                let expected = model.remove(key);
                assert_eq!(cache.delete(key).ok(), expected);
            }
        }
    }
}

// =============================================================================
// Persistence Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: A fresh instance sees exactly the committed content.
    #[test]
    fn prop_commit_then_reopen(ops in ops_strategy()) {
        let store = Arc::new(InMemoryContextStore::new());
        let mut cache = Cache::with_config(store.clone(), small_config())?;
        let mut model = BTreeMap::new();

        apply(&mut cache, &mut model, &ops);
        cache.commit()?;

        let mut reopened: Cache<Value> = Cache::with_config(store.clone(), small_config())?;
        prop_assert_eq!(reopened.len(), model.len());
        for (key, value) in &model {
            prop_assert_eq!(reopened.get(key)?, value);
        }

        let content: BTreeMap<String, Value> = reopened.content()?.into_iter().collect();
        prop_assert_eq!(content, model);
    }

    /// Property: Every committed row fits in the budget, metadata index
    /// included; a commit whose index would not fit writes nothing.
    #[test]
    fn prop_rows_stay_within_budget(ops in ops_strategy()) {
        let store = Arc::new(InMemoryContextStore::new());
        let config = tight_config();
        let budget = config.row_limit().budget();
        let mut cache = Cache::with_config(store.clone(), config)?;
        let mut model = BTreeMap::new();

        apply(&mut cache, &mut model, &ops);
        match cache.commit() {
            Ok(()) => prop_assert!(store.longest_value() < budget),
            Err(Error::MetadataTooLarge { size, limit, .. }) => {
                prop_assert!(size >= limit);
                prop_assert_eq!(store.stats().writes, 0);
                prop_assert_eq!(cache.len(), model.len());
            }
            Err(e) => return Err(TestCaseError::fail(e.to_string())),
        }
    }

    /// Property: Chunk indices stay unique, descending and led by the catch-all.
    #[test]
    fn prop_chunk_indices_ordered(ops in ops_strategy()) {
        let store = Arc::new(InMemoryContextStore::new());
        let mut cache = Cache::with_config(store.clone(), small_config())?;
        let mut model = BTreeMap::new();

        apply(&mut cache, &mut model, &ops);
        cache.commit()?;

        let metadata = cache.chunk_metadata();
        prop_assert_eq!(metadata[0].index, MAX_KEY_HASH);
        prop_assert!(metadata.windows(2).all(|w| w[0].index > w[1].index));
    }
}

// =============================================================================
// Size and Eviction Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: len() counts distinct live keys.
    #[test]
    fn prop_len_matches_model(ops in ops_strategy()) {
        let store = Arc::new(InMemoryContextStore::new());
        let mut cache = Cache::with_config(store, small_config())?;
        let mut model = BTreeMap::new();

        apply(&mut cache, &mut model, &ops);

        prop_assert_eq!(cache.len(), model.len());
        prop_assert_eq!(cache.is_empty(), model.is_empty());
    }

    /// Property: After commit the cap holds.
    #[test]
    fn prop_commit_enforces_max_size(
        keys in prop::collection::btree_set(key_strategy(), 1..80),
        max_size in 1usize..20,
    ) {
        let store = Arc::new(InMemoryContextStore::new());
        let config = small_config().with_max_size(Some(max_size));
        let mut cache: Cache<Value> = Cache::with_config(store.clone(), config)?;

        for key in &keys {
            cache.set(key.clone(), json!(key.len()))?;
        }
        cache.commit()?;

        prop_assert!(cache.len() <= max_size);
        let reopened: Cache<Value> = Cache::with_config(store, small_config())?;
        prop_assert!(reopened.len() <= max_size);
    }
}

// =============================================================================
// Routing Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: Hashes are stable and inside the hash space.
    #[test]
    fn prop_hash_in_range(key in ".{0,64}") {
        let hash = hash_key(&key);
        prop_assert!(hash <= MAX_KEY_HASH);
        prop_assert_eq!(hash, hash_key(&key));
    }

    /// Property: The routed chunk is the smallest index not below the hash.
    #[test]
    fn prop_route_picks_tightest_chunk(
        keys in prop::collection::btree_set(key_strategy(), 20..100),
        lookup in key_strategy(),
    ) {
        let store = Arc::new(InMemoryContextStore::new());
        let mut cache: Cache<Value> = Cache::with_config(store, small_config())?;
        for key in &keys {
            cache.set(key.clone(), json!("v".repeat(20)))?;
        }
        cache.commit()?;

        let hash = hash_key(&lookup);
        let expected = cache
            .chunk_metadata()
            .iter()
            .map(|m| m.index)
            .filter(|&index| index >= hash)
            .min();
        prop_assert_eq!(Some(cache.route(&lookup)), expected);
    }
}
