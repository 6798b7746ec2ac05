//! Chunked Cache Integration Tests
//!
//! End-to-end behaviour through the public API:
//! - Persistence across instances (in-memory and file-backed stores)
//! - Eviction under a size cap
//! - Splitting of chunks that outgrow a storage row
//! - Error surfaces

use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::{json, Value};

use ctxcache::adapters::InMemoryEventCollector;
use ctxcache::{Cache, CacheConfig, ContextStore, Error, FileContextStore, InMemoryContextStore};

fn open(store: &Arc<InMemoryContextStore>, max_size: Option<usize>) -> Cache<Value> {
    Cache::new(store.clone(), "connector", max_size).unwrap()
}

// =============================================================================
// Persistence
// =============================================================================

mod persistence_tests {
    use super::*;

    #[test]
    fn test_commit_and_reopen() {
        let store = Arc::new(InMemoryContextStore::new());

        let mut cache = open(&store, None);
        cache.set("a", json!(1)).unwrap();
        cache.set("b", json!(2)).unwrap();
        cache.commit().unwrap();

        let mut reopened = open(&store, None);
        assert_eq!(reopened.get("a").unwrap(), &json!(1));
        assert_eq!(reopened.get("b").unwrap(), &json!(2));
        assert_eq!(reopened.len(), 2);
    }

    #[test]
    fn test_uncommitted_changes_are_not_visible() {
        let store = Arc::new(InMemoryContextStore::new());

        let mut cache = open(&store, None);
        cache.set("a", json!(1)).unwrap();

        let reopened = open(&store, None);
        assert!(reopened.is_empty());
        assert_eq!(store.stats().writes, 0);
    }

    #[test]
    fn test_prefixes_are_isolated() {
        let store = Arc::new(InMemoryContextStore::new());

        let mut first: Cache<Value> = Cache::new(store.clone(), "first", None).unwrap();
        first.set("shared", json!("one")).unwrap();
        first.commit().unwrap();

        let mut second: Cache<Value> = Cache::new(store.clone(), "second", None).unwrap();
        assert_matches!(second.get("shared"), Err(Error::KeyNotFound(_)));
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.json");

        {
            let store = Arc::new(FileContextStore::open(&path).unwrap());
            let mut cache: Cache<Value> = Cache::new(store, "connector", None).unwrap();
            cache.set("alert-1", json!({"seen": true})).unwrap();
            cache.commit().unwrap();
        }

        let store = Arc::new(FileContextStore::open(&path).unwrap());
        assert!(store.keys().contains(&"connector_cache_chunks_metadata".to_string()));

        let mut cache: Cache<Value> = Cache::new(store, "connector", None).unwrap();
        assert_eq!(cache.get("alert-1").unwrap(), &json!({"seen": true}));
    }

    #[test]
    fn test_typed_values() {
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Seen {
            id: u64,
            tags: Vec<String>,
        }

        let store = Arc::new(InMemoryContextStore::new());
        let mut cache: Cache<Seen> = Cache::new(store.clone(), "typed", None).unwrap();
        let seen = Seen {
            id: 7,
            tags: vec!["phish".to_string()],
        };
        cache.set("x", seen.clone()).unwrap();
        cache.commit().unwrap();

        let mut reopened: Cache<Seen> = Cache::new(store, "typed", None).unwrap();
        assert_eq!(reopened.get("x").unwrap(), &seen);
    }
}

// =============================================================================
// Eviction
// =============================================================================

mod eviction_tests {
    use super::*;

    #[test]
    fn test_max_size_one_keeps_latest() {
        let store = Arc::new(InMemoryContextStore::new());

        let mut cache = open(&store, Some(1));
        cache.set("a", json!(1)).unwrap();
        cache.set("b", json!(2)).unwrap();
        cache.commit().unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.keys().unwrap(), vec!["b".to_string()]);

        let mut reopened = open(&store, Some(1));
        assert_eq!(reopened.get("b").unwrap(), &json!(2));
        assert_matches!(reopened.get("a"), Err(Error::KeyNotFound(_)));
    }

    #[test]
    fn test_commit_enforces_cap_after_reopen() {
        let store = Arc::new(InMemoryContextStore::new());

        let mut cache = open(&store, None);
        for i in 0..50 {
            cache.set(format!("k{}", i), json!(i)).unwrap();
        }
        cache.commit().unwrap();

        let mut capped = open(&store, Some(10));
        capped.commit().unwrap();
        assert!(capped.len() <= 10);

        let reopened = open(&store, None);
        assert!(reopened.len() <= 10);
    }
}

// =============================================================================
// Splitting
// =============================================================================

mod split_tests {
    use super::*;

    #[test]
    fn test_large_content_splits_into_chunks() {
        let store = Arc::new(InMemoryContextStore::new());
        let events = Arc::new(InMemoryEventCollector::new());
        let config = CacheConfig::new("connector").with_max_property_value(2_000);
        let budget = config.row_limit().budget();

        let mut cache: Cache<Value> =
            Cache::with_events(store.clone(), config.clone(), events.clone()).unwrap();
        for i in 0..100 {
            cache.set(format!("alert-{}", i), json!("p".repeat(100))).unwrap();
        }
        cache.commit().unwrap();

        assert!(cache.chunk_count() > 1);
        assert!(store.longest_value() < budget);
        assert!(!events.events_of_type("ChunkSplit").is_empty());

        let mut reopened: Cache<Value> = Cache::with_config(store.clone(), config).unwrap();
        assert_eq!(reopened.chunk_count(), cache.chunk_count());
        for i in 0..100 {
            assert_eq!(
                reopened.get(&format!("alert-{}", i)).unwrap(),
                &json!("p".repeat(100))
            );
        }
    }

    #[test]
    fn test_default_limits_split_large_values() {
        let store = Arc::new(InMemoryContextStore::new());

        let mut cache = open(&store, None);
        for i in 0..20 {
            cache.set(format!("blob-{}", i), json!("z".repeat(8_000))).unwrap();
        }
        cache.commit().unwrap();

        let chunks = cache.chunk_metadata();
        assert!(chunks.len() > 1);
        assert_eq!(chunks.iter().map(|c| c.size).sum::<usize>(), 20);
        assert!(store.longest_value() < ctxcache::cache::MAXIMUM_PROPERTY_VALUE - 40);

        let mut reopened = open(&store, None);
        assert_eq!(reopened.keys().unwrap().len(), 20);
    }

    #[test]
    fn test_untouched_chunks_are_not_rewritten() {
        let store = Arc::new(InMemoryContextStore::new());
        let config = CacheConfig::new("connector").with_max_property_value(1_000);

        let mut cache: Cache<Value> = Cache::with_config(store.clone(), config.clone()).unwrap();
        for i in 0..60 {
            cache.set(format!("k{}", i), json!("v".repeat(30))).unwrap();
        }
        cache.commit().unwrap();
        let writes_before = store.stats().writes;

        let mut reopened: Cache<Value> = Cache::with_config(store.clone(), config).unwrap();
        reopened.set("k0", json!("updated")).unwrap();
        reopened.commit().unwrap();

        // One chunk plus the metadata index
        assert_eq!(store.stats().writes, writes_before + 2);
    }
}

// =============================================================================
// Errors
// =============================================================================

mod error_tests {
    use super::*;

    #[test]
    fn test_delete_missing_key() {
        let store = Arc::new(InMemoryContextStore::new());
        let mut cache = open(&store, None);

        let err = cache.delete("missing").unwrap_err();
        assert_matches!(err, Error::KeyNotFound(ref key) if key == "missing");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_oversized_entry_rejected_at_set() {
        let store = Arc::new(InMemoryContextStore::new());
        let mut cache = open(&store, None);

        let err = cache
            .set("huge", json!("x".repeat(ctxcache::cache::MAXIMUM_PROPERTY_VALUE)))
            .unwrap_err();
        assert_matches!(err, Error::EntryTooLarge { .. });
        cache.commit().unwrap();
    }

    #[test]
    fn test_metadata_index_over_budget_writes_nothing() {
        let store = Arc::new(InMemoryContextStore::with_value_limit(600));
        let config = CacheConfig::new("connector").with_max_property_value(600);

        let mut cache: Cache<Value> = Cache::with_config(store.clone(), config.clone()).unwrap();
        for i in 0..200 {
            cache.set(format!("alert-{}", i), json!("x".repeat(20))).unwrap();
        }

        assert_matches!(cache.commit(), Err(Error::MetadataTooLarge { limit: 560, .. }));
        assert!(store.keys().is_empty());
        assert_eq!(cache.len(), 200);

        let reopened: Cache<Value> = Cache::with_config(store, config).unwrap();
        assert!(reopened.is_empty());
    }

    #[test]
    fn test_malformed_metadata_is_fatal() {
        let store = Arc::new(InMemoryContextStore::new());
        store
            .set_context("connector_cache_chunks_metadata", "not json")
            .unwrap();

        let result: ctxcache::Result<Cache<Value>> = Cache::new(store, "connector", None);
        assert_matches!(result, Err(Error::Json(_)));
    }

    #[test]
    fn test_malformed_chunk_is_fatal_on_access() {
        let store = Arc::new(InMemoryContextStore::new());
        let mut cache = open(&store, None);
        cache.set("a", json!(1)).unwrap();
        cache.commit().unwrap();

        store.set_context("connector_99999999", "{broken").unwrap();

        let mut reopened = open(&store, None);
        assert_eq!(reopened.len(), 1);
        assert_matches!(reopened.get("a"), Err(Error::Json(_)));
    }
}
