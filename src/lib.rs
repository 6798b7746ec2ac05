//! ctxcache - Chunked Key-Value Cache over a Context Store
//!
//! Integrations that run as short-lived invocations often get a single
//! persistence facility: a string-keyed store whose values are capped in
//! length. This crate keeps a dictionary of JSON values across invocations
//! in such a store by spreading it over several rows.
//!
//! # Architecture
//!
//! ```text
//! Cache (routing, eviction, commit)
//!   └── CacheChunk × N (lazy load, split on overflow)
//!         └── ContextStore port ── InMemoryContextStore | FileContextStore
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - Context store and event publisher implementations
//! - [`cache`] - Chunked cache, chunks, routing and configuration
//! - [`domain`] - Ports and events
//! - [`error`] - Error types
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ctxcache::{Cache, InMemoryContextStore};
//!
//! let store = Arc::new(InMemoryContextStore::new());
//! let mut cache = Cache::new(store, "phishing_connector", Some(3000))?;
//! cache.set("alert-1", serde_json::json!({"seen": true}))?;
//! cache.commit()?;
//! ```

pub mod adapters;
pub mod cache;
pub mod domain;
pub mod error;

// Re-export commonly used types
pub use adapters::{FileContextStore, InMemoryContextStore, LoggingEventPublisher};
pub use cache::{Cache, CacheConfig, ChunkMetadata, KeyHash, MAX_KEY_HASH};
pub use domain::{CacheEvent, ContextStore, EventPublisher};
pub use error::{Error, Result};
