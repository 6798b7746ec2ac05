//! Domain Layer
//!
//! Ports the cache depends on and the events it emits.
//!
//! - **Ports** (`ports.rs`) - `ContextStore` and `EventPublisher` traits
//! - **Events** (`events.rs`) - `CacheEvent` diagnostic records
//!
//! # Usage
//!
//! ```ignore
//! use ctxcache::domain::ports::ContextStore;
//!
//! fn read_marker<S: ContextStore>(store: &S) -> Result<Option<String>> {
//!     store.get_context("connector_marker")
//! }
//! ```

pub mod events;
pub mod ports;

pub use events::CacheEvent;
pub use ports::{ContextStore, EventPublisher};
