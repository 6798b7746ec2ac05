//! Domain Ports (Port/Adapter Pattern)
//!
//! This module defines the abstractions the cache depends on. The host
//! provides the concrete implementations; the cache never sees a host SDK.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Cache Layer                           │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │           ContextStore │ EventPublisher              │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                  Adapters (Impls)                    │    │
//! │  │  InMemoryContextStore │ FileContextStore │ Logging  │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::error::Result;

use super::events::CacheEvent;

// =============================================================================
// Context Storage Port
// =============================================================================

/// Port for the host's per-key context store.
///
/// Every value is a string bounded by the host's maximum property length.
/// The store offers no transactions, only single-key get/set.
///
/// # Example
///
/// ```ignore
/// struct ConnectorContext { /* ... */ }
///
/// impl ContextStore for ConnectorContext {
///     fn get_context(&self, key: &str) -> Result<Option<String>> {
///         self.sdk.get_connector_context_property(key)
///     }
///
///     fn set_context(&self, key: &str, value: &str) -> Result<()> {
///         self.sdk.set_connector_context_property(key, value)
///     }
/// }
/// ```
pub trait ContextStore: Send + Sync {
    /// Read the value stored under `key`, `None` if it was never written.
    fn get_context(&self, key: &str) -> Result<Option<String>>;

    /// Write `value` under `key`, replacing any previous value.
    fn set_context(&self, key: &str, value: &str) -> Result<()>;
}

// =============================================================================
// Event Publisher Port
// =============================================================================

/// Port for publishing cache diagnostic events.
///
/// Publishing is fire-and-forget: an implementation must never fail the
/// cache operation that produced the event.
pub trait EventPublisher: Send + Sync {
    /// Publish a cache event.
    fn publish(&self, event: CacheEvent);

    /// Publish multiple events.
    fn publish_all(&self, events: Vec<CacheEvent>) {
        for event in events {
            self.publish(event);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
