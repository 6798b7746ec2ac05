//! Event Publisher Adapter
//!
//! Implements the `EventPublisher` port with logging and in-memory backends.

use tracing::{debug, info, warn};

use crate::domain::events::CacheEvent;
use crate::domain::ports::EventPublisher;

/// Logging-based event publisher.
///
/// Publishes cache events to the tracing system. Splits are always logged
/// at warn level, because they mean the cache is running near its sizing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingEventPublisher {
    /// Whether to log routine events at info level (true) or debug level (false)
    info_level: bool,
}

impl LoggingEventPublisher {
    /// Create a publisher that logs routine events at debug level.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a publisher that logs routine events at info level.
    pub fn info_level() -> Self {
        Self { info_level: true }
    }
}

impl EventPublisher for LoggingEventPublisher {
    fn publish(&self, event: CacheEvent) {
        let event_type = event.event_type();
        let json = serde_json::to_string(&event).unwrap_or_else(|_| format!("{:?}", event));

        if event.is_warning() {
            warn!(event_type = %event_type, event = %json, "Cache event");
        } else if self.info_level {
            info!(event_type = %event_type, event = %json, "Cache event");
        } else {
            debug!(event_type = %event_type, event = %json, "Cache event");
        }
    }
}

/// In-memory event collector.
///
/// Collects events in memory for later inspection by tests or by a host
/// that reports them through its own channel.
#[derive(Debug, Default)]
pub struct InMemoryEventCollector {
    events: parking_lot::RwLock<Vec<CacheEvent>>,
}

impl InMemoryEventCollector {
    /// Create a new in-memory event collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected events.
    pub fn events(&self) -> Vec<CacheEvent> {
        self.events.read().clone()
    }

    /// Get the count of collected events.
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Check if there are no events.
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clear all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Get events of a specific type.
    pub fn events_of_type(&self, event_type: &str) -> Vec<CacheEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .cloned()
            .collect()
    }
}

impl EventPublisher for InMemoryEventCollector {
    fn publish(&self, event: CacheEvent) {
        self.events.write().push(event);
    }

    fn publish_all(&self, events: Vec<CacheEvent>) {
        self.events.write().extend(events);
    }
}
