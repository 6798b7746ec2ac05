//! Infrastructure Adapters
//!
//! Adapter implementations for the domain ports, following the
//! Port/Adapter (Hexagonal) architecture pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                    Ports (Traits)                           │ │
//! │  │             ContextStore │ EventPublisher                   │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │ InMemoryContextStore │ FileContextStore                     │ │
//! │  │ LoggingEventPublisher │ InMemoryEventCollector             │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod event_publisher;
mod file;
mod memory;

pub use event_publisher::{InMemoryEventCollector, LoggingEventPublisher};
pub use file::FileContextStore;
pub use memory::{ContextStoreStats, InMemoryContextStore};
