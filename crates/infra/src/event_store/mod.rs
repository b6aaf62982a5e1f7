//! Append-only event store boundary.
//!
//! Storage-agnostic abstraction for tenant-scoped event streams. The
//! in-memory implementation backs tests and single-process deployments.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
