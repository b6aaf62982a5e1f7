//! Event plumbing shared by every domain crate: the [`Event`] contract,
//! the persisted [`EventEnvelope`], and the [`EventBus`] pub/sub seam with
//! its in-memory implementation.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod tenant;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use tenant::TenantScoped;
