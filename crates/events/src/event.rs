use chrono::{DateTime, Utc};

/// Contract every domain event satisfies.
///
/// An event is a fact: once emitted it is never edited or deleted, only
/// appended after. The schema version exists so a payload can evolve
/// without rewriting history.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable dotted name, e.g. `"ledger.stock.received"`. Persisted
    /// alongside the payload, so renaming is a breaking change.
    fn event_type(&self) -> &'static str;

    /// Payload schema version.
    fn version(&self) -> u32;

    /// Business time at which the fact happened (not when it was stored).
    fn occurred_at(&self) -> DateTime<Utc>;
}
