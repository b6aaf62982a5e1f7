//! Event-sourced aggregate contracts.

use crate::error::{DomainError, DomainResult};

/// What a caller believes the stream version to be when appending.
///
/// `Exact` is the optimistic-concurrency guard: if another writer got in
/// first, the append is rejected and the caller re-reads and retries.
/// `Any` skips the check for writes where last-writer-wins is acceptable.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    Any,
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(expected) => expected == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

/// Identity and revision of a domain aggregate.
pub trait AggregateRoot {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Stream revision: the count of events applied so far. A freshly
    /// constructed aggregate reports 0.
    fn version(&self) -> u64;
}

/// Command handling and state evolution, kept pure.
///
/// `handle` decides; `apply` evolves. Neither performs IO, so the whole
/// decision path can be unit tested by feeding events and commands.
/// Rehydration is `apply` in a loop over the stored stream.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    /// Fold one event into state. Implementations bump `version()` by one
    /// per event and must be deterministic, since the same code path runs
    /// both live and during replay.
    fn apply(&mut self, event: &Self::Event);

    /// Validate `command` against current state and return the resulting
    /// events, or the domain-specific rejection. Never mutates `self`.
    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_matches_every_version() {
        for actual in [0, 1, 42] {
            assert!(ExpectedVersion::Any.matches(actual));
            assert!(ExpectedVersion::Any.check(actual).is_ok());
        }
    }

    #[test]
    fn exact_rejects_a_stale_version() {
        assert!(ExpectedVersion::Exact(3).check(3).is_ok());

        let err = ExpectedVersion::Exact(3).check(4).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }
}
