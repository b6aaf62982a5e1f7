use std::collections::HashMap;
use std::sync::RwLock;

use stockline_core::{AggregateId, ExpectedVersion, TenantId};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// One aggregate stream. The type tag is fixed at first append so a stream
/// can never change kind mid-history.
#[derive(Debug)]
struct Stream {
    aggregate_type: String,
    events: Vec<StoredEvent>,
}

impl Stream {
    fn head(&self) -> u64 {
        self.events.last().map_or(0, |e| e.sequence_number)
    }
}

/// In-memory [`EventStore`].
///
/// A single `RwLock` over all streams makes the version check and the
/// sequence assignment of an append atomic; readers share the lock.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<(TenantId, AggregateId), Stream>>,
}

/// Target of an append batch, extracted from its first event.
struct BatchTarget {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    aggregate_type: String,
}

/// Every event in a batch must address one stream of one kind.
fn batch_target(events: &[UncommittedEvent]) -> Result<BatchTarget, EventStoreError> {
    let first = &events[0];

    for (idx, e) in events.iter().enumerate().skip(1) {
        if e.tenant_id != first.tenant_id {
            return Err(EventStoreError::TenantIsolation(format!(
                "batch contains multiple tenant_ids (index {idx})"
            )));
        }
        if e.aggregate_id != first.aggregate_id {
            return Err(EventStoreError::InvalidAppend(format!(
                "batch contains multiple aggregate_ids (index {idx})"
            )));
        }
        if e.aggregate_type != first.aggregate_type {
            return Err(EventStoreError::AggregateTypeMismatch(format!(
                "batch contains multiple aggregate_types (index {idx})"
            )));
        }
    }

    Ok(BatchTarget {
        tenant_id: first.tenant_id,
        aggregate_id: first.aggregate_id,
        aggregate_type: first.aggregate_type.clone(),
    })
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }

        let target = batch_target(&events)?;

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::InvalidAppend("store lock poisoned".to_string()))?;

        let stream = streams
            .entry((target.tenant_id, target.aggregate_id))
            .or_insert_with(|| Stream {
                aggregate_type: target.aggregate_type.clone(),
                events: Vec::new(),
            });

        if stream.aggregate_type != target.aggregate_type {
            return Err(EventStoreError::AggregateTypeMismatch(format!(
                "stream aggregate_type is '{}', attempted append with '{}'",
                stream.aggregate_type, target.aggregate_type
            )));
        }

        let head = stream.head();
        if !expected_version.matches(head) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {head}"
            )));
        }

        let committed: Vec<StoredEvent> = events
            .into_iter()
            .zip(head + 1..)
            .map(|(e, sequence_number)| StoredEvent {
                event_id: e.event_id,
                tenant_id: e.tenant_id,
                aggregate_id: e.aggregate_id,
                aggregate_type: e.aggregate_type,
                sequence_number,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            })
            .collect();

        stream.events.extend_from_slice(&committed);

        Ok(committed)
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("store lock poisoned".to_string()))?;

        Ok(streams
            .get(&(tenant_id, aggregate_id))
            .map(|s| s.events.clone())
            .unwrap_or_default())
    }
}
