use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockline_core::{AggregateId, TenantId};

/// A stored event plus the stream metadata needed to route and replay it.
///
/// The envelope is what travels through the store and over the bus; the
/// domain payload stays opaque to both. Fields are private so an envelope
/// can only be built whole via [`EventEnvelope::new`], never patched after
/// the fact.
///
/// `tenant_id` is the isolation boundary: every read path checks it before
/// touching the payload. `sequence_number` is the 1-based position within
/// the aggregate stream and is what projections key their idempotency
/// cursors on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    aggregate_type: String,
    sequence_number: u64,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            tenant_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            sequence_number,
            payload,
        }
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    /// Stream kind tag (e.g. `"ledger.stock"`). Projections use this to
    /// skip envelopes they don't consume without deserializing the payload.
    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    /// 1-based position within the aggregate stream.
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }
}

impl<E> crate::tenant::TenantScoped for EventEnvelope<E> {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
