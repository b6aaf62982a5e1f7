//! Transfer history read model, visible to both ends of the movement.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use stockline_core::{FranchiseId, TenantId};
use stockline_events::EventEnvelope;
use stockline_products::ProductId;
use stockline_transfers::{TRANSFER_AGGREGATE_TYPE, TransferEvent, TransferId};

use crate::projections::cursor::{CursorCheck, CursorError, CursorMap};
use crate::read_model::TenantStore;

/// One row per recorded transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRecord {
    pub transfer_id: TransferId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub from_franchise: FranchiseId,
    pub to_franchise: FranchiseId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum TransfersProjectionError {
    #[error("failed to deserialize transfer event: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error(transparent)]
    Cursor(#[from] CursorError),
}

/// Transfer history projection.
#[derive(Debug)]
pub struct TransfersProjection<S>
where
    S: TenantStore<TransferId, TransferRecord>,
{
    store: S,
    cursors: CursorMap,
}

impl<S> TransfersProjection<S>
where
    S: TenantStore<TransferId, TransferRecord>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: CursorMap::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, transfer_id: &TransferId) -> Option<TransferRecord> {
        self.store.get(tenant_id, transfer_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<TransferRecord> {
        let mut rows = self.store.list(tenant_id);
        rows.sort_by_key(|r| r.occurred_at);
        rows
    }

    /// Transfers touching one franchise, as either source or destination.
    pub fn list_for_franchise(
        &self,
        tenant_id: TenantId,
        franchise_id: FranchiseId,
    ) -> Vec<TransferRecord> {
        self.list(tenant_id)
            .into_iter()
            .filter(|r| r.from_franchise == franchise_id || r.to_franchise == franchise_id)
            .collect()
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), TransfersProjectionError> {
        if envelope.aggregate_type() != TRANSFER_AGGREGATE_TYPE {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(tenant_id, aggregate_id, seq)? {
            CursorCheck::Duplicate => return Ok(()),
            CursorCheck::Apply => {}
        }

        let event: TransferEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| TransfersProjectionError::Deserialize(e.to_string()))?;

        match event {
            TransferEvent::TransferRecorded(e) => {
                if e.tenant_id != tenant_id {
                    return Err(TransfersProjectionError::TenantIsolation(
                        "event tenant_id does not match envelope tenant_id".to_string(),
                    ));
                }

                self.store.upsert(
                    tenant_id,
                    e.transfer_id,
                    TransferRecord {
                        transfer_id: e.transfer_id,
                        product_id: e.product_id,
                        quantity: e.quantity,
                        from_franchise: e.from_franchise,
                        to_franchise: e.to_franchise,
                        reason: e.reason,
                        occurred_at: e.occurred_at,
                    },
                );
            }
        }

        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use stockline_core::AggregateId;
    use stockline_transfers::TransferRecorded;
    use uuid::Uuid;

    use super::*;
    use crate::read_model::InMemoryTenantStore;

    #[test]
    fn transfer_is_visible_to_both_franchises() {
        let projection = TransfersProjection::new(InMemoryTenantStore::new());
        let t = TenantId::new();
        let (from, to, other) = (FranchiseId::new(), FranchiseId::new(), FranchiseId::new());
        let transfer_id = TransferId::new(AggregateId::new());

        let event = TransferEvent::TransferRecorded(TransferRecorded {
            tenant_id: t,
            transfer_id,
            product_id: ProductId::new(AggregateId::new()),
            quantity: 4,
            from_franchise: from,
            to_franchise: to,
            reason: None,
            occurred_at: Utc::now(),
        });

        projection
            .apply_envelope(&EventEnvelope::new(
                Uuid::now_v7(),
                t,
                transfer_id.0,
                TRANSFER_AGGREGATE_TYPE,
                1,
                serde_json::to_value(&event).unwrap(),
            ))
            .unwrap();

        assert_eq!(projection.list_for_franchise(t, from).len(), 1);
        assert_eq!(projection.list_for_franchise(t, to).len(), 1);
        assert!(projection.list_for_franchise(t, other).is_empty());
        assert!(projection.get(t, &transfer_id).is_some());
    }
}
