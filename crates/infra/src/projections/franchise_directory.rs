//! Franchise directory read model.

use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use stockline_core::{FranchiseId, TenantId};
use stockline_events::EventEnvelope;
use stockline_franchises::{FRANCHISE_AGGREGATE_TYPE, FranchiseEvent, FranchiseStatus};

use crate::projections::cursor::{CursorCheck, CursorError, CursorMap};
use crate::read_model::TenantStore;

/// One row per registered franchise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FranchiseRow {
    pub franchise_id: FranchiseId,
    pub name: String,
    pub city: Option<String>,
    pub status: FranchiseStatus,
}

#[derive(Debug, Error)]
pub enum FranchiseDirectoryError {
    #[error("failed to deserialize franchise event: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error(transparent)]
    Cursor(#[from] CursorError),
}

/// Franchise directory projection.
#[derive(Debug)]
pub struct FranchiseDirectoryProjection<S>
where
    S: TenantStore<FranchiseId, FranchiseRow>,
{
    store: S,
    cursors: CursorMap,
}

impl<S> FranchiseDirectoryProjection<S>
where
    S: TenantStore<FranchiseId, FranchiseRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: CursorMap::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, franchise_id: &FranchiseId) -> Option<FranchiseRow> {
        self.store.get(tenant_id, franchise_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<FranchiseRow> {
        let mut rows = self.store.list(tenant_id);
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), FranchiseDirectoryError> {
        if envelope.aggregate_type() != FRANCHISE_AGGREGATE_TYPE {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(tenant_id, aggregate_id, seq)? {
            CursorCheck::Duplicate => return Ok(()),
            CursorCheck::Apply => {}
        }

        let event: FranchiseEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| FranchiseDirectoryError::Deserialize(e.to_string()))?;

        let event_tenant = match &event {
            FranchiseEvent::FranchiseRegistered(e) => e.tenant_id,
            FranchiseEvent::FranchiseClosed(e) => e.tenant_id,
        };
        if event_tenant != tenant_id {
            return Err(FranchiseDirectoryError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }

        match event {
            FranchiseEvent::FranchiseRegistered(e) => {
                self.store.upsert(
                    tenant_id,
                    e.franchise_id,
                    FranchiseRow {
                        franchise_id: e.franchise_id,
                        name: e.name,
                        city: e.city,
                        status: FranchiseStatus::Open,
                    },
                );
            }
            FranchiseEvent::FranchiseClosed(e) => {
                if let Some(mut row) = self.store.get(tenant_id, &e.franchise_id) {
                    row.status = FranchiseStatus::Closed;
                    self.store.upsert(tenant_id, e.franchise_id, row);
                }
            }
        }

        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use stockline_core::AggregateId;
    use stockline_franchises::{FranchiseClosed, FranchiseRegistered};
    use uuid::Uuid;

    use super::*;
    use crate::read_model::InMemoryTenantStore;

    #[test]
    fn register_then_close_updates_the_row() {
        let projection = FranchiseDirectoryProjection::new(InMemoryTenantStore::new());
        let (t, f) = (TenantId::new(), FranchiseId::new());
        let stream = AggregateId::from_uuid(*f.as_uuid());

        let registered = FranchiseEvent::FranchiseRegistered(FranchiseRegistered {
            tenant_id: t,
            franchise_id: f,
            name: "Downtown".to_string(),
            city: Some("Lahore".to_string()),
            occurred_at: Utc::now(),
        });
        projection
            .apply_envelope(&EventEnvelope::new(
                Uuid::now_v7(),
                t,
                stream,
                FRANCHISE_AGGREGATE_TYPE,
                1,
                serde_json::to_value(&registered).unwrap(),
            ))
            .unwrap();

        assert_eq!(projection.list(t).len(), 1);
        assert_eq!(projection.get(t, &f).unwrap().status, FranchiseStatus::Open);

        let closed = FranchiseEvent::FranchiseClosed(FranchiseClosed {
            tenant_id: t,
            franchise_id: f,
            occurred_at: Utc::now(),
        });
        projection
            .apply_envelope(&EventEnvelope::new(
                Uuid::now_v7(),
                t,
                stream,
                FRANCHISE_AGGREGATE_TYPE,
                2,
                serde_json::to_value(&closed).unwrap(),
            ))
            .unwrap();

        assert_eq!(projection.get(t, &f).unwrap().status, FranchiseStatus::Closed);
    }
}
