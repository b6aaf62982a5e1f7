//! Per-sale read model (the sales listing endpoint).

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use stockline_core::{FranchiseId, TenantId};
use stockline_events::EventEnvelope;
use stockline_sales::{SALE_AGGREGATE_TYPE, SaleEvent, SaleId, SaleStatus};

use crate::projections::cursor::{CursorCheck, CursorError, CursorMap};
use crate::read_model::TenantStore;

/// One row per recorded sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaleRow {
    pub sale_id: SaleId,
    pub franchise_id: FranchiseId,
    pub status: SaleStatus,
    pub line_count: u32,
    pub total_amount: u64,
    pub total_cost: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum SalesLogProjectionError {
    #[error("failed to deserialize sale event: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error(transparent)]
    Cursor(#[from] CursorError),
}

/// Sales log projection: one row per sale, updated in place on void.
#[derive(Debug)]
pub struct SalesLogProjection<S>
where
    S: TenantStore<SaleId, SaleRow>,
{
    store: S,
    cursors: CursorMap,
}

impl<S> SalesLogProjection<S>
where
    S: TenantStore<SaleId, SaleRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: CursorMap::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, sale_id: &SaleId) -> Option<SaleRow> {
        self.store.get(tenant_id, sale_id)
    }

    /// All sales for one tenant, newest first.
    pub fn list(&self, tenant_id: TenantId) -> Vec<SaleRow> {
        let mut rows = self.store.list(tenant_id);
        rows.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        rows
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), SalesLogProjectionError> {
        if envelope.aggregate_type() != SALE_AGGREGATE_TYPE {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(tenant_id, aggregate_id, seq)? {
            CursorCheck::Duplicate => return Ok(()),
            CursorCheck::Apply => {}
        }

        let event: SaleEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| SalesLogProjectionError::Deserialize(e.to_string()))?;

        let event_tenant = match &event {
            SaleEvent::SaleRecorded(e) => e.tenant_id,
            SaleEvent::SaleVoided(e) => e.tenant_id,
        };
        if event_tenant != tenant_id {
            return Err(SalesLogProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }

        match event {
            SaleEvent::SaleRecorded(e) => {
                self.store.upsert(
                    tenant_id,
                    e.sale_id,
                    SaleRow {
                        sale_id: e.sale_id,
                        franchise_id: e.franchise_id,
                        status: SaleStatus::Recorded,
                        line_count: e.lines.len() as u32,
                        total_amount: e.total_amount,
                        total_cost: e.total_cost,
                        occurred_at: e.occurred_at,
                    },
                );
            }
            SaleEvent::SaleVoided(e) => {
                if let Some(mut row) = self.store.get(tenant_id, &e.sale_id) {
                    row.status = SaleStatus::Voided;
                    self.store.upsert(tenant_id, e.sale_id, row);
                }
            }
        }

        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }
}
