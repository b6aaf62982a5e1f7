//! Per-franchise sales summary read model (revenue, cost, profit).

use std::collections::HashMap;
use std::sync::RwLock;

use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use stockline_core::{FranchiseId, TenantId};
use stockline_events::EventEnvelope;
use stockline_sales::{SALE_AGGREGATE_TYPE, SaleEvent, SaleId};

use crate::projections::cursor::{CursorCheck, CursorError, CursorMap};
use crate::read_model::TenantStore;

/// Aggregated sales figures for one franchise.
///
/// Amounts are signed so voids can subtract; a franchise that voids more
/// value than it has recorded (impossible through the command path) would
/// simply go negative instead of panicking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FranchiseSalesSummary {
    pub franchise_id: FranchiseId,
    pub sales_count: u64,
    pub voided_count: u64,
    pub revenue: i64,
    pub cost: i64,
}

impl FranchiseSalesSummary {
    fn empty(franchise_id: FranchiseId) -> Self {
        Self {
            franchise_id,
            sales_count: 0,
            voided_count: 0,
            revenue: 0,
            cost: 0,
        }
    }

    pub fn profit(&self) -> i64 {
        self.revenue - self.cost
    }
}

#[derive(Debug, Error)]
pub enum SalesSummaryProjectionError {
    #[error("failed to deserialize sale event: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error(transparent)]
    Cursor(#[from] CursorError),
}

#[derive(Debug, Clone, Copy)]
struct SaleFacts {
    franchise_id: FranchiseId,
    total_amount: u64,
    total_cost: u64,
}

/// Sales summary projection.
///
/// Keeps a private index of recorded sales so a later void can subtract the
/// right amounts from the right franchise.
#[derive(Debug)]
pub struct SalesSummaryProjection<S>
where
    S: TenantStore<FranchiseId, FranchiseSalesSummary>,
{
    store: S,
    sales: RwLock<HashMap<(TenantId, SaleId), SaleFacts>>,
    cursors: CursorMap,
}

impl<S> SalesSummaryProjection<S>
where
    S: TenantStore<FranchiseId, FranchiseSalesSummary>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            sales: RwLock::new(HashMap::new()),
            cursors: CursorMap::new(),
        }
    }

    pub fn get(
        &self,
        tenant_id: TenantId,
        franchise_id: FranchiseId,
    ) -> Option<FranchiseSalesSummary> {
        self.store.get(tenant_id, &franchise_id)
    }

    /// Per-franchise summaries for one tenant (the reporting endpoint).
    pub fn list(&self, tenant_id: TenantId) -> Vec<FranchiseSalesSummary> {
        let mut rows = self.store.list(tenant_id);
        rows.sort_by_key(|r| *r.franchise_id.as_uuid());
        rows
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), SalesSummaryProjectionError> {
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
            .map_err(|e| SalesSummaryProjectionError::Deserialize(e.to_string()))?;

        match event {
            SaleEvent::SaleRecorded(e) => {
                if e.tenant_id != tenant_id {
                    return Err(SalesSummaryProjectionError::TenantIsolation(
                        "event tenant_id does not match envelope tenant_id".to_string(),
                    ));
                }

                let mut summary = self
                    .store
                    .get(tenant_id, &e.franchise_id)
                    .unwrap_or_else(|| FranchiseSalesSummary::empty(e.franchise_id));
                summary.sales_count += 1;
                summary.revenue += e.total_amount as i64;
                summary.cost += e.total_cost as i64;
                self.store.upsert(tenant_id, e.franchise_id, summary);

                if let Ok(mut sales) = self.sales.write() {
                    sales.insert(
                        (tenant_id, e.sale_id),
                        SaleFacts {
                            franchise_id: e.franchise_id,
                            total_amount: e.total_amount,
                            total_cost: e.total_cost,
                        },
                    );
                }
            }
            SaleEvent::SaleVoided(e) => {
                let facts = self
                    .sales
                    .read()
                    .ok()
                    .and_then(|m| m.get(&(tenant_id, e.sale_id)).copied());

                if let Some(facts) = facts {
                    let mut summary = self
                        .store
                        .get(tenant_id, &facts.franchise_id)
                        .unwrap_or_else(|| FranchiseSalesSummary::empty(facts.franchise_id));
                    summary.voided_count += 1;
                    summary.revenue -= facts.total_amount as i64;
                    summary.cost -= facts.total_cost as i64;
                    self.store.upsert(tenant_id, facts.franchise_id, summary);
                }
            }
        }

        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }
}
