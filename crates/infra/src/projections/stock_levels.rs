//! Stock levels read model: current balance per (franchise, product), with
//! low-stock classification against the product's reorder level.
//!
//! This projection joins two streams: ledger movements carry the balances,
//! catalog events carry the reorder thresholds.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use stockline_core::{FranchiseId, TenantId};
use stockline_events::EventEnvelope;
use stockline_ledger::{LEDGER_AGGREGATE_TYPE, LedgerEvent, LowStockStatus};
use stockline_products::{PRODUCT_AGGREGATE_TYPE, ProductEvent, ProductId};

use crate::projections::cursor::{CursorCheck, CursorError, CursorMap};
use crate::read_model::TenantStore;

/// One row per (franchise, product) with the derived balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockLevelRow {
    pub franchise_id: FranchiseId,
    pub product_id: ProductId,
    pub balance: i64,
    pub reorder_level: i64,
    pub is_low: bool,
}

/// Notification emitted when a row crosses into low stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LowStockAlert {
    pub tenant_id: TenantId,
    pub franchise_id: FranchiseId,
    pub product_id: ProductId,
    pub balance: i64,
    pub reorder_level: i64,
}

#[derive(Debug, Error)]
pub enum StockLevelsProjectionError {
    #[error("failed to deserialize event: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error(transparent)]
    Cursor(#[from] CursorError),
}

/// Stock levels projection.
///
/// Consumes ledger and catalog envelopes; everything else is ignored.
/// `apply_envelope` returns the low-stock alerts triggered by that event
/// (usually none, at most one per affected row).
#[derive(Debug)]
pub struct StockLevelsProjection<S>
where
    S: TenantStore<(FranchiseId, ProductId), StockLevelRow>,
{
    store: S,
    reorder_levels: RwLock<HashMap<(TenantId, ProductId), i64>>,
    cursors: CursorMap,
}

impl<S> StockLevelsProjection<S>
where
    S: TenantStore<(FranchiseId, ProductId), StockLevelRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            reorder_levels: RwLock::new(HashMap::new()),
            cursors: CursorMap::new(),
        }
    }

    pub fn get(
        &self,
        tenant_id: TenantId,
        franchise_id: FranchiseId,
        product_id: ProductId,
    ) -> Option<StockLevelRow> {
        self.store.get(tenant_id, &(franchise_id, product_id))
    }

    /// All rows for one franchise.
    pub fn list_for_franchise(
        &self,
        tenant_id: TenantId,
        franchise_id: FranchiseId,
    ) -> Vec<StockLevelRow> {
        let mut rows: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|r| r.franchise_id == franchise_id)
            .collect();
        rows.sort_by_key(|r| *r.product_id.0.as_uuid());
        rows
    }

    /// All low-stock rows for a tenant, across franchises.
    pub fn list_low(&self, tenant_id: TenantId) -> Vec<StockLevelRow> {
        self.store
            .list(tenant_id)
            .into_iter()
            .filter(|r| r.is_low)
            .collect()
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<Vec<LowStockAlert>, StockLevelsProjectionError> {
        match envelope.aggregate_type() {
            t if t == LEDGER_AGGREGATE_TYPE => self.apply_ledger(envelope),
            t if t == PRODUCT_AGGREGATE_TYPE => self.apply_catalog(envelope),
            _ => Ok(vec![]),
        }
    }

    fn apply_ledger(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<Vec<LowStockAlert>, StockLevelsProjectionError> {
        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(tenant_id, aggregate_id, seq)? {
            CursorCheck::Duplicate => return Ok(vec![]),
            CursorCheck::Apply => {}
        }

        let event: LedgerEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| StockLevelsProjectionError::Deserialize(e.to_string()))?;

        if event.tenant_id() != tenant_id {
            return Err(StockLevelsProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }

        let franchise_id = event.franchise_id();
        let product_id = event.product_id();
        let reorder_level = self.reorder_level(tenant_id, product_id);

        let mut row = self
            .store
            .get(tenant_id, &(franchise_id, product_id))
            .unwrap_or(StockLevelRow {
                franchise_id,
                product_id,
                balance: 0,
                reorder_level,
                is_low: false,
            });

        let was_low = row.is_low;
        row.balance += event.delta();
        row.reorder_level = reorder_level;
        row.is_low = LowStockStatus::evaluate(row.balance, row.reorder_level).is_low;

        let mut alerts = vec![];
        if row.is_low && !was_low {
            alerts.push(LowStockAlert {
                tenant_id,
                franchise_id,
                product_id,
                balance: row.balance,
                reorder_level: row.reorder_level,
            });
        }

        self.store.upsert(tenant_id, (franchise_id, product_id), row);
        self.cursors.advance(tenant_id, aggregate_id, seq);

        Ok(alerts)
    }

    fn apply_catalog(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<Vec<LowStockAlert>, StockLevelsProjectionError> {
        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(tenant_id, aggregate_id, seq)? {
            CursorCheck::Duplicate => return Ok(vec![]),
            CursorCheck::Apply => {}
        }

        let event: ProductEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| StockLevelsProjectionError::Deserialize(e.to_string()))?;

        let update = match event {
            ProductEvent::ProductCreated(e) => Some((e.tenant_id, e.product_id, e.reorder_level)),
            ProductEvent::ReorderLevelSet(e) => Some((e.tenant_id, e.product_id, e.reorder_level)),
            ProductEvent::ProductArchived(_) => None,
        };

        let mut alerts = vec![];
        if let Some((event_tenant, product_id, reorder_level)) = update {
            if event_tenant != tenant_id {
                return Err(StockLevelsProjectionError::TenantIsolation(
                    "event tenant_id does not match envelope tenant_id".to_string(),
                ));
            }

            if let Ok(mut levels) = self.reorder_levels.write() {
                levels.insert((tenant_id, product_id), reorder_level);
            }

            // Reclassify existing rows for this product.
            for mut row in self
                .store
                .list(tenant_id)
                .into_iter()
                .filter(|r| r.product_id == product_id)
            {
                let was_low = row.is_low;
                row.reorder_level = reorder_level;
                row.is_low = LowStockStatus::evaluate(row.balance, reorder_level).is_low;

                if row.is_low && !was_low {
                    alerts.push(LowStockAlert {
                        tenant_id,
                        franchise_id: row.franchise_id,
                        product_id,
                        balance: row.balance,
                        reorder_level,
                    });
                }

                self.store
                    .upsert(tenant_id, (row.franchise_id, product_id), row);
            }
        }

        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(alerts)
    }

    fn reorder_level(&self, tenant_id: TenantId, product_id: ProductId) -> i64 {
        self.reorder_levels
            .read()
            .ok()
            .and_then(|m| m.get(&(tenant_id, product_id)).copied())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use stockline_core::AggregateId;
    use stockline_ledger::{StockIssued, StockLedgerId, StockReceived};
    use stockline_products::{Pricing, ProductCreated, ReorderLevelSet};
    use uuid::Uuid;

    use super::*;
    use crate::read_model::InMemoryTenantStore;

    struct Fixture {
        projection: StockLevelsProjection<
            InMemoryTenantStore<(FranchiseId, ProductId), StockLevelRow>,
        >,
        tenant_id: TenantId,
        franchise_id: FranchiseId,
        product_id: ProductId,
        ledger_id: StockLedgerId,
        ledger_seq: u64,
    }

    impl Fixture {
        fn new() -> Self {
            let franchise_id = FranchiseId::new();
            let product_id = ProductId::new(AggregateId::new());
            Self {
                projection: StockLevelsProjection::new(InMemoryTenantStore::new()),
                tenant_id: TenantId::new(),
                franchise_id,
                product_id,
                ledger_id: StockLedgerId::for_product_at(product_id, franchise_id),
                ledger_seq: 0,
            }
        }

        fn create_product(&self, reorder_level: i64) -> Vec<LowStockAlert> {
            let event = ProductEvent::ProductCreated(ProductCreated {
                tenant_id: self.tenant_id,
                product_id: self.product_id,
                sku: "SKU-1".to_string(),
                name: "Beans".to_string(),
                pricing: Pricing {
                    unit_price: 100,
                    unit_cost: 60,
                },
                reorder_level,
                occurred_at: Utc::now(),
            });
            self.projection
                .apply_envelope(&EventEnvelope::new(
                    Uuid::now_v7(),
                    self.tenant_id,
                    self.product_id.0,
                    PRODUCT_AGGREGATE_TYPE,
                    1,
                    serde_json::to_value(&event).unwrap(),
                ))
                .unwrap()
        }

        fn set_reorder_level(&self, reorder_level: i64, seq: u64) -> Vec<LowStockAlert> {
            let event = ProductEvent::ReorderLevelSet(ReorderLevelSet {
                tenant_id: self.tenant_id,
                product_id: self.product_id,
                reorder_level,
                occurred_at: Utc::now(),
            });
            self.projection
                .apply_envelope(&EventEnvelope::new(
                    Uuid::now_v7(),
                    self.tenant_id,
                    self.product_id.0,
                    PRODUCT_AGGREGATE_TYPE,
                    seq,
                    serde_json::to_value(&event).unwrap(),
                ))
                .unwrap()
        }

        fn movement(&mut self, delta: i64) -> Vec<LowStockAlert> {
            self.ledger_seq += 1;
            let event = if delta >= 0 {
                LedgerEvent::StockReceived(StockReceived {
                    tenant_id: self.tenant_id,
                    franchise_id: self.franchise_id,
                    product_id: self.product_id,
                    quantity: delta,
                    reason: None,
                    occurred_at: Utc::now(),
                })
            } else {
                LedgerEvent::StockIssued(StockIssued {
                    tenant_id: self.tenant_id,
                    franchise_id: self.franchise_id,
                    product_id: self.product_id,
                    quantity: -delta,
                    reason: None,
                    occurred_at: Utc::now(),
                })
            };
            self.projection
                .apply_envelope(&EventEnvelope::new(
                    Uuid::now_v7(),
                    self.tenant_id,
                    self.ledger_id.0,
                    LEDGER_AGGREGATE_TYPE,
                    self.ledger_seq,
                    serde_json::to_value(&event).unwrap(),
                ))
                .unwrap()
        }
    }

    #[test]
    fn tracks_balance_and_threshold() {
        let mut f = Fixture::new();
        f.create_product(5);

        assert!(f.movement(20).is_empty());
        assert!(f.movement(-10).is_empty());

        let row = f
            .projection
            .get(f.tenant_id, f.franchise_id, f.product_id)
            .unwrap();
        assert_eq!(row.balance, 10);
        assert_eq!(row.reorder_level, 5);
        assert!(!row.is_low);
    }

    #[test]
    fn alert_fires_once_when_crossing_into_low() {
        let mut f = Fixture::new();
        f.create_product(5);
        f.movement(10);

        // 10 -> 5 crosses the threshold (balance <= reorder_level).
        let alerts = f.movement(-5);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].balance, 5);
        assert_eq!(alerts[0].reorder_level, 5);

        // Further decreases stay low but do not re-alert.
        assert!(f.movement(-2).is_empty());

        // Restock above the threshold, then dip again: alert fires again.
        f.movement(10);
        let alerts = f.movement(-9);
        assert_eq!(alerts.len(), 1);
    }

    #[test]
    fn raising_the_threshold_can_trigger_alerts() {
        let mut f = Fixture::new();
        f.create_product(2);
        f.movement(6);

        let alerts = f.set_reorder_level(8, 2);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].balance, 6);
        assert_eq!(alerts[0].reorder_level, 8);

        let row = f
            .projection
            .get(f.tenant_id, f.franchise_id, f.product_id)
            .unwrap();
        assert!(row.is_low);
    }

    #[test]
    fn list_low_filters_rows() {
        let mut f = Fixture::new();
        f.create_product(5);
        f.movement(3);

        assert_eq!(f.projection.list_low(f.tenant_id).len(), 1);
        f.movement(10);
        assert!(f.projection.list_low(f.tenant_id).is_empty());
    }
}
