//! Product catalog read model.

use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use stockline_core::TenantId;
use stockline_events::EventEnvelope;
use stockline_products::{PRODUCT_AGGREGATE_TYPE, Pricing, ProductEvent, ProductId, ProductStatus};

use crate::projections::cursor::{CursorCheck, CursorError, CursorMap};
use crate::read_model::TenantStore;

/// Queryable catalog entry: one row per product.
///
/// Serves product lookups at the service boundary (a stock movement against
/// an unknown product must be rejected before any ledger command runs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub pricing: Pricing,
    pub reorder_level: i64,
    pub status: ProductStatus,
}

#[derive(Debug, Error)]
pub enum CatalogProjectionError {
    #[error("failed to deserialize product event: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error(transparent)]
    Cursor(#[from] CursorError),
}

/// Product catalog projection.
#[derive(Debug)]
pub struct ProductCatalogProjection<S>
where
    S: TenantStore<ProductId, CatalogEntry>,
{
    store: S,
    cursors: CursorMap,
}

impl<S> ProductCatalogProjection<S>
where
    S: TenantStore<ProductId, CatalogEntry>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: CursorMap::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, product_id: &ProductId) -> Option<CatalogEntry> {
        self.store.get(tenant_id, product_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<CatalogEntry> {
        self.store.list(tenant_id)
    }

    /// Apply a published envelope into the projection.
    ///
    /// Envelopes for other aggregate types are ignored.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), CatalogProjectionError> {
        if envelope.aggregate_type() != PRODUCT_AGGREGATE_TYPE {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(tenant_id, aggregate_id, seq)? {
            CursorCheck::Duplicate => return Ok(()),
            CursorCheck::Apply => {}
        }

        let event: ProductEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| CatalogProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, product_id) = match &event {
            ProductEvent::ProductCreated(e) => (e.tenant_id, e.product_id),
            ProductEvent::ReorderLevelSet(e) => (e.tenant_id, e.product_id),
            ProductEvent::ProductArchived(e) => (e.tenant_id, e.product_id),
        };

        if event_tenant != tenant_id {
            return Err(CatalogProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if product_id.0 != aggregate_id {
            return Err(CatalogProjectionError::TenantIsolation(
                "event product_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            ProductEvent::ProductCreated(e) => {
                self.store.upsert(
                    tenant_id,
                    e.product_id,
                    CatalogEntry {
                        product_id: e.product_id,
                        sku: e.sku,
                        name: e.name,
                        pricing: e.pricing,
                        reorder_level: e.reorder_level,
                        status: ProductStatus::Active,
                    },
                );
            }
            ProductEvent::ReorderLevelSet(e) => {
                if let Some(mut entry) = self.store.get(tenant_id, &e.product_id) {
                    entry.reorder_level = e.reorder_level;
                    self.store.upsert(tenant_id, e.product_id, entry);
                }
            }
            ProductEvent::ProductArchived(e) => {
                if let Some(mut entry) = self.store.get(tenant_id, &e.product_id) {
                    entry.status = ProductStatus::Archived;
                    self.store.upsert(tenant_id, e.product_id, entry);
                }
            }
        }

        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }
}
