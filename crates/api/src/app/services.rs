//! Application services: command orchestration and query access.
//!
//! Commands go through the dispatcher (authoritative, synchronous); queries
//! are served from projections fed by a background worker, so reads are
//! eventually consistent with writes. Existence checks that gate commands
//! (does this product exist, is it sellable) rehydrate from the event store
//! instead, so a stock movement never races its own product's projection.

use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use chrono::Utc;
use serde_json::{Value as JsonValue, json};
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use stockline_core::{Aggregate, AggregateId, FranchiseId, TenantId};
use stockline_events::{EventEnvelope, InMemoryEventBus};
use stockline_franchises::{
    CloseFranchise, FRANCHISE_AGGREGATE_TYPE, Franchise, FranchiseCommand, RegisterFranchise,
};
use stockline_infra::projections::{
    CatalogEntry, FranchiseDirectoryProjection, FranchiseRow, FranchiseSalesSummary,
    ProductCatalogProjection, SaleRow, SalesLogProjection, SalesSummaryProjection, StockLevelRow,
    StockLevelsProjection, TransferRecord, TransfersProjection,
};
use stockline_infra::{
    CommandDispatcher, DispatchError, EventStore, InMemoryEventStore, InMemoryTenantStore,
    ProjectionWorker, WorkerHandle,
};
use stockline_ledger::{
    LEDGER_AGGREGATE_TYPE, LedgerCommand, LedgerEvent, LowStockStatus, RecordAdjustment,
    RecordStockIn, RecordStockOut, StockError, StockLedger, StockLedgerId, compute_balance,
};
use stockline_products::{
    ArchiveProduct, CreateProduct, PRODUCT_AGGREGATE_TYPE, Pricing, Product, ProductCommand,
    ProductEvent, ProductId, SetReorderLevel,
};
use stockline_sales::{
    RecordSale, SALE_AGGREGATE_TYPE, Sale, SaleCommand, SaleId, SaleLine, VoidSale,
};
use stockline_transfers::{
    RecordTransfer, StockTransfer, TRANSFER_AGGREGATE_TYPE, TransferCommand, TransferId,
};

use stockline_core::DomainError;

const MAX_DISPATCH_ATTEMPTS: u32 = 8;
const REALTIME_CAPACITY: usize = 256;

type Store = Arc<InMemoryEventStore>;
type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
type Dispatcher = CommandDispatcher<Store, Bus>;

type Catalog = ProductCatalogProjection<InMemoryTenantStore<ProductId, CatalogEntry>>;
type Franchises = FranchiseDirectoryProjection<InMemoryTenantStore<FranchiseId, FranchiseRow>>;
type StockLevels = StockLevelsProjection<InMemoryTenantStore<(FranchiseId, ProductId), StockLevelRow>>;
type SalesSummary = SalesSummaryProjection<InMemoryTenantStore<FranchiseId, FranchiseSalesSummary>>;
type SalesLog = SalesLogProjection<InMemoryTenantStore<SaleId, SaleRow>>;
type Transfers = TransfersProjection<InMemoryTenantStore<TransferId, TransferRecord>>;

/// Message pushed to SSE subscribers.
#[derive(Debug, Clone)]
pub struct RealtimeMessage {
    pub tenant_id: TenantId,
    pub topic: String,
    pub payload: JsonValue,
}

/// Failure from an orchestrating operation that touches both the ledger and
/// another aggregate (sales, transfers).
#[derive(Debug)]
pub enum ServiceError {
    Stock(DispatchError<StockError>),
    Domain(DispatchError<DomainError>),
}

impl From<DispatchError<StockError>> for ServiceError {
    fn from(value: DispatchError<StockError>) -> Self {
        ServiceError::Stock(value)
    }
}

impl From<DispatchError<DomainError>> for ServiceError {
    fn from(value: DispatchError<DomainError>) -> Self {
        ServiceError::Domain(value)
    }
}

pub struct AppServices {
    dispatcher: Dispatcher,
    catalog: Arc<Catalog>,
    franchises: Arc<Franchises>,
    stock_levels: Arc<StockLevels>,
    sales_summary: Arc<SalesSummary>,
    sales_log: Arc<SalesLog>,
    transfers: Arc<Transfers>,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
    _projection_worker: WorkerHandle,
}

/// Wire the store, bus, dispatcher, projections and the projection worker.
pub fn build_services() -> Arc<AppServices> {
    let store: Store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let dispatcher = CommandDispatcher::new(Arc::clone(&store), Arc::clone(&bus));

    let catalog = Arc::new(ProductCatalogProjection::new(InMemoryTenantStore::new()));
    let franchises = Arc::new(FranchiseDirectoryProjection::new(InMemoryTenantStore::new()));
    let stock_levels = Arc::new(StockLevelsProjection::new(InMemoryTenantStore::new()));
    let sales_summary = Arc::new(SalesSummaryProjection::new(InMemoryTenantStore::new()));
    let sales_log = Arc::new(SalesLogProjection::new(InMemoryTenantStore::new()));
    let transfers = Arc::new(TransfersProjection::new(InMemoryTenantStore::new()));

    let (realtime_tx, _) = broadcast::channel(REALTIME_CAPACITY);

    let worker = {
        let catalog = Arc::clone(&catalog);
        let franchises = Arc::clone(&franchises);
        let stock_levels = Arc::clone(&stock_levels);
        let sales_summary = Arc::clone(&sales_summary);
        let sales_log = Arc::clone(&sales_log);
        let transfers = Arc::clone(&transfers);
        let tx = realtime_tx.clone();

        ProjectionWorker::spawn(
            "projections",
            Arc::clone(&bus),
            None,
            move |envelope: EventEnvelope<JsonValue>| -> Result<(), anyhow::Error> {
                catalog.apply_envelope(&envelope)?;
                franchises.apply_envelope(&envelope)?;
                let alerts = stock_levels.apply_envelope(&envelope)?;
                sales_summary.apply_envelope(&envelope)?;
                sales_log.apply_envelope(&envelope)?;
                transfers.apply_envelope(&envelope)?;

                for alert in alerts {
                    // Subscriber lag or absence is not an error.
                    let _ = tx.send(RealtimeMessage {
                        tenant_id: alert.tenant_id,
                        topic: "stock.low".to_string(),
                        payload: serde_json::to_value(&alert)?,
                    });
                }

                let _ = tx.send(RealtimeMessage {
                    tenant_id: envelope.tenant_id(),
                    topic: format!("{}.updated", envelope.aggregate_type()),
                    payload: json!({
                        "aggregate_id": envelope.aggregate_id(),
                        "sequence_number": envelope.sequence_number(),
                    }),
                });

                Ok(())
            },
        )
    };

    Arc::new(AppServices {
        dispatcher,
        catalog,
        franchises,
        stock_levels,
        sales_summary,
        sales_log,
        transfers,
        realtime_tx,
        _projection_worker: worker,
    })
}

// --- products ---

impl AppServices {
    pub fn create_product(
        &self,
        tenant_id: TenantId,
        sku: String,
        name: String,
        pricing: Pricing,
        reorder_level: i64,
    ) -> Result<ProductId, DispatchError<DomainError>> {
        let product_id = ProductId::new(AggregateId::new());
        let cmd = ProductCommand::CreateProduct(CreateProduct {
            tenant_id,
            product_id,
            sku,
            name,
            pricing,
            reorder_level,
            occurred_at: Utc::now(),
        });
        self.dispatcher.dispatch(
            tenant_id,
            product_id.0,
            PRODUCT_AGGREGATE_TYPE,
            &cmd,
            |id| Product::empty(ProductId::new(id)),
        )?;
        Ok(product_id)
    }

    pub fn set_reorder_level(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        reorder_level: i64,
    ) -> Result<(), DispatchError<DomainError>> {
        let cmd = ProductCommand::SetReorderLevel(SetReorderLevel {
            tenant_id,
            product_id,
            reorder_level,
            occurred_at: Utc::now(),
        });
        self.dispatcher.dispatch_with_retry(
            tenant_id,
            product_id.0,
            PRODUCT_AGGREGATE_TYPE,
            &cmd,
            |id| Product::empty(ProductId::new(id)),
            MAX_DISPATCH_ATTEMPTS,
        )?;
        Ok(())
    }

    pub fn archive_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<(), DispatchError<DomainError>> {
        let cmd = ProductCommand::ArchiveProduct(ArchiveProduct {
            tenant_id,
            product_id,
            occurred_at: Utc::now(),
        });
        self.dispatcher.dispatch_with_retry(
            tenant_id,
            product_id.0,
            PRODUCT_AGGREGATE_TYPE,
            &cmd,
            |id| Product::empty(ProductId::new(id)),
            MAX_DISPATCH_ATTEMPTS,
        )?;
        Ok(())
    }

    pub fn get_product(&self, tenant_id: TenantId, product_id: ProductId) -> Option<CatalogEntry> {
        self.catalog.get(tenant_id, &product_id)
    }

    pub fn list_products(&self, tenant_id: TenantId) -> Vec<CatalogEntry> {
        self.catalog.list(tenant_id)
    }

    /// Rehydrate a product from its stream (authoritative existence check).
    fn load_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Option<Product>, DispatchError<StockError>> {
        let history = self.dispatcher.store().load_stream(tenant_id, product_id.0)?;
        if history.is_empty() {
            return Ok(None);
        }

        let mut product = Product::empty(product_id);
        for stored in &history {
            let event: ProductEvent = serde_json::from_value(stored.payload.clone())
                .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
            product.apply(&event);
        }
        Ok(Some(product))
    }

    /// Archived products cannot be sold, restocked or transferred; they
    /// report the same rejection as a missing product.
    fn require_sellable(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Product, DispatchError<StockError>> {
        match self.load_product(tenant_id, product_id)? {
            Some(p) if p.is_sellable() => Ok(p),
            _ => Err(DispatchError::Domain(StockError::ProductNotFound)),
        }
    }
}

// --- franchises ---

impl AppServices {
    pub fn register_franchise(
        &self,
        tenant_id: TenantId,
        name: String,
        city: Option<String>,
    ) -> Result<FranchiseId, DispatchError<DomainError>> {
        let franchise_id = FranchiseId::new();
        let cmd = FranchiseCommand::RegisterFranchise(RegisterFranchise {
            tenant_id,
            franchise_id,
            name,
            city,
            occurred_at: Utc::now(),
        });
        self.dispatcher.dispatch(
            tenant_id,
            AggregateId::from_uuid(*franchise_id.as_uuid()),
            FRANCHISE_AGGREGATE_TYPE,
            &cmd,
            |id| Franchise::empty(FranchiseId::from_uuid(*id.as_uuid())),
        )?;
        Ok(franchise_id)
    }

    pub fn close_franchise(
        &self,
        tenant_id: TenantId,
        franchise_id: FranchiseId,
    ) -> Result<(), DispatchError<DomainError>> {
        let cmd = FranchiseCommand::CloseFranchise(CloseFranchise {
            tenant_id,
            franchise_id,
            occurred_at: Utc::now(),
        });
        self.dispatcher.dispatch_with_retry(
            tenant_id,
            AggregateId::from_uuid(*franchise_id.as_uuid()),
            FRANCHISE_AGGREGATE_TYPE,
            &cmd,
            |id| Franchise::empty(FranchiseId::from_uuid(*id.as_uuid())),
            MAX_DISPATCH_ATTEMPTS,
        )?;
        Ok(())
    }

    pub fn list_franchises(&self, tenant_id: TenantId) -> Vec<FranchiseRow> {
        self.franchises.list(tenant_id)
    }
}

// --- stock ---

impl AppServices {
    pub fn stock_in(
        &self,
        tenant_id: TenantId,
        franchise_id: FranchiseId,
        product_id: ProductId,
        quantity: i64,
        reason: Option<String>,
    ) -> Result<i64, DispatchError<StockError>> {
        self.require_sellable(tenant_id, product_id)?;
        let cmd = LedgerCommand::RecordStockIn(RecordStockIn {
            tenant_id,
            franchise_id,
            product_id,
            quantity,
            reason,
            occurred_at: Utc::now(),
        });
        self.dispatch_ledger(tenant_id, franchise_id, product_id, &cmd)
    }

    pub fn stock_out(
        &self,
        tenant_id: TenantId,
        franchise_id: FranchiseId,
        product_id: ProductId,
        quantity: i64,
        reason: Option<String>,
    ) -> Result<i64, DispatchError<StockError>> {
        self.require_sellable(tenant_id, product_id)?;
        let cmd = LedgerCommand::RecordStockOut(RecordStockOut {
            tenant_id,
            franchise_id,
            product_id,
            quantity,
            reason,
            occurred_at: Utc::now(),
        });
        self.dispatch_ledger(tenant_id, franchise_id, product_id, &cmd)
    }

    pub fn adjust_stock(
        &self,
        tenant_id: TenantId,
        franchise_id: FranchiseId,
        product_id: ProductId,
        delta: i64,
        reason: Option<String>,
    ) -> Result<i64, DispatchError<StockError>> {
        // Adjustments apply to any existing product, archived included
        // (audit corrections outlive the catalog entry).
        if self.load_product(tenant_id, product_id)?.is_none() {
            return Err(DispatchError::Domain(StockError::ProductNotFound));
        }
        let cmd = LedgerCommand::RecordAdjustment(RecordAdjustment {
            tenant_id,
            franchise_id,
            product_id,
            delta,
            reason,
            occurred_at: Utc::now(),
        });
        self.dispatch_ledger(tenant_id, franchise_id, product_id, &cmd)
    }

    /// Balance and low-stock classification straight from the streams.
    pub fn stock_status(
        &self,
        tenant_id: TenantId,
        franchise_id: FranchiseId,
        product_id: ProductId,
    ) -> Result<LowStockStatus, DispatchError<StockError>> {
        let product = match self.load_product(tenant_id, product_id)? {
            Some(p) => p,
            None => return Err(DispatchError::Domain(StockError::ProductNotFound)),
        };
        let balance = self.ledger_balance(tenant_id, franchise_id, product_id)?;
        Ok(LowStockStatus::evaluate(balance, product.reorder_level()))
    }

    pub fn list_stock_levels(
        &self,
        tenant_id: TenantId,
        franchise_id: FranchiseId,
    ) -> Vec<StockLevelRow> {
        self.stock_levels.list_for_franchise(tenant_id, franchise_id)
    }

    pub fn list_low_stock(
        &self,
        tenant_id: TenantId,
        franchise_id: FranchiseId,
    ) -> Vec<StockLevelRow> {
        self.stock_levels
            .list_for_franchise(tenant_id, franchise_id)
            .into_iter()
            .filter(|r| r.is_low)
            .collect()
    }

    fn dispatch_ledger(
        &self,
        tenant_id: TenantId,
        franchise_id: FranchiseId,
        product_id: ProductId,
        cmd: &LedgerCommand,
    ) -> Result<i64, DispatchError<StockError>> {
        let ledger_id = StockLedgerId::for_product_at(product_id, franchise_id);
        self.dispatcher.dispatch_with_retry(
            tenant_id,
            ledger_id.0,
            LEDGER_AGGREGATE_TYPE,
            cmd,
            |id| StockLedger::empty(StockLedgerId::new(id)),
            MAX_DISPATCH_ATTEMPTS,
        )?;
        self.ledger_balance(tenant_id, franchise_id, product_id)
    }

    fn ledger_balance(
        &self,
        tenant_id: TenantId,
        franchise_id: FranchiseId,
        product_id: ProductId,
    ) -> Result<i64, DispatchError<StockError>> {
        let ledger_id = StockLedgerId::for_product_at(product_id, franchise_id);
        let history = self.dispatcher.store().load_stream(tenant_id, ledger_id.0)?;
        let events = history
            .iter()
            .map(|stored| serde_json::from_value::<LedgerEvent>(stored.payload.clone()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        Ok(compute_balance(&events))
    }
}

// --- sales ---

impl AppServices {
    /// Record a sale: issue stock per line, then append the sale.
    ///
    /// Prices are captured from the product at record time. The ledger legs
    /// and the sale append are separate streams; a line that fails after
    /// earlier lines were issued leaves those issues in the ledger (they are
    /// corrected with explicit adjustments).
    pub fn record_sale(
        &self,
        tenant_id: TenantId,
        franchise_id: FranchiseId,
        items: Vec<(ProductId, i64)>,
    ) -> Result<SaleId, ServiceError> {
        if items.is_empty() {
            return Err(ServiceError::Domain(DispatchError::Domain(
                DomainError::validation("sale must have at least one line"),
            )));
        }

        let mut lines = Vec::with_capacity(items.len());
        for (idx, (product_id, quantity)) in items.iter().enumerate() {
            if *quantity < 1 {
                return Err(ServiceError::Stock(DispatchError::Domain(
                    StockError::InvalidQuantity {
                        quantity: *quantity,
                    },
                )));
            }
            let product = self.require_sellable(tenant_id, *product_id)?;
            lines.push(SaleLine {
                line_no: (idx + 1) as u32,
                product_id: *product_id,
                quantity: *quantity,
                unit_price: product.pricing().unit_price,
                unit_cost: product.pricing().unit_cost,
            });
        }

        let sale_id = SaleId::new(AggregateId::new());
        for line in &lines {
            self.stock_out(
                tenant_id,
                franchise_id,
                line.product_id,
                line.quantity,
                Some(format!("sale {sale_id}")),
            )?;
        }

        let cmd = SaleCommand::RecordSale(RecordSale {
            tenant_id,
            sale_id,
            franchise_id,
            lines,
            occurred_at: Utc::now(),
        });
        self.dispatcher
            .dispatch(tenant_id, sale_id.0, SALE_AGGREGATE_TYPE, &cmd, |id| {
                Sale::empty(SaleId::new(id))
            })
            .map_err(ServiceError::Domain)?;

        Ok(sale_id)
    }

    /// Void a sale. Bookkeeping only: stock already issued stays issued and
    /// is restocked with an explicit adjustment if it physically returns.
    pub fn void_sale(
        &self,
        tenant_id: TenantId,
        sale_id: SaleId,
        reason: Option<String>,
    ) -> Result<(), DispatchError<DomainError>> {
        let cmd = SaleCommand::VoidSale(VoidSale {
            tenant_id,
            sale_id,
            reason,
            occurred_at: Utc::now(),
        });
        self.dispatcher.dispatch_with_retry(
            tenant_id,
            sale_id.0,
            SALE_AGGREGATE_TYPE,
            &cmd,
            |id| Sale::empty(SaleId::new(id)),
            MAX_DISPATCH_ATTEMPTS,
        )?;
        Ok(())
    }

    pub fn list_sales(&self, tenant_id: TenantId) -> Vec<SaleRow> {
        self.sales_log.list(tenant_id)
    }

    pub fn sales_summary(&self, tenant_id: TenantId) -> Vec<FranchiseSalesSummary> {
        self.sales_summary.list(tenant_id)
    }
}

// --- transfers ---

impl AppServices {
    /// Move stock between two franchises: OUT at the source, IN at the
    /// destination, then the transfer audit record.
    pub fn record_transfer(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        quantity: i64,
        from_franchise: FranchiseId,
        to_franchise: FranchiseId,
        reason: Option<String>,
    ) -> Result<TransferId, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::Stock(DispatchError::Domain(
                StockError::InvalidQuantity { quantity },
            )));
        }
        if from_franchise == to_franchise {
            return Err(ServiceError::Domain(DispatchError::Domain(
                DomainError::validation("source and destination must differ"),
            )));
        }
        self.require_sellable(tenant_id, product_id)
            .map_err(ServiceError::Stock)?;

        let transfer_id = TransferId::new(AggregateId::new());
        let leg_reason = reason
            .clone()
            .unwrap_or_else(|| format!("transfer {transfer_id}"));

        self.stock_out(
            tenant_id,
            from_franchise,
            product_id,
            quantity,
            Some(leg_reason.clone()),
        )?;
        self.stock_in(
            tenant_id,
            to_franchise,
            product_id,
            quantity,
            Some(leg_reason),
        )?;

        let cmd = TransferCommand::RecordTransfer(RecordTransfer {
            tenant_id,
            transfer_id,
            product_id,
            quantity,
            from_franchise,
            to_franchise,
            reason,
            occurred_at: Utc::now(),
        });
        self.dispatcher
            .dispatch(
                tenant_id,
                transfer_id.0,
                TRANSFER_AGGREGATE_TYPE,
                &cmd,
                |id| StockTransfer::empty(TransferId::new(id)),
            )
            .map_err(ServiceError::Domain)?;

        Ok(transfer_id)
    }

    pub fn list_transfers(&self, tenant_id: TenantId) -> Vec<TransferRecord> {
        self.transfers.list(tenant_id)
    }
}

// --- realtime ---

impl AppServices {
    /// SSE stream of this tenant's realtime messages.
    pub fn tenant_sse_stream(
        &self,
        tenant_id: TenantId,
    ) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, core::convert::Infallible>> + use<>> {
        let rx = self.realtime_tx.subscribe();
        let stream = BroadcastStream::new(rx).filter_map(move |msg| match msg {
            Ok(m) if m.tenant_id == tenant_id => Some(Ok(SseEvent::default()
                .event(m.topic)
                .data(m.payload.to_string()))),
            // Other tenants' messages and lagged receivers are skipped.
            _ => None,
        });

        Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
    }
}
