use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;

use stockline_core::{AggregateId, FranchiseId, TenantId};
use stockline_events::{EventEnvelope, InMemoryEventBus};
use stockline_infra::command_dispatcher::CommandDispatcher;
use stockline_infra::event_store::InMemoryEventStore;
use stockline_ledger::{
    LEDGER_AGGREGATE_TYPE, LedgerCommand, LedgerEvent, RecordStockIn, RecordStockOut, StockLedger,
    StockLedgerId, StockReceived, compute_balance,
};
use stockline_products::ProductId;

type Dispatcher =
    CommandDispatcher<Arc<InMemoryEventStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

fn setup() -> (Dispatcher, TenantId, FranchiseId, ProductId, StockLedgerId) {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> = Arc::new(InMemoryEventBus::new());
    let tenant_id = TenantId::new();
    let franchise_id = FranchiseId::new();
    let product_id = ProductId::new(AggregateId::new());
    let ledger_id = StockLedgerId::for_product_at(product_id, franchise_id);
    (
        CommandDispatcher::new(store, bus),
        tenant_id,
        franchise_id,
        product_id,
        ledger_id,
    )
}

fn movements(tenant_id: TenantId, franchise_id: FranchiseId, n: usize) -> Vec<LedgerEvent> {
    let product_id = ProductId::new(AggregateId::new());
    (0..n)
        .map(|i| {
            LedgerEvent::StockReceived(StockReceived {
                tenant_id,
                franchise_id,
                product_id,
                quantity: (i % 7 + 1) as i64,
                reason: None,
                occurred_at: Utc::now(),
            })
        })
        .collect()
}

fn bench_balance_fold(c: &mut Criterion) {
    let mut group = c.benchmark_group("balance_fold");
    let tenant_id = TenantId::new();
    let franchise_id = FranchiseId::new();

    for size in [100usize, 1_000, 10_000] {
        let events = movements(tenant_id, franchise_id, size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &events, |b, events| {
            b.iter(|| black_box(compute_balance(black_box(events))));
        });
    }

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_dispatch");
    group.sample_size(500);

    group.bench_function("stock_in_fresh_stream", |b| {
        let (dispatcher, tenant_id, franchise_id, _, _) = setup();
        b.iter(|| {
            let product_id = ProductId::new(AggregateId::new());
            let ledger_id = StockLedgerId::for_product_at(product_id, franchise_id);
            let cmd = LedgerCommand::RecordStockIn(RecordStockIn {
                tenant_id,
                franchise_id,
                product_id,
                quantity: 10,
                reason: None,
                occurred_at: Utc::now(),
            });
            dispatcher
                .dispatch(tenant_id, ledger_id.0, LEDGER_AGGREGATE_TYPE, &cmd, |id| {
                    StockLedger::empty(StockLedgerId::new(id))
                })
                .unwrap();
        });
    });

    group.bench_function("stock_out_with_history", |b| {
        let (dispatcher, tenant_id, franchise_id, product_id, ledger_id) = setup();

        // Seed a long stream so rehydration cost is visible.
        let seed = LedgerCommand::RecordStockIn(RecordStockIn {
            tenant_id,
            franchise_id,
            product_id,
            quantity: 1_000_000,
            reason: None,
            occurred_at: Utc::now(),
        });
        dispatcher
            .dispatch(tenant_id, ledger_id.0, LEDGER_AGGREGATE_TYPE, &seed, |id| {
                StockLedger::empty(StockLedgerId::new(id))
            })
            .unwrap();

        let cmd = LedgerCommand::RecordStockOut(RecordStockOut {
            tenant_id,
            franchise_id,
            product_id,
            quantity: 1,
            reason: None,
            occurred_at: Utc::now(),
        });
        b.iter(|| {
            dispatcher
                .dispatch(tenant_id, ledger_id.0, LEDGER_AGGREGATE_TYPE, &cmd, |id| {
                    StockLedger::empty(StockLedgerId::new(id))
                })
                .unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_balance_fold, bench_dispatch);
criterion_main!(benches);
