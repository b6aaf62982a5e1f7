//! Command execution pipeline (application-level orchestration).
//!
//! Implements the command dispatch pattern for event-sourced aggregates:
//!
//! ```text
//! 1. Load events from store (tenant-scoped)
//! 2. Rehydrate aggregate (apply history)
//! 3. Handle command (pure decision logic, produces events)
//! 4. Append events (optimistic concurrency check)
//! 5. Publish committed events to the bus
//! ```
//!
//! The dispatcher is generic over the aggregate's error type, so domain
//! taxonomies (e.g. stock rejections with their quantities) survive the
//! trip to the API layer intact.
//!
//! This module contains no IO itself; it composes the store/bus traits.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use stockline_core::{Aggregate, AggregateId, ExpectedVersion, TenantId};
use stockline_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// Dispatch failure, parameterized over the aggregate's domain error.
#[derive(Debug)]
pub enum DispatchError<E> {
    /// Deterministic domain rejection (validation, invariant, business rule).
    Domain(E),
    /// Optimistic concurrency failure (stale stream version).
    Concurrency(String),
    /// Tenant isolation violation (cross-tenant or cross-aggregate mixing).
    TenantIsolation(String),
    /// Failed to deserialize historical payloads into the aggregate event type.
    Deserialize(String),
    /// Persisting to the event store failed.
    Store(EventStoreError),
    /// Publication failed after a successful append (events are durable;
    /// retrying may duplicate, consumers must be idempotent).
    Publish(String),
}

impl<E> DispatchError<E> {
    pub fn is_concurrency(&self) -> bool {
        matches!(self, DispatchError::Concurrency(_))
    }
}

impl<E> From<EventStoreError> for DispatchError<E> {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            EventStoreError::TenantIsolation(msg) => DispatchError::TenantIsolation(msg),
            other => DispatchError::Store(other),
        }
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Sits between the API layer and the store/bus. Events are persisted
/// before publication; if the append fails nothing is published. A failed
/// publish still leaves the events durable (at-least-once delivery).
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Dispatch a command through the full pipeline.
    ///
    /// `make_aggregate` builds a fresh instance for rehydration (e.g.
    /// `StockLedger::empty(id)`); the dispatcher never constructs aggregates
    /// itself. Returns the committed events with their assigned sequence
    /// numbers, or an empty vector when the command decided no events
    /// (idempotent no-op).
    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: &A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError<A::Error>>
    where
        A: Aggregate,
        A::Event: stockline_events::Event + Serialize + DeserializeOwned,
    {
        // 1) Load history (tenant-scoped)
        let history = self.store.load_stream(tenant_id, aggregate_id)?;
        validate_loaded_stream(tenant_id, aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        // 2) Rehydrate
        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        // 3) Decide (no mutation)
        let decided = aggregate.handle(command).map_err(DispatchError::Domain)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        // 4) Append (optimistic)
        let aggregate_type = aggregate_type.into();
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    tenant_id,
                    aggregate_id,
                    aggregate_type.clone(),
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;

        // 5) Publish after append
        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(committed)
    }

    /// Dispatch with bounded retry on optimistic concurrency conflicts.
    ///
    /// Each retry reloads the stream and re-runs the decision against fresh
    /// state, so a command that raced another writer either lands on the new
    /// version or gets a deterministic domain rejection. Only concurrency
    /// failures are retried; every other error is returned as-is.
    pub fn dispatch_with_retry<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: &A::Command,
        make_aggregate: impl Fn(AggregateId) -> A,
        max_attempts: u32,
    ) -> Result<Vec<StoredEvent>, DispatchError<A::Error>>
    where
        A: Aggregate,
        A::Event: stockline_events::Event + Serialize + DeserializeOwned,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.dispatch(
                tenant_id,
                aggregate_id,
                aggregate_type,
                command,
                &make_aggregate,
            ) {
                Err(err) if err.is_concurrency() && attempt < max_attempts => {
                    tracing::debug!(
                        aggregate_type,
                        attempt,
                        "concurrency conflict, retrying dispatch"
                    );
                    continue;
                }
                other => return other,
            }
        }
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream<E>(
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError<E>> {
    // Enforce tenant isolation even if a buggy backend returns cross-tenant
    // data, and require strictly increasing sequence numbers.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.tenant_id != tenant_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong tenant_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                format!(
                    "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                    e.sequence_number
                ),
            )));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError<A::Error>>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    // Deterministic ordering.
    let mut sorted = history.to_vec();
    sorted.sort_by_key(|e| e.sequence_number);

    for stored in sorted {
        let ev: A::Event = serde_json::from_value(stored.payload)
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    use chrono::Utc;
    use serde_json::Value as JsonValue;

    use stockline_core::FranchiseId;
    use stockline_events::{EventEnvelope, InMemoryEventBus};
    use stockline_ledger::{
        LEDGER_AGGREGATE_TYPE, LedgerCommand, LedgerEvent, RecordStockIn, RecordStockOut,
        StockError, StockLedger, StockLedgerId, compute_balance,
    };
    use stockline_products::ProductId;

    use super::*;
    use crate::event_store::InMemoryEventStore;

    type Dispatcher =
        CommandDispatcher<Arc<InMemoryEventStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

    struct Scope {
        dispatcher: Dispatcher,
        tenant_id: TenantId,
        franchise_id: FranchiseId,
        product_id: ProductId,
        ledger_id: StockLedgerId,
    }

    fn scope() -> Scope {
        let store = Arc::new(InMemoryEventStore::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let tenant_id = TenantId::new();
        let franchise_id = FranchiseId::new();
        let product_id = ProductId::new(AggregateId::new());
        Scope {
            dispatcher: CommandDispatcher::new(store, bus),
            tenant_id,
            franchise_id,
            product_id,
            ledger_id: StockLedgerId::for_product_at(product_id, franchise_id),
        }
    }

    fn stock_in(s: &Scope, quantity: i64) -> LedgerCommand {
        LedgerCommand::RecordStockIn(RecordStockIn {
            tenant_id: s.tenant_id,
            franchise_id: s.franchise_id,
            product_id: s.product_id,
            quantity,
            reason: None,
            occurred_at: Utc::now(),
        })
    }

    fn stock_out(s: &Scope, quantity: i64) -> LedgerCommand {
        LedgerCommand::RecordStockOut(RecordStockOut {
            tenant_id: s.tenant_id,
            franchise_id: s.franchise_id,
            product_id: s.product_id,
            quantity,
            reason: None,
            occurred_at: Utc::now(),
        })
    }

    fn dispatch(s: &Scope, cmd: &LedgerCommand) -> Result<Vec<StoredEvent>, DispatchError<StockError>> {
        s.dispatcher.dispatch(
            s.tenant_id,
            s.ledger_id.0,
            LEDGER_AGGREGATE_TYPE,
            cmd,
            |id| StockLedger::empty(StockLedgerId::new(id)),
        )
    }

    fn ledger_balance(s: &Scope) -> i64 {
        let history = s
            .dispatcher
            .store()
            .load_stream(s.tenant_id, s.ledger_id.0)
            .unwrap();
        let events: Vec<LedgerEvent> = history
            .iter()
            .map(|e| serde_json::from_value(e.payload.clone()).unwrap())
            .collect();
        compute_balance(&events)
    }

    #[test]
    fn in_then_out_appends_and_publishes() {
        let s = scope();
        let sub = s.dispatcher.bus.subscribe();

        let committed = dispatch(&s, &stock_in(&s, 10)).unwrap();
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].sequence_number, 1);

        let committed = dispatch(&s, &stock_out(&s, 4)).unwrap();
        assert_eq!(committed[0].sequence_number, 2);

        assert_eq!(ledger_balance(&s), 6);

        // Both envelopes reached the bus, in order.
        let first = sub.try_recv().unwrap();
        let second = sub.try_recv().unwrap();
        assert_eq!(first.sequence_number(), 1);
        assert_eq!(second.sequence_number(), 2);
    }

    #[test]
    fn domain_rejection_appends_nothing() {
        let s = scope();

        dispatch(&s, &stock_in(&s, 3)).unwrap();

        let err = dispatch(&s, &stock_out(&s, 5)).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Domain(StockError::InsufficientStock {
                requested: 5,
                available: 3,
            })
        ));

        assert_eq!(ledger_balance(&s), 3);
    }

    #[test]
    fn rehydration_feeds_the_decision() {
        let s = scope();

        let err = dispatch(&s, &stock_out(&s, 1)).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Domain(StockError::NoStockAvailable)
        ));

        dispatch(&s, &stock_in(&s, 2)).unwrap();
        dispatch(&s, &stock_out(&s, 2)).unwrap();

        let err = dispatch(&s, &stock_out(&s, 1)).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Domain(StockError::NoStockAvailable)
        ));
    }

    #[test]
    fn concurrent_issues_never_oversell() {
        let s = scope();
        let initial = 8i64;
        let contenders = 16usize;

        dispatch(&s, &stock_in(&s, initial)).unwrap();

        let successes = AtomicU64::new(0);
        let rejections = AtomicU64::new(0);

        std::thread::scope(|scope_| {
            for _ in 0..contenders {
                let s = &s;
                let successes = &successes;
                let rejections = &rejections;
                scope_.spawn(move || {
                    let result = s.dispatcher.dispatch_with_retry(
                        s.tenant_id,
                        s.ledger_id.0,
                        LEDGER_AGGREGATE_TYPE,
                        &stock_out(s, 1),
                        |id| StockLedger::empty(StockLedgerId::new(id)),
                        64,
                    );
                    match result {
                        Ok(_) => {
                            successes.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(DispatchError::Domain(StockError::NoStockAvailable)) => {
                            rejections.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(other) => panic!("unexpected dispatch failure: {other:?}"),
                    }
                });
            }
        });

        // Exactly `initial` units were issued; the rest were rejected.
        assert_eq!(successes.load(Ordering::SeqCst), initial as u64);
        assert_eq!(
            rejections.load(Ordering::SeqCst),
            contenders as u64 - initial as u64
        );
        assert_eq!(ledger_balance(&s), 0);
    }
}
