//! Stock ledger domain: append-only stock movements and the derived balance.
//!
//! One `StockLedger` stream exists per (franchise, product). The balance is
//! never stored as authoritative state; it is a pure fold over the stream.

pub mod stock;

pub use stock::{
    compute_balance, LEDGER_AGGREGATE_TYPE, LedgerCommand, LedgerEvent, LowStockStatus,
    RecordAdjustment, RecordStockIn, RecordStockOut, StockAdjusted, StockError, StockIssued,
    StockLedger, StockLedgerId, StockReceived,
};
