//! Inter-franchise stock transfers: the `StockTransfer` aggregate.

pub mod transfer;

pub use transfer::{
    RecordTransfer, StockTransfer, TRANSFER_AGGREGATE_TYPE, TransferCommand, TransferEvent,
    TransferId, TransferRecorded,
};
