//! Sales domain: the `Sale` aggregate (record/void).

pub mod sale;

pub use sale::{
    RecordSale, SALE_AGGREGATE_TYPE, Sale, SaleCommand, SaleEvent, SaleId, SaleLine, SaleRecorded,
    SaleStatus, SaleVoided, VoidSale,
};
