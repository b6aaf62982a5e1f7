//! Projection implementations (read model builders).
//!
//! Projections consume published envelopes and maintain query-optimized
//! read models. All of them are:
//! - **Rebuildable**: reconstructed from the event stream at any time
//! - **Tenant-isolated**: data is partitioned by tenant
//! - **Idempotent**: safe under at-least-once delivery

pub mod cursor;

pub mod catalog;
pub mod franchise_directory;
pub mod sales_log;
pub mod sales_summary;
pub mod stock_levels;
pub mod transfers;

pub use catalog::{CatalogEntry, CatalogProjectionError, ProductCatalogProjection};
pub use cursor::{CursorCheck, CursorError, CursorMap};
pub use franchise_directory::{FranchiseDirectoryError, FranchiseDirectoryProjection, FranchiseRow};
pub use sales_log::{SaleRow, SalesLogProjection, SalesLogProjectionError};
pub use sales_summary::{FranchiseSalesSummary, SalesSummaryProjection, SalesSummaryProjectionError};
pub use stock_levels::{LowStockAlert, StockLevelRow, StockLevelsProjection, StockLevelsProjectionError};
pub use transfers::{TransferRecord, TransfersProjection, TransfersProjectionError};
