//! Request bodies. Identifiers deserialize directly into their typed forms
//! (UUID strings on the wire).

use serde::Deserialize;

use stockline_core::FranchiseId;
use stockline_products::ProductId;

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub sku: String,
    pub name: String,
    pub unit_price: u64,
    pub unit_cost: u64,
    #[serde(default)]
    pub reorder_level: i64,
}

#[derive(Debug, Deserialize)]
pub struct ReorderLevelRequest {
    pub reorder_level: i64,
}

#[derive(Debug, Deserialize)]
pub struct RegisterFranchiseRequest {
    pub name: String,
    pub city: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StockMovementRequest {
    pub quantity: i64,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustmentRequest {
    pub delta: i64,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SaleLineRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct RecordSaleRequest {
    pub franchise_id: FranchiseId,
    pub lines: Vec<SaleLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct VoidSaleRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecordTransferRequest {
    pub product_id: ProductId,
    pub quantity: i64,
    pub from_franchise_id: FranchiseId,
    pub to_franchise_id: FranchiseId,
    pub reason: Option<String>,
}
