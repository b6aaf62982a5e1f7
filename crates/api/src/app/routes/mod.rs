pub mod franchises;
pub mod products;
pub mod sales;
pub mod stock;
pub mod system;
pub mod transfers;

use axum::Router;
use axum::routing::{get, post};

/// Tenant-scoped routes. `/health` lives outside this router.
pub fn router() -> Router {
    Router::new()
        .route("/products", post(products::create).get(products::list))
        .route("/products/:id", get(products::get_one))
        .route("/products/:id/reorder-level", post(products::set_reorder_level))
        .route("/products/:id/archive", post(products::archive))
        .route("/franchises", post(franchises::register).get(franchises::list))
        .route("/franchises/:id/close", post(franchises::close))
        .route("/stock/:franchise_id", get(stock::levels))
        .route("/stock/:franchise_id/low", get(stock::low))
        .route("/stock/:franchise_id/:product_id", get(stock::status))
        .route("/stock/:franchise_id/:product_id/in", post(stock::stock_in))
        .route("/stock/:franchise_id/:product_id/out", post(stock::stock_out))
        .route("/stock/:franchise_id/:product_id/adjust", post(stock::adjust))
        .route("/sales", post(sales::record).get(sales::list))
        .route("/sales/summary", get(sales::summary))
        .route("/sales/:id/void", post(sales::void))
        .route("/transfers", post(transfers::record).get(transfers::list))
        .route("/stream", get(system::stream))
}
