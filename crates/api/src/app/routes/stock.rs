use core::str::FromStr;
use std::sync::Arc;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde_json::json;

use stockline_core::{AggregateId, FranchiseId};
use stockline_products::ProductId;

use crate::app::dto::{AdjustmentRequest, StockMovementRequest};
use crate::app::errors::{json_error, stock_dispatch_error};
use crate::app::services::AppServices;
use crate::context::TenantContext;

fn parse_pair(franchise: &str, product: &str) -> Result<(FranchiseId, ProductId), Response> {
    let franchise_id = FranchiseId::from_str(franchise)
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))?;
    let product_id = AggregateId::from_str(product)
        .map(ProductId::new)
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))?;
    Ok((franchise_id, product_id))
}

pub async fn stock_in(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path((franchise, product)): Path<(String, String)>,
    Json(body): Json<StockMovementRequest>,
) -> Response {
    let (franchise_id, product_id) = match parse_pair(&franchise, &product) {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };
    match services.stock_in(
        tenant.tenant_id,
        franchise_id,
        product_id,
        body.quantity,
        body.reason,
    ) {
        Ok(balance) => Json(json!({ "balance": balance })).into_response(),
        Err(err) => stock_dispatch_error(&err),
    }
}

pub async fn stock_out(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path((franchise, product)): Path<(String, String)>,
    Json(body): Json<StockMovementRequest>,
) -> Response {
    let (franchise_id, product_id) = match parse_pair(&franchise, &product) {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };
    match services.stock_out(
        tenant.tenant_id,
        franchise_id,
        product_id,
        body.quantity,
        body.reason,
    ) {
        Ok(balance) => Json(json!({ "balance": balance })).into_response(),
        Err(err) => stock_dispatch_error(&err),
    }
}

pub async fn adjust(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path((franchise, product)): Path<(String, String)>,
    Json(body): Json<AdjustmentRequest>,
) -> Response {
    let (franchise_id, product_id) = match parse_pair(&franchise, &product) {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };
    match services.adjust_stock(
        tenant.tenant_id,
        franchise_id,
        product_id,
        body.delta,
        body.reason,
    ) {
        Ok(balance) => Json(json!({ "balance": balance })).into_response(),
        Err(err) => stock_dispatch_error(&err),
    }
}

pub async fn status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path((franchise, product)): Path<(String, String)>,
) -> Response {
    let (franchise_id, product_id) = match parse_pair(&franchise, &product) {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };
    match services.stock_status(tenant.tenant_id, franchise_id, product_id) {
        Ok(status) => Json(status).into_response(),
        Err(err) => stock_dispatch_error(&err),
    }
}

pub async fn levels(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(franchise): Path<String>,
) -> Response {
    let franchise_id = match FranchiseId::from_str(&franchise) {
        Ok(id) => id,
        Err(e) => return json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()),
    };
    Json(services.list_stock_levels(tenant.tenant_id, franchise_id)).into_response()
}

pub async fn low(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(franchise): Path<String>,
) -> Response {
    let franchise_id = match FranchiseId::from_str(&franchise) {
        Ok(id) => id,
        Err(e) => return json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()),
    };
    Json(services.list_low_stock(tenant.tenant_id, franchise_id)).into_response()
}
