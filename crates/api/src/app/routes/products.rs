use core::str::FromStr;
use std::sync::Arc;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde_json::json;

use stockline_core::AggregateId;
use stockline_products::{Pricing, ProductId};

use crate::app::dto::{CreateProductRequest, ReorderLevelRequest};
use crate::app::errors::{domain_dispatch_error, json_error};
use crate::app::services::AppServices;
use crate::context::TenantContext;

fn parse_product_id(raw: &str) -> Result<ProductId, Response> {
    AggregateId::from_str(raw)
        .map(ProductId::new)
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<CreateProductRequest>,
) -> Response {
    let pricing = Pricing {
        unit_price: body.unit_price,
        unit_cost: body.unit_cost,
    };
    match services.create_product(
        tenant.tenant_id,
        body.sku,
        body.name,
        pricing,
        body.reorder_level,
    ) {
        Ok(product_id) => (
            StatusCode::CREATED,
            Json(json!({ "product_id": product_id })),
        )
            .into_response(),
        Err(err) => domain_dispatch_error(&err),
    }
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> Response {
    Json(services.list_products(tenant.tenant_id)).into_response()
}

pub async fn get_one(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Response {
    let product_id = match parse_product_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.get_product(tenant.tenant_id, product_id) {
        Some(entry) => Json(entry).into_response(),
        None => json_error(StatusCode::NOT_FOUND, "not_found", "product not found"),
    }
}

pub async fn set_reorder_level(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<ReorderLevelRequest>,
) -> Response {
    let product_id = match parse_product_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.set_reorder_level(tenant.tenant_id, product_id, body.reorder_level) {
        Ok(()) => Json(json!({
            "product_id": product_id,
            "reorder_level": body.reorder_level,
        }))
        .into_response(),
        Err(err) => domain_dispatch_error(&err),
    }
}

pub async fn archive(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Response {
    let product_id = match parse_product_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.archive_product(tenant.tenant_id, product_id) {
        Ok(()) => Json(json!({ "product_id": product_id, "status": "archived" })).into_response(),
        Err(err) => domain_dispatch_error(&err),
    }
}
