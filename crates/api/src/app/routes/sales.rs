use core::str::FromStr;
use std::sync::Arc;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde_json::json;

use stockline_core::AggregateId;
use stockline_sales::SaleId;

use crate::app::dto::{RecordSaleRequest, VoidSaleRequest};
use crate::app::errors::{domain_dispatch_error, json_error, service_error};
use crate::app::services::AppServices;
use crate::context::TenantContext;

pub async fn record(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<RecordSaleRequest>,
) -> Response {
    let items = body
        .lines
        .iter()
        .map(|l| (l.product_id, l.quantity))
        .collect();
    match services.record_sale(tenant.tenant_id, body.franchise_id, items) {
        Ok(sale_id) => (StatusCode::CREATED, Json(json!({ "sale_id": sale_id }))).into_response(),
        Err(err) => service_error(&err),
    }
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> Response {
    Json(services.list_sales(tenant.tenant_id)).into_response()
}

pub async fn void(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<VoidSaleRequest>,
) -> Response {
    let sale_id = match AggregateId::from_str(&id) {
        Ok(id) => SaleId::new(id),
        Err(e) => return json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()),
    };
    match services.void_sale(tenant.tenant_id, sale_id, body.reason) {
        Ok(()) => Json(json!({ "sale_id": sale_id, "status": "voided" })).into_response(),
        Err(err) => domain_dispatch_error(&err),
    }
}

pub async fn summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> Response {
    let rows: Vec<_> = services
        .sales_summary(tenant.tenant_id)
        .into_iter()
        .map(|s| {
            json!({
                "franchise_id": s.franchise_id,
                "sales_count": s.sales_count,
                "voided_count": s.voided_count,
                "revenue": s.revenue,
                "cost": s.cost,
                "profit": s.profit(),
            })
        })
        .collect();
    Json(rows).into_response()
}
